use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, Query};
use sea_orm::{ConnectionTrait, QueryResult};

use idu_urban_core::{
    IduError, IduResult, InfrastructureType, Service, ServiceApi, ServiceId, ServiceInput,
    ServiceType, ServiceTypeId, ServiceTypeInput, TerritoryTypeId, UrbanFunctionId,
    resolve_capacity,
};

use crate::db::{ServiceTypesDict, ServicesData, TerritoryTypesDict, UrbanFunctionsDict};
use crate::store::{
    UrbanStore, col_name, encode_properties, ensure_exists, exec, insert_returning_id, now,
    query_one, read_opt_i32, read_properties, required_name,
};

pub(crate) async fn fetch_service_type<C>(conn: &C, service_type_id: i32) -> IduResult<Option<ServiceType>>
where
    C: ConnectionTrait,
{
    let select = Query::select()
        .from(ServiceTypesDict::Table)
        .columns([
            ServiceTypesDict::ServiceTypeId,
            ServiceTypesDict::UrbanFunctionId,
            ServiceTypesDict::Name,
            ServiceTypesDict::Code,
            ServiceTypesDict::CapacityModeled,
            ServiceTypesDict::InfrastructureType,
            ServiceTypesDict::Properties,
        ])
        .and_where(Expr::col(ServiceTypesDict::ServiceTypeId).eq(service_type_id))
        .to_owned();
    let Some(row) = query_one(conn, &select).await? else {
        return Ok(None);
    };
    let infrastructure: String = row.try_get("", &col_name(ServiceTypesDict::InfrastructureType))?;
    Ok(Some(ServiceType {
        service_type_id: ServiceTypeId(service_type_id),
        urban_function_id: UrbanFunctionId(
            row.try_get("", &col_name(ServiceTypesDict::UrbanFunctionId))?,
        ),
        name: row.try_get("", &col_name(ServiceTypesDict::Name))?,
        code: row.try_get("", &col_name(ServiceTypesDict::Code))?,
        capacity_modeled: read_opt_i32(&row, ServiceTypesDict::CapacityModeled)?,
        infrastructure_type: InfrastructureType::parse(&infrastructure)?,
        properties: read_properties(&row, ServiceTypesDict::Properties)?,
    }))
}

fn read_service(row: &QueryResult) -> IduResult<Service> {
    Ok(Service {
        service_id: ServiceId(row.try_get("", &col_name(ServicesData::ServiceId))?),
        service_type_id: ServiceTypeId(row.try_get("", &col_name(ServicesData::ServiceTypeId))?),
        territory_type_id: read_opt_i32(row, ServicesData::TerritoryTypeId)?.map(TerritoryTypeId),
        name: row.try_get("", &col_name(ServicesData::Name))?,
        capacity: read_opt_i32(row, ServicesData::Capacity)?,
        is_capacity_real: row.try_get("", &col_name(ServicesData::IsCapacityReal))?,
        properties: read_properties(row, ServicesData::Properties)?,
        created_at: row.try_get("", &col_name(ServicesData::CreatedAt))?,
        updated_at: row.try_get("", &col_name(ServicesData::UpdatedAt))?,
    })
}

async fn fetch_service<C>(conn: &C, service_id: i32) -> IduResult<Option<Service>>
where
    C: ConnectionTrait,
{
    let select = Query::select()
        .from(ServicesData::Table)
        .columns([
            ServicesData::ServiceId,
            ServicesData::ServiceTypeId,
            ServicesData::TerritoryTypeId,
            ServicesData::Name,
            ServicesData::Capacity,
            ServicesData::IsCapacityReal,
            ServicesData::Properties,
            ServicesData::CreatedAt,
            ServicesData::UpdatedAt,
        ])
        .and_where(Expr::col(ServicesData::ServiceId).eq(service_id))
        .to_owned();
    match query_one(conn, &select).await? {
        Some(row) => Ok(Some(read_service(&row)?)),
        None => Ok(None),
    }
}

/// Resolves the capacity pair against the referenced service type.
async fn service_capacity<C>(conn: &C, input: &ServiceInput) -> IduResult<(Option<i32>, bool)>
where
    C: ConnectionTrait,
{
    let service_type = fetch_service_type(conn, input.service_type_id.get())
        .await?
        .ok_or_else(|| {
            IduError::missing_reference(format!(
                "service type {} does not exist",
                input.service_type_id
            ))
        })?;
    if let Some(territory_type_id) = input.territory_type_id {
        ensure_exists(
            conn,
            TerritoryTypesDict::Table,
            TerritoryTypesDict::TerritoryTypeId,
            territory_type_id.get(),
            "territory type",
        )
        .await?;
    }
    let resolved = resolve_capacity(
        input.capacity,
        input.is_capacity_real,
        service_type.capacity_modeled,
    )?;
    Ok((resolved.capacity, resolved.is_capacity_real))
}

#[async_trait]
impl ServiceApi for UrbanStore {
    async fn create_service_type(&self, input: ServiceTypeInput) -> IduResult<ServiceType> {
        let name = required_name(&input.name, "service type")?;
        if let Some(modeled) = input.capacity_modeled {
            if modeled < 0 {
                return Err(IduError::validation(format!(
                    "capacity_modeled must not be negative, got {modeled}"
                )));
            }
        }
        let properties = encode_properties(&input.properties)?;
        self.timed("create_service_type", async move {
            ensure_exists(
                &self.conn,
                UrbanFunctionsDict::Table,
                UrbanFunctionsDict::UrbanFunctionId,
                input.urban_function_id.get(),
                "urban function",
            )
            .await?;
            let insert = Query::insert()
                .into_table(ServiceTypesDict::Table)
                .columns([
                    ServiceTypesDict::UrbanFunctionId,
                    ServiceTypesDict::Name,
                    ServiceTypesDict::Code,
                    ServiceTypesDict::CapacityModeled,
                    ServiceTypesDict::InfrastructureType,
                    ServiceTypesDict::Properties,
                ])
                .values_panic([
                    input.urban_function_id.get().into(),
                    name.into(),
                    input.code.clone().into(),
                    input.capacity_modeled.into(),
                    input.infrastructure_type.as_str().into(),
                    properties.into(),
                ])
                .returning_col(ServiceTypesDict::ServiceTypeId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, ServiceTypesDict::ServiceTypeId).await?;
            fetch_service_type(&self.conn, id)
                .await?
                .ok_or_else(|| IduError::storage(format!("service type {id} vanished")))
        })
        .await
    }

    async fn create_service(&self, input: ServiceInput) -> IduResult<Service> {
        let properties = encode_properties(&input.properties)?;
        self.timed("create_service", async move {
            let (capacity, is_capacity_real) = service_capacity(&self.conn, &input).await?;
            let stamp = now();
            let insert = Query::insert()
                .into_table(ServicesData::Table)
                .columns([
                    ServicesData::ServiceTypeId,
                    ServicesData::TerritoryTypeId,
                    ServicesData::Name,
                    ServicesData::Capacity,
                    ServicesData::IsCapacityReal,
                    ServicesData::Properties,
                    ServicesData::CreatedAt,
                    ServicesData::UpdatedAt,
                ])
                .values_panic([
                    input.service_type_id.get().into(),
                    input.territory_type_id.map(TerritoryTypeId::get).into(),
                    input.name.clone().into(),
                    capacity.into(),
                    is_capacity_real.into(),
                    properties.into(),
                    stamp.into(),
                    stamp.into(),
                ])
                .returning_col(ServicesData::ServiceId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, ServicesData::ServiceId).await?;
            fetch_service(&self.conn, id)
                .await?
                .ok_or_else(|| IduError::storage(format!("service {id} vanished")))
        })
        .await
    }

    async fn update_service(&self, service_id: ServiceId, input: ServiceInput) -> IduResult<Service> {
        let properties = encode_properties(&input.properties)?;
        self.timed("update_service", async move {
            let id = service_id.get();
            if fetch_service(&self.conn, id).await?.is_none() {
                return Err(IduError::not_found(format!("service {id} not found")));
            }
            let (capacity, is_capacity_real) = service_capacity(&self.conn, &input).await?;
            let update = Query::update()
                .table(ServicesData::Table)
                .values([
                    (ServicesData::ServiceTypeId, input.service_type_id.get().into()),
                    (
                        ServicesData::TerritoryTypeId,
                        input.territory_type_id.map(TerritoryTypeId::get).into(),
                    ),
                    (ServicesData::Name, input.name.clone().into()),
                    (ServicesData::Capacity, capacity.into()),
                    (ServicesData::IsCapacityReal, is_capacity_real.into()),
                    (ServicesData::Properties, properties.into()),
                    (ServicesData::UpdatedAt, now().into()),
                ])
                .and_where(Expr::col(ServicesData::ServiceId).eq(id))
                .to_owned();
            exec(&self.conn, &update).await?;
            fetch_service(&self.conn, id)
                .await?
                .ok_or_else(|| IduError::not_found(format!("service {id} not found")))
        })
        .await
    }

    async fn get_service(&self, service_id: ServiceId) -> IduResult<Service> {
        self.timed("get_service", async move {
            fetch_service(&self.conn, service_id.get())
                .await?
                .ok_or_else(|| IduError::not_found(format!("service {service_id} not found")))
        })
        .await
    }
}
