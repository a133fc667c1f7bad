use async_trait::async_trait;
use sea_orm::sea_query::{Cond, Expr, ExprTrait, OnConflict, Query};
use sea_orm::{ConnectionTrait, TransactionTrait};

use idu_urban_core::{
    Buffer, BufferApi, BufferInput, BufferType, BufferTypeId, BufferTypeInput,
    DefaultBufferValueInput, GeometryProfile, IduError, IduResult, ObjectGeometryId,
    PhysicalObjectTypeId, ServiceId, UrbanObject, UrbanObjectId, UrbanObjectInput,
};

use crate::db::{
    BufferTypesDict, BuffersData, DefaultBufferValuesDict, ObjectGeometriesData,
    PhysicalObjectTypesDict, ServiceTypesDict, ServicesData, UrbanObjectsData,
};
use crate::store::{
    UrbanStore, col_name, ensure_exists, exec, insert_returning_id, now, query_one, read_geometry,
    read_opt_i32, required_name,
};

/// Object type a default radius is keyed by.
#[derive(Clone, Copy, Debug)]
enum BufferSubject {
    PhysicalObjectType(i32),
    ServiceType(i32),
}

impl BufferSubject {
    fn condition(self, buffer_type_id: i32) -> Cond {
        let (physical, service) = match self {
            Self::PhysicalObjectType(id) => (Some(id), None),
            Self::ServiceType(id) => (None, Some(id)),
        };
        let mut cond = Cond::all().add(Expr::col(DefaultBufferValuesDict::BufferTypeId).eq(buffer_type_id));
        cond = match physical {
            Some(id) => cond.add(Expr::col(DefaultBufferValuesDict::PhysicalObjectTypeId).eq(id)),
            None => cond.add(Expr::col(DefaultBufferValuesDict::PhysicalObjectTypeId).is_null()),
        };
        match service {
            Some(id) => cond.add(Expr::col(DefaultBufferValuesDict::ServiceTypeId).eq(id)),
            None => cond.add(Expr::col(DefaultBufferValuesDict::ServiceTypeId).is_null()),
        }
    }
}

async fn lookup_default<C>(conn: &C, buffer_type_id: i32, subject: BufferSubject) -> IduResult<Option<(i32, f64)>>
where
    C: ConnectionTrait,
{
    let select = Query::select()
        .from(DefaultBufferValuesDict::Table)
        .columns([
            DefaultBufferValuesDict::DefaultBufferValueId,
            DefaultBufferValuesDict::BufferValue,
        ])
        .cond_where(subject.condition(buffer_type_id))
        .limit(1)
        .to_owned();
    match query_one(conn, &select).await? {
        Some(row) => Ok(Some((
            row.try_get("", &col_name(DefaultBufferValuesDict::DefaultBufferValueId))?,
            row.try_get("", &col_name(DefaultBufferValuesDict::BufferValue))?,
        ))),
        None => Ok(None),
    }
}

async fn fetch_urban_object<C>(conn: &C, urban_object_id: i32) -> IduResult<Option<UrbanObject>>
where
    C: ConnectionTrait,
{
    let select = Query::select()
        .from(UrbanObjectsData::Table)
        .columns([
            UrbanObjectsData::UrbanObjectId,
            UrbanObjectsData::ObjectGeometryId,
            UrbanObjectsData::PhysicalObjectTypeId,
            UrbanObjectsData::ServiceId,
        ])
        .and_where(Expr::col(UrbanObjectsData::UrbanObjectId).eq(urban_object_id))
        .to_owned();
    let Some(row) = query_one(conn, &select).await? else {
        return Ok(None);
    };
    Ok(Some(UrbanObject {
        urban_object_id: UrbanObjectId(urban_object_id),
        object_geometry_id: ObjectGeometryId(
            row.try_get("", &col_name(UrbanObjectsData::ObjectGeometryId))?,
        ),
        physical_object_type_id: read_opt_i32(&row, UrbanObjectsData::PhysicalObjectTypeId)?
            .map(PhysicalObjectTypeId),
        service_id: read_opt_i32(&row, UrbanObjectsData::ServiceId)?.map(ServiceId),
    }))
}

/// Default radius for an urban object: its service's type first, then its
/// physical object type.
async fn resolve_default_radius<C>(conn: &C, buffer_type_id: i32, urban_object_id: i32) -> IduResult<Option<f64>>
where
    C: ConnectionTrait,
{
    let object = fetch_urban_object(conn, urban_object_id).await?.ok_or_else(|| {
        IduError::missing_reference(format!("urban object {urban_object_id} does not exist"))
    })?;
    if let Some(service_id) = object.service_id {
        let select = Query::select()
            .from(ServicesData::Table)
            .column(ServicesData::ServiceTypeId)
            .and_where(Expr::col(ServicesData::ServiceId).eq(service_id.get()))
            .to_owned();
        if let Some(row) = query_one(conn, &select).await? {
            let service_type_id: i32 = row.try_get("", &col_name(ServicesData::ServiceTypeId))?;
            if let Some((_, radius)) =
                lookup_default(conn, buffer_type_id, BufferSubject::ServiceType(service_type_id)).await?
            {
                return Ok(Some(radius));
            }
        }
    }
    if let Some(type_id) = object.physical_object_type_id {
        let found = lookup_default(
            conn,
            buffer_type_id,
            BufferSubject::PhysicalObjectType(type_id.get()),
        )
        .await?;
        return Ok(found.map(|(_, radius)| radius));
    }
    Ok(None)
}

async fn fetch_buffer<C>(conn: &C, buffer_type_id: i32, urban_object_id: i32) -> IduResult<Option<Buffer>>
where
    C: ConnectionTrait,
{
    let select = Query::select()
        .from(BuffersData::Table)
        .columns([BuffersData::Geometry, BuffersData::IsCustom, BuffersData::UpdatedAt])
        .and_where(Expr::col(BuffersData::BufferTypeId).eq(buffer_type_id))
        .and_where(Expr::col(BuffersData::UrbanObjectId).eq(urban_object_id))
        .to_owned();
    let Some(row) = query_one(conn, &select).await? else {
        return Ok(None);
    };
    Ok(Some(Buffer {
        buffer_type_id: BufferTypeId(buffer_type_id),
        urban_object_id: UrbanObjectId(urban_object_id),
        geometry: read_geometry(&row, BuffersData::Geometry)?,
        is_custom: row.try_get("", &col_name(BuffersData::IsCustom))?,
        updated_at: row.try_get("", &col_name(BuffersData::UpdatedAt))?,
    }))
}

async fn ensure_buffer_type<C>(conn: &C, buffer_type_id: BufferTypeId) -> IduResult<()>
where
    C: ConnectionTrait,
{
    ensure_exists(
        conn,
        BufferTypesDict::Table,
        BufferTypesDict::BufferTypeId,
        buffer_type_id.get(),
        "buffer type",
    )
    .await
}

#[async_trait]
impl BufferApi for UrbanStore {
    async fn create_buffer_type(&self, input: BufferTypeInput) -> IduResult<BufferType> {
        let name = required_name(&input.name, "buffer type")?;
        self.timed("create_buffer_type", async move {
            let insert = Query::insert()
                .into_table(BufferTypesDict::Table)
                .columns([BufferTypesDict::Name, BufferTypesDict::Description])
                .values_panic([name.clone().into(), input.description.clone().into()])
                .returning_col(BufferTypesDict::BufferTypeId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, BufferTypesDict::BufferTypeId).await?;
            Ok(BufferType {
                buffer_type_id: BufferTypeId(id),
                name,
                description: input.description,
            })
        })
        .await
    }

    async fn set_default_buffer_value(&self, input: DefaultBufferValueInput) -> IduResult<()> {
        let subject = match (input.physical_object_type_id, input.service_type_id) {
            (Some(id), None) => BufferSubject::PhysicalObjectType(id.get()),
            (None, Some(id)) => BufferSubject::ServiceType(id.get()),
            _ => {
                return Err(IduError::validation(
                    "exactly one of physical_object_type_id and service_type_id must be set",
                ));
            }
        };
        if !input.buffer_value.is_finite() || input.buffer_value < 0.0 {
            return Err(IduError::validation(format!(
                "buffer_value must be a non-negative number, got {}",
                input.buffer_value
            )));
        }
        self.timed("set_default_buffer_value", async move {
            let buffer_type_id = input.buffer_type_id.get();
            let tx = self.conn.begin().await?;
            ensure_buffer_type(&tx, input.buffer_type_id).await?;
            match subject {
                BufferSubject::PhysicalObjectType(id) => {
                    ensure_exists(
                        &tx,
                        PhysicalObjectTypesDict::Table,
                        PhysicalObjectTypesDict::PhysicalObjectTypeId,
                        id,
                        "physical object type",
                    )
                    .await?
                }
                BufferSubject::ServiceType(id) => {
                    ensure_exists(
                        &tx,
                        ServiceTypesDict::Table,
                        ServiceTypesDict::ServiceTypeId,
                        id,
                        "service type",
                    )
                    .await?
                }
            }
            // NULL-bearing keys slip past the unique index, so match explicitly.
            match lookup_default(&tx, buffer_type_id, subject).await? {
                Some((existing, _)) => {
                    let update = Query::update()
                        .table(DefaultBufferValuesDict::Table)
                        .values([(DefaultBufferValuesDict::BufferValue, input.buffer_value.into())])
                        .and_where(Expr::col(DefaultBufferValuesDict::DefaultBufferValueId).eq(existing))
                        .to_owned();
                    exec(&tx, &update).await?;
                }
                None => {
                    let insert = Query::insert()
                        .into_table(DefaultBufferValuesDict::Table)
                        .columns([
                            DefaultBufferValuesDict::BufferTypeId,
                            DefaultBufferValuesDict::PhysicalObjectTypeId,
                            DefaultBufferValuesDict::ServiceTypeId,
                            DefaultBufferValuesDict::BufferValue,
                        ])
                        .values_panic([
                            buffer_type_id.into(),
                            input.physical_object_type_id.map(PhysicalObjectTypeId::get).into(),
                            input.service_type_id.map(|id| id.get()).into(),
                            input.buffer_value.into(),
                        ])
                        .to_owned();
                    exec(&tx, &insert).await?;
                }
            }
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn create_urban_object(&self, input: UrbanObjectInput) -> IduResult<UrbanObject> {
        self.timed("create_urban_object", async move {
            ensure_exists(
                &self.conn,
                ObjectGeometriesData::Table,
                ObjectGeometriesData::ObjectGeometryId,
                input.object_geometry_id.get(),
                "object geometry",
            )
            .await?;
            if let Some(type_id) = input.physical_object_type_id {
                ensure_exists(
                    &self.conn,
                    PhysicalObjectTypesDict::Table,
                    PhysicalObjectTypesDict::PhysicalObjectTypeId,
                    type_id.get(),
                    "physical object type",
                )
                .await?;
            }
            if let Some(service_id) = input.service_id {
                ensure_exists(
                    &self.conn,
                    ServicesData::Table,
                    ServicesData::ServiceId,
                    service_id.get(),
                    "service",
                )
                .await?;
            }
            let insert = Query::insert()
                .into_table(UrbanObjectsData::Table)
                .columns([
                    UrbanObjectsData::ObjectGeometryId,
                    UrbanObjectsData::PhysicalObjectTypeId,
                    UrbanObjectsData::ServiceId,
                ])
                .values_panic([
                    input.object_geometry_id.get().into(),
                    input.physical_object_type_id.map(PhysicalObjectTypeId::get).into(),
                    input.service_id.map(ServiceId::get).into(),
                ])
                .returning_col(UrbanObjectsData::UrbanObjectId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, UrbanObjectsData::UrbanObjectId).await?;
            Ok(UrbanObject {
                urban_object_id: UrbanObjectId(id),
                object_geometry_id: input.object_geometry_id,
                physical_object_type_id: input.physical_object_type_id,
                service_id: input.service_id,
            })
        })
        .await
    }

    async fn default_buffer_radius(
        &self,
        buffer_type_id: BufferTypeId,
        urban_object_id: UrbanObjectId,
    ) -> IduResult<Option<f64>> {
        self.timed("default_buffer_radius", async move {
            ensure_buffer_type(&self.conn, buffer_type_id).await?;
            resolve_default_radius(&self.conn, buffer_type_id.get(), urban_object_id.get()).await
        })
        .await
    }

    async fn put_buffer(&self, input: BufferInput) -> IduResult<Buffer> {
        input.geometry.validate(GeometryProfile::Areal)?;
        let geometry = input.geometry.to_json()?;
        self.timed("put_buffer", async move {
            let buffer_type_id = input.buffer_type_id.get();
            let urban_object_id = input.urban_object_id.get();
            let tx = self.conn.begin().await?;
            ensure_buffer_type(&tx, input.buffer_type_id).await?;
            let radius = resolve_default_radius(&tx, buffer_type_id, urban_object_id).await?;
            if !input.is_custom && radius.is_none() {
                return Err(IduError::missing_reference(format!(
                    "no default radius of buffer type {buffer_type_id} for urban object {urban_object_id}"
                )));
            }
            let upsert = Query::insert()
                .into_table(BuffersData::Table)
                .columns([
                    BuffersData::BufferTypeId,
                    BuffersData::UrbanObjectId,
                    BuffersData::Geometry,
                    BuffersData::IsCustom,
                    BuffersData::UpdatedAt,
                ])
                .values_panic([
                    buffer_type_id.into(),
                    urban_object_id.into(),
                    geometry.into(),
                    input.is_custom.into(),
                    now().into(),
                ])
                .on_conflict(
                    OnConflict::columns([BuffersData::BufferTypeId, BuffersData::UrbanObjectId])
                        .update_columns([
                            BuffersData::Geometry,
                            BuffersData::IsCustom,
                            BuffersData::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .to_owned();
            exec(&tx, &upsert).await?;
            let buffer = fetch_buffer(&tx, buffer_type_id, urban_object_id)
                .await?
                .ok_or_else(|| IduError::storage("buffer vanished after upsert"))?;
            tx.commit().await?;
            Ok(buffer)
        })
        .await
    }

    async fn get_buffer(&self, buffer_type_id: BufferTypeId, urban_object_id: UrbanObjectId) -> IduResult<Buffer> {
        self.timed("get_buffer", async move {
            fetch_buffer(&self.conn, buffer_type_id.get(), urban_object_id.get())
                .await?
                .ok_or_else(|| {
                    IduError::not_found(format!(
                        "buffer {buffer_type_id} of urban object {urban_object_id} not found"
                    ))
                })
        })
        .await
    }

    async fn delete_buffer(&self, buffer_type_id: BufferTypeId, urban_object_id: UrbanObjectId) -> IduResult<()> {
        self.timed("delete_buffer", async move {
            let delete = Query::delete()
                .from_table(BuffersData::Table)
                .and_where(Expr::col(BuffersData::BufferTypeId).eq(buffer_type_id.get()))
                .and_where(Expr::col(BuffersData::UrbanObjectId).eq(urban_object_id.get()))
                .to_owned();
            if exec(&self.conn, &delete).await? == 0 {
                return Err(IduError::not_found(format!(
                    "buffer {buffer_type_id} of urban object {urban_object_id} not found"
                )));
            }
            Ok(())
        })
        .await
    }
}
