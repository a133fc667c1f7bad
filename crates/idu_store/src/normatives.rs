use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, Order, Query, SelectStatement};
use sea_orm::{ConnectionTrait, QueryResult, TransactionTrait};

use idu_urban_core::{
    IdentityKeyName, IduError, IduResult, KeyValue, Normative, NormativeApi, NormativeFields,
    NormativeFilter, NormativeId, NormativeInput, NormativeSubject, ServiceTypeId, TerritoryId,
    UrbanFunctionId, current_identity_key,
};

use crate::db::{ServiceTypesDict, ServiceTypesNormativesData, UrbanFunctionsDict};
use crate::geometry::ensure_territory;
use crate::identity::find_identity_conflict;
use crate::store::{
    UrbanStore, col_name, ensure_exists, exec, insert_returning_id, now, query_all, query_one,
    read_opt_i32,
};

const NORMATIVE_COLUMNS: [ServiceTypesNormativesData; 13] = [
    ServiceTypesNormativesData::NormativeId,
    ServiceTypesNormativesData::ServiceTypeId,
    ServiceTypesNormativesData::UrbanFunctionId,
    ServiceTypesNormativesData::TerritoryId,
    ServiceTypesNormativesData::Year,
    ServiceTypesNormativesData::RadiusAvailabilityMeters,
    ServiceTypesNormativesData::TimeAvailabilityMinutes,
    ServiceTypesNormativesData::ServicesPer1000Normative,
    ServiceTypesNormativesData::ServicesCapacityPer1000Normative,
    ServiceTypesNormativesData::IsRegulated,
    ServiceTypesNormativesData::Source,
    ServiceTypesNormativesData::CreatedAt,
    ServiceTypesNormativesData::UpdatedAt,
];

fn select_normatives() -> SelectStatement {
    Query::select()
        .from(ServiceTypesNormativesData::Table)
        .columns(NORMATIVE_COLUMNS)
        .to_owned()
}

fn read_normative(row: &QueryResult) -> IduResult<Normative> {
    Ok(Normative {
        normative_id: NormativeId(row.try_get("", &col_name(ServiceTypesNormativesData::NormativeId))?),
        fields: NormativeFields {
            service_type_id: read_opt_i32(row, ServiceTypesNormativesData::ServiceTypeId)?
                .map(ServiceTypeId),
            urban_function_id: read_opt_i32(row, ServiceTypesNormativesData::UrbanFunctionId)?
                .map(UrbanFunctionId),
            radius_availability_meters: read_opt_i32(
                row,
                ServiceTypesNormativesData::RadiusAvailabilityMeters,
            )?,
            time_availability_minutes: read_opt_i32(
                row,
                ServiceTypesNormativesData::TimeAvailabilityMinutes,
            )?,
            services_per_1000_normative: row.try_get(
                "",
                &col_name(ServiceTypesNormativesData::ServicesPer1000Normative),
            )?,
            services_capacity_per_1000_normative: row.try_get(
                "",
                &col_name(ServiceTypesNormativesData::ServicesCapacityPer1000Normative),
            )?,
        },
        territory_id: read_opt_i32(row, ServiceTypesNormativesData::TerritoryId)?.map(TerritoryId),
        year: row.try_get("", &col_name(ServiceTypesNormativesData::Year))?,
        is_regulated: row.try_get("", &col_name(ServiceTypesNormativesData::IsRegulated))?,
        source: row.try_get("", &col_name(ServiceTypesNormativesData::Source))?,
        created_at: row.try_get("", &col_name(ServiceTypesNormativesData::CreatedAt))?,
        updated_at: row.try_get("", &col_name(ServiceTypesNormativesData::UpdatedAt))?,
    })
}

async fn fetch_normative<C>(conn: &C, normative_id: i32) -> IduResult<Option<Normative>>
where
    C: ConnectionTrait,
{
    let select = select_normatives()
        .and_where(Expr::col(ServiceTypesNormativesData::NormativeId).eq(normative_id))
        .to_owned();
    match query_one(conn, &select).await? {
        Some(row) => Ok(Some(read_normative(&row)?)),
        None => Ok(None),
    }
}

/// Checks the payload, its references and its identity tuple. `exclude` is
/// the row being updated.
async fn check_normative<C>(conn: &C, input: &NormativeInput, exclude: Option<i32>) -> IduResult<()>
where
    C: ConnectionTrait,
{
    let checked = input.fields.check()?;
    let (key_name, subject_id) = match checked.subject {
        NormativeSubject::ServiceType(id) => {
            ensure_exists(
                conn,
                ServiceTypesDict::Table,
                ServiceTypesDict::ServiceTypeId,
                id.get(),
                "service type",
            )
            .await?;
            (IdentityKeyName::ServiceTypeNormative, id.get())
        }
        NormativeSubject::UrbanFunction(id) => {
            ensure_exists(
                conn,
                UrbanFunctionsDict::Table,
                UrbanFunctionsDict::UrbanFunctionId,
                id.get(),
                "urban function",
            )
            .await?;
            (IdentityKeyName::UrbanFunctionNormative, id.get())
        }
    };
    ensure_territory(conn, input.territory_id).await?;

    let spec = current_identity_key(key_name);
    let key = [
        KeyValue::from(subject_id),
        KeyValue::from(input.territory_id.map(TerritoryId::get)),
        KeyValue::from(input.year),
    ];
    if let Some(existing) = find_identity_conflict(conn, spec, &key, exclude).await? {
        return Err(IduError::uniqueness(format!(
            "normative {existing} already covers this subject, territory and year"
        )));
    }
    Ok(())
}

#[async_trait]
impl NormativeApi for UrbanStore {
    async fn add_normative(&self, input: NormativeInput) -> IduResult<Normative> {
        input.fields.check()?;
        self.timed("add_normative", async move {
            let tx = self.conn.begin().await?;
            check_normative(&tx, &input, None).await?;
            let fields = &input.fields;
            let stamp = now();
            let insert = Query::insert()
                .into_table(ServiceTypesNormativesData::Table)
                .columns([
                    ServiceTypesNormativesData::ServiceTypeId,
                    ServiceTypesNormativesData::UrbanFunctionId,
                    ServiceTypesNormativesData::TerritoryId,
                    ServiceTypesNormativesData::Year,
                    ServiceTypesNormativesData::RadiusAvailabilityMeters,
                    ServiceTypesNormativesData::TimeAvailabilityMinutes,
                    ServiceTypesNormativesData::ServicesPer1000Normative,
                    ServiceTypesNormativesData::ServicesCapacityPer1000Normative,
                    ServiceTypesNormativesData::IsRegulated,
                    ServiceTypesNormativesData::Source,
                    ServiceTypesNormativesData::CreatedAt,
                    ServiceTypesNormativesData::UpdatedAt,
                ])
                .values_panic([
                    fields.service_type_id.map(ServiceTypeId::get).into(),
                    fields.urban_function_id.map(UrbanFunctionId::get).into(),
                    input.territory_id.map(TerritoryId::get).into(),
                    input.year.into(),
                    fields.radius_availability_meters.into(),
                    fields.time_availability_minutes.into(),
                    fields.services_per_1000_normative.into(),
                    fields.services_capacity_per_1000_normative.into(),
                    input.is_regulated.into(),
                    input.source.clone().into(),
                    stamp.into(),
                    stamp.into(),
                ])
                .returning_col(ServiceTypesNormativesData::NormativeId)
                .to_owned();
            let id = insert_returning_id(&tx, &insert, ServiceTypesNormativesData::NormativeId).await?;
            self.maybe_failpoint("normative.add.after_insert")?;
            let normative = fetch_normative(&tx, id)
                .await?
                .ok_or_else(|| IduError::storage(format!("normative {id} vanished")))?;
            tx.commit().await?;
            Ok(normative)
        })
        .await
    }

    async fn update_normative(&self, normative_id: NormativeId, input: NormativeInput) -> IduResult<Normative> {
        input.fields.check()?;
        self.timed("update_normative", async move {
            let id = normative_id.get();
            let tx = self.conn.begin().await?;
            if fetch_normative(&tx, id).await?.is_none() {
                return Err(IduError::not_found(format!("normative {id} not found")));
            }
            check_normative(&tx, &input, Some(id)).await?;
            let fields = &input.fields;
            let update = Query::update()
                .table(ServiceTypesNormativesData::Table)
                .values([
                    (
                        ServiceTypesNormativesData::ServiceTypeId,
                        fields.service_type_id.map(ServiceTypeId::get).into(),
                    ),
                    (
                        ServiceTypesNormativesData::UrbanFunctionId,
                        fields.urban_function_id.map(UrbanFunctionId::get).into(),
                    ),
                    (
                        ServiceTypesNormativesData::TerritoryId,
                        input.territory_id.map(TerritoryId::get).into(),
                    ),
                    (ServiceTypesNormativesData::Year, input.year.into()),
                    (
                        ServiceTypesNormativesData::RadiusAvailabilityMeters,
                        fields.radius_availability_meters.into(),
                    ),
                    (
                        ServiceTypesNormativesData::TimeAvailabilityMinutes,
                        fields.time_availability_minutes.into(),
                    ),
                    (
                        ServiceTypesNormativesData::ServicesPer1000Normative,
                        fields.services_per_1000_normative.into(),
                    ),
                    (
                        ServiceTypesNormativesData::ServicesCapacityPer1000Normative,
                        fields.services_capacity_per_1000_normative.into(),
                    ),
                    (ServiceTypesNormativesData::IsRegulated, input.is_regulated.into()),
                    (ServiceTypesNormativesData::Source, input.source.clone().into()),
                    (ServiceTypesNormativesData::UpdatedAt, now().into()),
                ])
                .and_where(Expr::col(ServiceTypesNormativesData::NormativeId).eq(id))
                .to_owned();
            exec(&tx, &update).await?;
            let normative = fetch_normative(&tx, id)
                .await?
                .ok_or_else(|| IduError::storage(format!("normative {id} vanished")))?;
            tx.commit().await?;
            Ok(normative)
        })
        .await
    }

    async fn get_normative(&self, normative_id: NormativeId) -> IduResult<Normative> {
        self.timed("get_normative", async move {
            fetch_normative(&self.conn, normative_id.get())
                .await?
                .ok_or_else(|| IduError::not_found(format!("normative {normative_id} not found")))
        })
        .await
    }

    async fn list_normatives(&self, filter: NormativeFilter) -> IduResult<Vec<Normative>> {
        self.timed("list_normatives", async move {
            let mut select = select_normatives();
            if let Some(territory_id) = filter.territory_id {
                select.and_where(Expr::col(ServiceTypesNormativesData::TerritoryId).eq(territory_id.get()));
            }
            if let Some(year) = filter.year {
                select.and_where(Expr::col(ServiceTypesNormativesData::Year).eq(year));
            }
            select.order_by(ServiceTypesNormativesData::NormativeId, Order::Asc);
            query_all(&self.conn, &select)
                .await?
                .iter()
                .map(read_normative)
                .collect()
        })
        .await
    }
}
