use async_trait::async_trait;
use sea_orm::sea_query::{Cond, Expr, ExprTrait, OnConflict, Order, Query, SelectStatement};
use sea_orm::{ConnectionTrait, QueryResult, TransactionTrait};

use idu_urban_core::{
    DateFieldType, IdentityKeyName, IdentityReport, IdentityMaintenanceApi, IduError, IduResult,
    Indicator, IndicatorApi, IndicatorId, IndicatorInput, IndicatorValueType, TerritoryId,
    TerritoryIndicatorValue, TerritoryIndicatorValueInput, current_identity_key, identity_key,
};

use crate::db::{IndicatorsDict, TerritoryIndicatorsData};
use crate::geometry::ensure_territory;
use crate::identity::enforce_identity_key;
use crate::store::{
    UrbanStore, col_name, ensure_exists, exec, insert_returning_id, now, query_all, query_one,
    required_name,
};

const VALUE_COLUMNS: [TerritoryIndicatorsData; 9] = [
    TerritoryIndicatorsData::IndicatorId,
    TerritoryIndicatorsData::TerritoryId,
    TerritoryIndicatorsData::DateType,
    TerritoryIndicatorsData::DateValue,
    TerritoryIndicatorsData::Value,
    TerritoryIndicatorsData::ValueType,
    TerritoryIndicatorsData::InformationSource,
    TerritoryIndicatorsData::CreatedAt,
    TerritoryIndicatorsData::UpdatedAt,
];

const KEY_COLUMNS: [TerritoryIndicatorsData; 6] = [
    TerritoryIndicatorsData::IndicatorId,
    TerritoryIndicatorsData::TerritoryId,
    TerritoryIndicatorsData::DateType,
    TerritoryIndicatorsData::DateValue,
    TerritoryIndicatorsData::ValueType,
    TerritoryIndicatorsData::InformationSource,
];

fn select_values() -> SelectStatement {
    Query::select()
        .from(TerritoryIndicatorsData::Table)
        .columns(VALUE_COLUMNS)
        .to_owned()
}

fn read_value(row: &QueryResult) -> IduResult<TerritoryIndicatorValue> {
    let date_type: String = row.try_get("", &col_name(TerritoryIndicatorsData::DateType))?;
    let value_type: String = row.try_get("", &col_name(TerritoryIndicatorsData::ValueType))?;
    Ok(TerritoryIndicatorValue {
        indicator_id: IndicatorId(row.try_get("", &col_name(TerritoryIndicatorsData::IndicatorId))?),
        territory_id: TerritoryId(row.try_get("", &col_name(TerritoryIndicatorsData::TerritoryId))?),
        date_type: DateFieldType::parse(&date_type)?,
        date_value: row.try_get("", &col_name(TerritoryIndicatorsData::DateValue))?,
        value: row.try_get("", &col_name(TerritoryIndicatorsData::Value))?,
        value_type: IndicatorValueType::parse(&value_type)?,
        information_source: row.try_get("", &col_name(TerritoryIndicatorsData::InformationSource))?,
        created_at: row.try_get("", &col_name(TerritoryIndicatorsData::CreatedAt))?,
        updated_at: row.try_get("", &col_name(TerritoryIndicatorsData::UpdatedAt))?,
    })
}

fn key_condition(input: &TerritoryIndicatorValueInput) -> Cond {
    Cond::all()
        .add(Expr::col(TerritoryIndicatorsData::IndicatorId).eq(input.indicator_id.get()))
        .add(Expr::col(TerritoryIndicatorsData::TerritoryId).eq(input.territory_id.get()))
        .add(Expr::col(TerritoryIndicatorsData::DateType).eq(input.date_type.as_str()))
        .add(Expr::col(TerritoryIndicatorsData::DateValue).eq(input.date_value))
        .add(Expr::col(TerritoryIndicatorsData::ValueType).eq(input.value_type.as_str()))
        .add(Expr::col(TerritoryIndicatorsData::InformationSource).eq(input.information_source.clone()))
}

async fn fetch_value<C>(conn: &C, input: &TerritoryIndicatorValueInput) -> IduResult<Option<TerritoryIndicatorValue>>
where
    C: ConnectionTrait,
{
    let select = select_values().cond_where(key_condition(input)).to_owned();
    match query_one(conn, &select).await? {
        Some(row) => Ok(Some(read_value(&row)?)),
        None => Ok(None),
    }
}

/// Validates the value payload and its references.
async fn check_value<C>(conn: &C, input: &TerritoryIndicatorValueInput) -> IduResult<()>
where
    C: ConnectionTrait,
{
    input.date_type.check_date(input.date_value)?;
    if !input.value.is_finite() {
        return Err(IduError::validation("indicator value must be finite"));
    }
    ensure_exists(
        conn,
        IndicatorsDict::Table,
        IndicatorsDict::IndicatorId,
        input.indicator_id.get(),
        "indicator",
    )
    .await?;
    ensure_territory(conn, Some(input.territory_id)).await
}

fn value_row(input: &TerritoryIndicatorValueInput) -> [Expr; 9] {
    let stamp = now();
    [
        input.indicator_id.get().into(),
        input.territory_id.get().into(),
        input.date_type.as_str().into(),
        input.date_value.into(),
        input.value.into(),
        input.value_type.as_str().into(),
        input.information_source.clone().into(),
        stamp.into(),
        stamp.into(),
    ]
}

#[async_trait]
impl IndicatorApi for UrbanStore {
    async fn create_indicator(&self, input: IndicatorInput) -> IduResult<Indicator> {
        let name_full = required_name(&input.name_full, "indicator")?;
        self.timed("create_indicator", async move {
            let insert = Query::insert()
                .into_table(IndicatorsDict::Table)
                .columns([
                    IndicatorsDict::NameFull,
                    IndicatorsDict::NameShort,
                    IndicatorsDict::MeasurementUnit,
                ])
                .values_panic([
                    name_full.clone().into(),
                    input.name_short.clone().into(),
                    input.measurement_unit.clone().into(),
                ])
                .returning_col(IndicatorsDict::IndicatorId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, IndicatorsDict::IndicatorId).await?;
            Ok(Indicator {
                indicator_id: IndicatorId(id),
                name_full,
                name_short: input.name_short,
                measurement_unit: input.measurement_unit,
            })
        })
        .await
    }

    async fn add_territory_indicator_value(
        &self,
        input: TerritoryIndicatorValueInput,
    ) -> IduResult<TerritoryIndicatorValue> {
        input.date_type.check_date(input.date_value)?;
        self.timed("add_territory_indicator_value", async move {
            let tx = self.conn.begin().await?;
            check_value(&tx, &input).await?;
            if fetch_value(&tx, &input).await?.is_some() {
                return Err(IduError::uniqueness(format!(
                    "indicator {} already has a {} value for territory {} at {} from '{}'",
                    input.indicator_id,
                    input.value_type.as_str(),
                    input.territory_id,
                    input.date_value,
                    input.information_source
                )));
            }
            let insert = Query::insert()
                .into_table(TerritoryIndicatorsData::Table)
                .columns(VALUE_COLUMNS)
                .values_panic(value_row(&input))
                .to_owned();
            exec(&tx, &insert).await?;
            let value = fetch_value(&tx, &input)
                .await?
                .ok_or_else(|| IduError::storage("indicator value vanished after insert"))?;
            tx.commit().await?;
            Ok(value)
        })
        .await
    }

    async fn put_territory_indicator_value(
        &self,
        input: TerritoryIndicatorValueInput,
    ) -> IduResult<TerritoryIndicatorValue> {
        input.date_type.check_date(input.date_value)?;
        self.timed("put_territory_indicator_value", async move {
            let tx = self.conn.begin().await?;
            check_value(&tx, &input).await?;
            let upsert = Query::insert()
                .into_table(TerritoryIndicatorsData::Table)
                .columns(VALUE_COLUMNS)
                .values_panic(value_row(&input))
                .on_conflict(
                    OnConflict::columns(KEY_COLUMNS)
                        .update_columns([
                            TerritoryIndicatorsData::Value,
                            TerritoryIndicatorsData::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .to_owned();
            exec(&tx, &upsert).await?;
            let value = fetch_value(&tx, &input)
                .await?
                .ok_or_else(|| IduError::storage("indicator value vanished after upsert"))?;
            tx.commit().await?;
            Ok(value)
        })
        .await
    }

    async fn list_territory_indicator_values(
        &self,
        territory_id: TerritoryId,
        indicator_id: Option<IndicatorId>,
    ) -> IduResult<Vec<TerritoryIndicatorValue>> {
        self.timed("list_territory_indicator_values", async move {
            let mut select = select_values();
            select.and_where(Expr::col(TerritoryIndicatorsData::TerritoryId).eq(territory_id.get()));
            if let Some(indicator_id) = indicator_id {
                select.and_where(Expr::col(TerritoryIndicatorsData::IndicatorId).eq(indicator_id.get()));
            }
            select
                .order_by(TerritoryIndicatorsData::IndicatorId, Order::Asc)
                .order_by(TerritoryIndicatorsData::DateValue, Order::Asc)
                .order_by(TerritoryIndicatorsData::ValueType, Order::Asc);
            query_all(&self.conn, &select)
                .await?
                .iter()
                .map(read_value)
                .collect()
        })
        .await
    }
}

#[async_trait]
impl IdentityMaintenanceApi for UrbanStore {
    async fn enforce_identity_key(
        &self,
        key: IdentityKeyName,
        version: Option<u32>,
    ) -> IduResult<IdentityReport> {
        let spec = match version {
            Some(version) => identity_key(key, version).ok_or_else(|| {
                IduError::validation(format!("{key:?} has no version {version}"))
            })?,
            None => current_identity_key(key),
        };
        self.timed("enforce_identity_key", async move {
            let tx = self.conn.begin().await?;
            let report = enforce_identity_key(&tx, spec).await?;
            self.maybe_failpoint("identity.enforce.before_commit")?;
            tx.commit().await?;
            Ok(report)
        })
        .await
    }
}
