use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::{Alias, Cond, Expr, ExprTrait, Index, Query, SqliteQueryBuilder, PostgresQueryBuilder};
use sea_orm::{ConnectionTrait, DatabaseBackend, QueryResult, Statement};

use idu_urban_core::{
    IdentityKeySpec, IdentityReport, IdentityRow, IduError, IduResult, IndicatorValueType,
    KeyValue, plan_deduplication,
};

use crate::db::namespaced_table;
use crate::store::{exec, query_all, query_one};

const DELETE_CHUNK: usize = 500;

/// Deduplicate-then-constrain for one key version. Runs on whatever
/// connection or transaction it is given.
pub(crate) async fn enforce_identity_key<C>(conn: &C, spec: &IdentityKeySpec) -> IduResult<IdentityReport>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    let row_id = spec.row_id_column.ok_or_else(|| {
        IduError::validation(format!(
            "{:?} v{} is a primary key and cannot hold duplicates",
            spec.name, spec.version
        ))
    })?;
    let table = namespaced_table(backend, spec.namespace, spec.table);

    let mut select = Query::select();
    select.from(table.clone()).column(Alias::new(row_id));
    for column in spec.columns {
        select.column(Alias::new(*column));
    }
    if let Some(updated_at) = spec.updated_at_column {
        select.column(Alias::new(updated_at));
    }
    if let Some(value_type) = spec.value_type_column {
        select.column(Alias::new(value_type));
    }
    if let Some(scope) = spec.scope_column {
        select.and_where(Expr::col(Alias::new(scope)).is_not_null());
    }
    let rows = query_all(conn, &select).await?;

    let mut identity_rows = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: i32 = row.try_get("", row_id)?;
        let key = spec
            .columns
            .iter()
            .map(|column| read_key_value(row, column))
            .collect::<IduResult<Vec<_>>>()?;
        let updated_at = match spec.updated_at_column {
            Some(column) => row.try_get::<Option<DateTime<Utc>>>("", column)?,
            None => None,
        };
        let value_type = match spec.value_type_column {
            Some(column) => row
                .try_get::<Option<String>>("", column)?
                .and_then(|raw| IndicatorValueType::parse(&raw).ok()),
            None => None,
        };
        identity_rows.push(IdentityRow {
            row_id: i64::from(id),
            key,
            updated_at,
            value_type,
        });
    }

    let plan = plan_deduplication(&identity_rows);
    for chunk in plan.remove.chunks(DELETE_CHUNK) {
        let delete = Query::delete()
            .from_table(table.clone())
            .and_where(Expr::col(Alias::new(row_id)).is_in(chunk.iter().copied()))
            .to_owned();
        exec(conn, &delete).await?;
    }
    if !plan.remove.is_empty() {
        log::info!(
            "identity {:?} v{}: removed {} rows across {} duplicate groups",
            spec.name,
            spec.version,
            plan.remove.len(),
            plan.duplicate_groups
        );
    }

    let mut index = Index::create();
    index
        .name(spec.index_name)
        .table(table)
        .unique()
        .if_not_exists();
    for column in spec.columns {
        index.col(Alias::new(*column));
    }
    let sql = match backend {
        DatabaseBackend::Postgres => index.to_string(PostgresQueryBuilder),
        _ => index.to_string(SqliteQueryBuilder),
    };
    conn.execute_raw(Statement::from_string(backend, sql)).await?;

    Ok(IdentityReport {
        key: spec.name,
        version: spec.version,
        scanned: identity_rows.len(),
        duplicate_groups: plan.duplicate_groups,
        removed: plan.remove.len(),
        index_name: spec.index_name.to_string(),
    })
}

/// Row id of an existing row with the same identity tuple, comparing NULLs as
/// equal. Unique indexes let NULL-bearing tuples through, so writes check here.
pub(crate) async fn find_identity_conflict<C>(
    conn: &C,
    spec: &IdentityKeySpec,
    key: &[KeyValue],
    exclude_row: Option<i32>,
) -> IduResult<Option<i32>>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    let row_id = spec.row_id_column.ok_or_else(|| {
        IduError::storage(format!("{:?} has no surrogate row id", spec.name))
    })?;
    if key.len() != spec.columns.len() {
        return Err(IduError::storage(format!(
            "{:?} v{} expects {} key values, got {}",
            spec.name,
            spec.version,
            spec.columns.len(),
            key.len()
        )));
    }
    let mut cond = Cond::all();
    for (column, value) in spec.columns.iter().zip(key) {
        let col = Expr::col(Alias::new(*column));
        cond = match value {
            KeyValue::Null => cond.add(col.is_null()),
            KeyValue::Int(v) => cond.add(col.eq(*v)),
            KeyValue::Text(v) => cond.add(col.eq(v.clone())),
        };
    }
    if let Some(exclude) = exclude_row {
        cond = cond.add(Expr::col(Alias::new(row_id)).ne(exclude));
    }
    let select = Query::select()
        .from(namespaced_table(backend, spec.namespace, spec.table))
        .column(Alias::new(row_id))
        .cond_where(cond)
        .limit(1)
        .to_owned();
    let row = query_one(conn, &select).await?;
    match row {
        Some(row) => Ok(Some(row.try_get("", row_id)?)),
        None => Ok(None),
    }
}

fn read_key_value(row: &QueryResult, column: &str) -> IduResult<KeyValue> {
    if let Ok(value) = row.try_get::<Option<i32>>("", column) {
        return Ok(value.map_or(KeyValue::Null, |v| KeyValue::Int(i64::from(v))));
    }
    if let Ok(value) = row.try_get::<Option<String>>("", column) {
        return Ok(value.map_or(KeyValue::Null, KeyValue::Text));
    }
    let value: Option<NaiveDate> = row.try_get("", column)?;
    Ok(value.map_or(KeyValue::Null, |date| KeyValue::Text(date.to_string())))
}
