#![allow(dead_code)]

use std::path::Path;

use sea_orm::{ConnectionTrait, DatabaseTransaction, Statement, TransactionTrait};

use idu_urban_store::{
    Geometry, IduResult, LimitsConfig, Properties, StoreConfig, TerritoryApi, TerritoryId,
    TerritoryInput, TerritoryTypeId, TerritoryTypeInput, UrbanStore,
};

pub async fn open(dir: &Path) -> IduResult<UrbanStore> {
    UrbanStore::connect_sqlite(&dir.join("urban.sqlite")).await
}

/// Another handle on the same file whose operations give up after `timeout_ms`.
pub async fn open_with_timeout(dir: &Path, timeout_ms: u64) -> IduResult<UrbanStore> {
    let mut config = StoreConfig::default_sqlite(dir.join("urban.sqlite").to_string_lossy());
    config.limits = Some(LimitsConfig {
        operation_timeout_ms: Some(timeout_ms),
        max_hierarchy_depth: None,
    });
    UrbanStore::connect(&config, dir).await
}

/// Holds the SQLite write lock until the returned transaction ends.
pub async fn hold_write_lock(store: &UrbanStore) -> IduResult<DatabaseTransaction> {
    let tx = store.connection().begin().await?;
    tx.execute_raw(Statement::from_string(
        store.backend(),
        "UPDATE territory_types_dict SET name = name".to_string(),
    ))
    .await?;
    Ok(tx)
}

/// Number of ancestors, found by walking `parent_id` links.
pub async fn depth(store: &UrbanStore, territory_id: TerritoryId) -> IduResult<i32> {
    let mut depth = 0;
    let mut current = store.get_territory(territory_id).await?.parent_id;
    while let Some(parent) = current {
        depth += 1;
        current = store.get_territory(parent).await?.parent_id;
    }
    Ok(depth)
}

/// Axis-aligned square with its lower-left corner at (x, y).
pub fn square(x: f64, y: f64, size: f64) -> Geometry {
    Geometry::Polygon(vec![vec![
        [x, y],
        [x + size, y],
        [x + size, y + size],
        [x, y + size],
        [x, y],
    ]])
}

pub async fn territory_type(store: &UrbanStore, name: &str) -> IduResult<TerritoryTypeId> {
    let created = store
        .create_territory_type(TerritoryTypeInput {
            name: name.to_string(),
        })
        .await?;
    Ok(created.territory_type_id)
}

pub fn territory_input(
    territory_type_id: TerritoryTypeId,
    parent_id: Option<TerritoryId>,
    name: &str,
) -> TerritoryInput {
    TerritoryInput {
        territory_type_id,
        parent_id,
        name: name.to_string(),
        geometry: square(30.0, 59.0, 1.0),
        centre_point: None,
        is_city: false,
        admin_center_id: None,
        oktmo_code: None,
        okato_code: None,
        properties: Properties::new(),
    }
}

pub async fn territory(
    store: &UrbanStore,
    territory_type_id: TerritoryTypeId,
    parent_id: Option<TerritoryId>,
    name: &str,
) -> IduResult<TerritoryId> {
    let created = store
        .create_territory(territory_input(territory_type_id, parent_id, name))
        .await?;
    Ok(created.territory_id)
}

pub async fn count_rows(store: &UrbanStore, table: &str) -> IduResult<i64> {
    scalar(store, &format!("SELECT COUNT(*) AS n FROM {table}")).await
}

/// First column `n` of the first row, or 0 when there is no row.
pub async fn scalar(store: &UrbanStore, sql: &str) -> IduResult<i64> {
    let row = store
        .connection()
        .query_one_raw(Statement::from_string(store.backend(), sql.to_string()))
        .await?;
    match row {
        Some(row) => Ok(row.try_get("", "n")?),
        None => Ok(0),
    }
}

pub async fn execute(store: &UrbanStore, sql: &str) -> IduResult<()> {
    store
        .connection()
        .execute_raw(Statement::from_string(store.backend(), sql.to_string()))
        .await?;
    Ok(())
}
