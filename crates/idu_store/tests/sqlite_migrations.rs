use std::collections::HashSet;

use idu_urban_store::{
    IdentityKeyName, IduError, IduResult, StoreConfig, UrbanStore, identity_key,
    load_schema_manifest,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use tempfile::tempdir;

async fn list_tables(store: &UrbanStore) -> IduResult<HashSet<String>> {
    let rows = store
        .connection()
        .query_all_raw(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT name FROM sqlite_master WHERE type = 'table'",
        ))
        .await
        .map_err(IduError::from)?;
    let mut tables = HashSet::new();
    for row in rows {
        let name: String = row.try_get("", "name").map_err(IduError::from)?;
        tables.insert(name);
    }
    Ok(tables)
}

async fn list_indexes(store: &UrbanStore) -> IduResult<HashSet<String>> {
    let rows = store
        .connection()
        .query_all_raw(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT name FROM sqlite_master WHERE type = 'index'",
        ))
        .await?;
    let mut indexes = HashSet::new();
    for row in rows {
        let name: String = row.try_get("", "name")?;
        indexes.insert(name);
    }
    Ok(indexes)
}

#[tokio::test]
async fn sqlite_migrations_create_public_and_project_tables() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let config = StoreConfig::default_sqlite(base.join("urban.sqlite").to_string_lossy());
    let store = UrbanStore::connect(&config, base).await?;
    let tables = list_tables(&store).await?;
    for table in [
        "territory_types_dict",
        "territories_data",
        "urban_functions_dict",
        "physical_object_functions_dict",
        "physical_object_types_dict",
        "service_types_dict",
        "services_data",
        "service_types_normatives_data",
        "object_geometries_data",
        "functional_zones_data",
        "indicators_dict",
        "territory_indicators_data",
        "buffer_types_dict",
        "default_buffer_values_dict",
        "urban_objects_data",
        "buffers_data",
        "user_projects_scenarios_data",
        "user_projects_object_geometries_data",
        "user_projects_hexagons_data",
        "user_projects_indicators_data",
    ] {
        assert!(tables.contains(table), "expected table '{table}' to exist");
    }
    let indexes = list_indexes(&store).await?;
    assert!(indexes.contains("indicators_data_unique"));
    assert!(indexes.contains("service_types_normatives_data_service_type_unique"));
    // Idempotency check.
    let _store = UrbanStore::connect(&config, base).await?;
    Ok(())
}

#[tokio::test]
async fn manifest_lists_every_migrated_table() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = UrbanStore::connect_sqlite(&dir.path().join("urban.sqlite")).await?;
    let tables = list_tables(&store).await?;
    let manifest = load_schema_manifest()?;
    assert_eq!(manifest.migrations.len(), 3);
    assert_eq!(manifest.upgrade_path.len(), manifest.migrations.len());
    for table in &manifest.tables {
        let physical = match table.namespace.as_str() {
            "user_projects" => format!("user_projects_{}", table.name),
            _ => table.name.clone(),
        };
        assert!(tables.contains(&physical), "manifest table '{physical}' missing");
        assert!(!table.columns.is_empty());
    }
    let values = manifest
        .tables
        .iter()
        .find(|table| table.namespace == "user_projects" && table.name == "indicators_data")
        .expect("project indicator values");
    let unique = values
        .indexes
        .iter()
        .find(|index| index.name == "indicators_data_unique")
        .expect("identity index");
    assert!(unique.unique);
    assert_eq!(
        unique.columns,
        vec!["indicator_id", "scenario_id", "territory_id", "hexagon_id"]
    );
    Ok(())
}

#[tokio::test]
async fn project_identity_index_matches_its_key_version() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = UrbanStore::connect_sqlite(&dir.path().join("urban.sqlite")).await?;
    let rows = store
        .connection()
        .query_all_raw(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT name FROM pragma_index_info('indicators_data_unique') ORDER BY seqno",
        ))
        .await?;
    let mut columns = Vec::new();
    for row in rows {
        let name: String = row.try_get("", "name")?;
        columns.push(name);
    }
    let v1 = identity_key(IdentityKeyName::ScenarioIndicatorValue, 1).expect("v1");
    assert_eq!(columns, v1.columns);
    Ok(())
}
