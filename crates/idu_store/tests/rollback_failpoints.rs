mod support;

use std::path::Path;

use idu_urban_store::{
    FunctionDictionaryApi, FunctionInput, FunctionKind, IdentityKeyName, IdentityMaintenanceApi,
    IduError, IduResult, IndicatorApi, IndicatorInput, NormativeApi, NormativeFields,
    NormativeFilter, NormativeInput, Properties, ScenarioApi, ScenarioIndicatorValueInput,
    ScenarioInput, StoreConfig, TerritoryApi, TerritoryTypeInput, UrbanFunctionId, UrbanStore,
};
use support::{
    count_rows, execute, hold_write_lock, open, scalar, territory, territory_input, territory_type,
};
use tempfile::tempdir;

const FAILPOINTS: [&str; 8] = [
    "territory.create.after_insert",
    "territory.update.after_move",
    "territory.delete.before_row",
    "function.create.after_insert",
    "function.update.after_move",
    "function.delete.before_row",
    "normative.add.after_insert",
    "identity.enforce.before_commit",
];

/// A second handle on the same file whose writes abort at every failpoint.
async fn open_failing(dir: &Path) -> IduResult<UrbanStore> {
    let mut config = StoreConfig::default_sqlite(dir.join("urban.sqlite").to_string_lossy());
    config.failpoints = Some(FAILPOINTS.iter().map(|key| key.to_string()).collect());
    UrbanStore::connect(&config, dir).await
}

fn assert_failpoint(err: IduError) {
    match err {
        IduError::Storage { message } => assert!(message.starts_with("failpoint "), "{message}"),
        other => panic!("expected failpoint error, got {other:?}"),
    }
}

#[tokio::test]
async fn territory_writes_roll_back_as_a_unit() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let failing = open_failing(dir.path()).await?;
    let kind = territory_type(&store, "region").await?;
    let a = territory(&store, kind, None, "A").await?;
    let b = territory(&store, kind, Some(a), "B").await?;
    let c = territory(&store, kind, Some(b), "C").await?;
    let other = territory(&store, kind, None, "other").await?;

    let err = failing
        .create_territory(territory_input(kind, Some(a), "D"))
        .await
        .expect_err("create failpoint");
    assert_failpoint(err);
    assert_eq!(count_rows(&store, "territories_data").await?, 4);

    // The subtree relevel happened before the abort and must not survive it.
    let err = failing
        .update_territory(b, territory_input(kind, Some(other), "B"))
        .await
        .expect_err("update failpoint");
    assert_failpoint(err);
    let b_after = store.get_territory(b).await?;
    assert_eq!(b_after.parent_id, Some(a));
    assert_eq!(b_after.level, 1);
    assert_eq!(store.get_territory(c).await?.level, 2);

    let err = failing.delete_territory(b).await.expect_err("delete failpoint");
    assert_failpoint(err);
    let c_after = store.get_territory(c).await?;
    assert_eq!(c_after.parent_id, Some(b));
    assert_eq!(c_after.level, 2);
    assert_eq!(count_rows(&store, "territories_data").await?, 4);
    Ok(())
}

#[tokio::test]
async fn function_writes_roll_back_labels_and_levels() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let failing = open_failing(dir.path()).await?;
    let kind = FunctionKind::UrbanFunction;
    let input = |parent_id, name: &str| FunctionInput {
        parent_id,
        name: name.to_string(),
        code: None,
    };

    let first = store.create_function(kind, input(None, "Housing")).await?;
    let second = store.create_function(kind, input(None, "Health")).await?;
    let child = store
        .create_function(kind, input(Some(second.function_id), "Clinics"))
        .await?;

    let err = failing
        .create_function(kind, input(None, "Transport"))
        .await
        .expect_err("create failpoint");
    assert_failpoint(err);
    let err = failing
        .update_function(kind, child.function_id, input(Some(first.function_id), "Clinics"))
        .await
        .expect_err("update failpoint");
    assert_failpoint(err);
    let err = failing
        .delete_function(kind, second.function_id)
        .await
        .expect_err("delete failpoint");
    assert_failpoint(err);

    let roots = store.list_functions(kind, None).await?;
    let labels: Vec<_> = roots.iter().map(|record| record.list_label.as_str()).collect();
    assert_eq!(labels, vec!["1", "2"]);
    let child_after = store.get_function(kind, child.function_id).await?;
    assert_eq!(child_after.parent_id, Some(second.function_id));
    assert_eq!(child_after.list_label, "2.1");
    assert_eq!(child_after.level, 1);
    Ok(())
}

#[tokio::test]
async fn normative_and_identity_writes_roll_back() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let failing = open_failing(dir.path()).await?;

    let function = store
        .create_function(
            FunctionKind::UrbanFunction,
            FunctionInput {
                parent_id: None,
                name: "Culture".to_string(),
                code: None,
            },
        )
        .await?;
    let err = failing
        .add_normative(NormativeInput {
            fields: NormativeFields {
                urban_function_id: Some(UrbanFunctionId(function.function_id)),
                time_availability_minutes: Some(30),
                services_per_1000_normative: Some(0.1),
                ..NormativeFields::default()
            },
            territory_id: None,
            year: 2024,
            is_regulated: false,
            source: None,
        })
        .await
        .expect_err("normative failpoint");
    assert_failpoint(err);
    assert!(store.list_normatives(NormativeFilter::default()).await?.is_empty());

    let kind = territory_type(&store, "district").await?;
    let district = territory(&store, kind, None, "District").await?;
    let indicator = store
        .create_indicator(IndicatorInput {
            name_full: "Jobs".to_string(),
            name_short: None,
            measurement_unit: None,
        })
        .await?
        .indicator_id;
    let project = store
        .create_scenario(ScenarioInput {
            name: "Hub".to_string(),
            is_based: false,
            phase: None,
            phase_percentage: None,
            properties: Properties::new(),
        })
        .await?;
    store
        .add_scenario_indicator_value(ScenarioIndicatorValueInput {
            indicator_id: indicator,
            scenario_id: project.scenario_id,
            territory_id: Some(district),
            hexagon_id: None,
            value: 1.0,
            comment: None,
            information_source: None,
            properties: Properties::new(),
        })
        .await?;
    execute(&store, "DROP INDEX indicators_data_unique").await?;
    execute(
        &store,
        &format!(
            "INSERT INTO user_projects_indicators_data \
             (indicator_id, scenario_id, territory_id, value, properties, created_at, updated_at) \
             VALUES ({indicator}, {}, {district}, 2.0, '{{}}', \
             '2001-01-01T00:00:00+00:00', '2001-01-01T00:00:00+00:00')",
            project.scenario_id
        ),
    )
    .await?;

    let err = failing
        .enforce_identity_key(IdentityKeyName::ScenarioIndicatorValue, None)
        .await
        .expect_err("identity failpoint");
    assert_failpoint(err);
    assert_eq!(count_rows(&store, "user_projects_indicators_data").await?, 2);
    assert_eq!(
        scalar(
            &store,
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'index' AND name = 'indicators_data_unique'",
        )
        .await?,
        0
    );

    let report = store
        .enforce_identity_key(IdentityKeyName::ScenarioIndicatorValue, None)
        .await?;
    assert_eq!(report.removed, 1);
    Ok(())
}

#[tokio::test]
async fn busy_database_is_reported_as_a_transient_timeout() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let writer = open(dir.path()).await?;
    territory_type(&store, "region").await?;

    // The writer's own deadline is far away; the error comes from SQLite.
    let blocker = hold_write_lock(&store).await?;
    let err = writer
        .create_territory_type(TerritoryTypeInput {
            name: "district".to_string(),
        })
        .await
        .expect_err("database is locked");
    assert!(matches!(err, IduError::Timeout { .. }), "{err:?}");
    assert!(err.is_transient());
    assert_eq!(err.status_code(), 504);
    blocker.rollback().await?;

    territory_type(&writer, "district").await?;
    assert_eq!(count_rows(&store, "territory_types_dict").await?, 2);
    Ok(())
}
