mod support;

use chrono::NaiveDate;
use idu_urban_store::{
    DateFieldType, IdentityKeyName, IdentityMaintenanceApi, IduError, IduResult, IndicatorApi,
    IndicatorId, IndicatorInput, IndicatorValueType, Properties, ScenarioApi,
    ScenarioIndicatorValueInput, ScenarioInput, TerritoryId, TerritoryIndicatorValueInput,
    UrbanStore,
};
use support::{count_rows, execute, open, scalar, territory, territory_type};
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("date")
}

async fn indicator(store: &UrbanStore, name: &str) -> IduResult<IndicatorId> {
    let created = store
        .create_indicator(IndicatorInput {
            name_full: name.to_string(),
            name_short: None,
            measurement_unit: None,
        })
        .await?;
    Ok(created.indicator_id)
}

fn value_input(
    indicator_id: IndicatorId,
    territory_id: TerritoryId,
    date_type: DateFieldType,
    date_value: NaiveDate,
    value: f64,
) -> TerritoryIndicatorValueInput {
    TerritoryIndicatorValueInput {
        indicator_id,
        territory_id,
        date_type,
        date_value,
        value,
        value_type: IndicatorValueType::Real,
        information_source: "rosstat".to_string(),
    }
}

#[tokio::test]
async fn period_dates_must_open_their_period() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let kind = territory_type(&store, "region").await?;
    let region = territory(&store, kind, None, "Region").await?;
    let population = indicator(&store, "Population").await?;

    for (date_type, bad) in [
        (DateFieldType::Year, date(2024, 2, 1)),
        (DateFieldType::HalfYear, date(2024, 4, 1)),
        (DateFieldType::Quarter, date(2024, 5, 1)),
        (DateFieldType::Month, date(2024, 5, 2)),
    ] {
        let err = store
            .add_territory_indicator_value(value_input(population, region, date_type, bad, 1.0))
            .await
            .expect_err("bad period date");
        assert!(matches!(err, IduError::Validation { .. }), "{date_type:?} {bad}");
    }
    for (date_type, good) in [
        (DateFieldType::Year, date(2024, 1, 1)),
        (DateFieldType::HalfYear, date(2024, 7, 1)),
        (DateFieldType::Quarter, date(2024, 10, 1)),
        (DateFieldType::Month, date(2024, 5, 1)),
        (DateFieldType::Day, date(2024, 5, 17)),
    ] {
        store
            .add_territory_indicator_value(value_input(population, region, date_type, good, 1.0))
            .await?;
    }
    assert_eq!(store.list_territory_indicator_values(region, None).await?.len(), 5);
    Ok(())
}

#[tokio::test]
async fn add_conflicts_and_put_overwrites() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let kind = territory_type(&store, "city").await?;
    let city = territory(&store, kind, None, "City").await?;
    let population = indicator(&store, "Population").await?;
    let area = indicator(&store, "Area").await?;
    let year = date(2023, 1, 1);

    let first = store
        .add_territory_indicator_value(value_input(population, city, DateFieldType::Year, year, 100.0))
        .await?;
    let err = store
        .add_territory_indicator_value(value_input(population, city, DateFieldType::Year, year, 101.0))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, IduError::UniquenessConflict { .. }));
    assert_eq!(err.status_code(), 409);

    // A different value type or source is a different identity.
    let mut target = value_input(population, city, DateFieldType::Year, year, 120.0);
    target.value_type = IndicatorValueType::Target;
    store.add_territory_indicator_value(target).await?;
    let mut other_source = value_input(population, city, DateFieldType::Year, year, 99.0);
    other_source.information_source = "census".to_string();
    store.add_territory_indicator_value(other_source).await?;

    let overwritten = store
        .put_territory_indicator_value(value_input(population, city, DateFieldType::Year, year, 105.0))
        .await?;
    assert_eq!(overwritten.value, 105.0);
    assert_eq!(overwritten.created_at, first.created_at);
    assert!(overwritten.updated_at >= first.updated_at);

    store
        .put_territory_indicator_value(value_input(area, city, DateFieldType::Year, year, 12.5))
        .await?;
    assert_eq!(
        store
            .list_territory_indicator_values(city, Some(population))
            .await?
            .len(),
        3
    );
    assert_eq!(store.list_territory_indicator_values(city, None).await?.len(), 4);

    let err = store
        .put_territory_indicator_value(value_input(
            IndicatorId(404),
            city,
            DateFieldType::Year,
            year,
            1.0,
        ))
        .await
        .expect_err("missing indicator");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));
    let err = store
        .put_territory_indicator_value(value_input(
            population,
            city,
            DateFieldType::Year,
            year,
            f64::NAN,
        ))
        .await
        .expect_err("nan");
    assert!(matches!(err, IduError::Validation { .. }));
    Ok(())
}

#[tokio::test]
async fn enforcing_a_key_collapses_duplicates_and_restores_the_index() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let kind = territory_type(&store, "district").await?;
    let district = territory(&store, kind, None, "District").await?;
    let population = indicator(&store, "Population").await?;
    let scenario = store
        .create_scenario(ScenarioInput {
            name: "baseline".to_string(),
            is_based: true,
            phase: None,
            phase_percentage: None,
            properties: Properties::new(),
        })
        .await?;
    let kept = store
        .add_scenario_indicator_value(ScenarioIndicatorValueInput {
            indicator_id: population,
            scenario_id: scenario.scenario_id,
            territory_id: Some(district),
            hexagon_id: None,
            value: 10.0,
            comment: None,
            information_source: None,
            properties: Properties::new(),
        })
        .await?;

    // Simulate data written before the key existed.
    execute(&store, "DROP INDEX indicators_data_unique").await?;
    for (value, stamp) in [(11.0, "2001-01-01T00:00:00+00:00"), (12.0, "2002-01-01T00:00:00+00:00")] {
        execute(
            &store,
            &format!(
                "INSERT INTO user_projects_indicators_data \
                 (indicator_id, scenario_id, territory_id, hexagon_id, value, properties, created_at, updated_at) \
                 VALUES ({population}, {}, {district}, NULL, {value}, '{{}}', '{stamp}', '{stamp}')",
                scenario.scenario_id
            ),
        )
        .await?;
    }
    assert_eq!(count_rows(&store, "user_projects_indicators_data").await?, 3);

    let report = store
        .enforce_identity_key(IdentityKeyName::ScenarioIndicatorValue, None)
        .await?;
    assert_eq!(report.scanned, 3);
    assert_eq!(report.duplicate_groups, 1);
    assert_eq!(report.removed, 2);
    assert_eq!(report.index_name, "indicators_data_unique");

    let remaining = store
        .list_scenario_indicator_values(scenario.scenario_id)
        .await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].indicator_value_id, kept.indicator_value_id);
    assert_eq!(
        scalar(
            &store,
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'index' AND name = 'indicators_data_unique'",
        )
        .await?,
        1
    );

    // Running it again finds nothing to do.
    let again = store
        .enforce_identity_key(IdentityKeyName::ScenarioIndicatorValue, None)
        .await?;
    assert_eq!(again.removed, 0);
    Ok(())
}

#[tokio::test]
async fn primary_key_identities_cannot_be_enforced() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let err = store
        .enforce_identity_key(IdentityKeyName::Buffer, None)
        .await
        .expect_err("primary key");
    assert!(matches!(err, IduError::Validation { .. }));
    let err = store
        .enforce_identity_key(IdentityKeyName::ServiceTypeNormative, Some(9))
        .await
        .expect_err("unknown version");
    assert!(matches!(err, IduError::Validation { .. }));
    Ok(())
}
