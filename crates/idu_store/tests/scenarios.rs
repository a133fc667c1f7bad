mod support;

use idu_urban_store::{
    Geometry, HexagonId, HexagonInput, IduError, IduResult, IndicatorApi, IndicatorInput,
    ObjectGeometryInput, Properties, ScenarioApi, ScenarioId, ScenarioIndicatorValueInput,
    ScenarioInput, ScenarioObjectGeometryInput, ScenarioPhase,
};
use serde_json::json;
use support::{count_rows, open, square, territory, territory_type};
use tempfile::tempdir;

fn scenario(name: &str, phase_percentage: Option<f64>) -> ScenarioInput {
    ScenarioInput {
        name: name.to_string(),
        is_based: false,
        phase: Some(ScenarioPhase::Design),
        phase_percentage,
        properties: Properties::new(),
    }
}

#[tokio::test]
async fn scenario_phase_percentage_is_bounded() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;

    let mut input = scenario("Riverside", Some(40.0));
    input.properties.insert("author".to_string(), json!("planning office"));
    let created = store.create_scenario(input).await?;
    assert_eq!(created.phase, Some(ScenarioPhase::Design));
    assert_eq!(created.phase_percentage, Some(40.0));
    assert_eq!(created.properties.get("author"), Some(&json!("planning office")));

    for bad in [-0.5, 100.5] {
        let err = store
            .create_scenario(scenario("Overrun", Some(bad)))
            .await
            .expect_err("out of range");
        assert!(matches!(err, IduError::Validation { .. }));
    }
    store.create_scenario(scenario("Done", Some(100.0))).await?;
    assert_eq!(count_rows(&store, "user_projects_scenarios_data").await?, 2);
    Ok(())
}

#[tokio::test]
async fn scenario_values_target_one_territory_or_hexagon() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let kind = territory_type(&store, "district").await?;
    let district = territory(&store, kind, None, "District").await?;
    let indicator = store
        .create_indicator(IndicatorInput {
            name_full: "Green area share".to_string(),
            name_short: Some("green".to_string()),
            measurement_unit: Some("%".to_string()),
        })
        .await?
        .indicator_id;
    let project = store.create_scenario(scenario("Park", None)).await?;
    let hexagon = store
        .create_hexagon(HexagonInput {
            territory_id: district,
            geometry: square(30.0, 59.0, 0.05),
            centre_point: None,
            properties: Properties::new(),
        })
        .await?;
    assert!(hexagon.centre_point.approx_eq(&Geometry::Point([30.025, 59.025]), 1e-9));

    let value = |territory_id, hexagon_id| ScenarioIndicatorValueInput {
        indicator_id: indicator,
        scenario_id: project.scenario_id,
        territory_id,
        hexagon_id,
        value: 12.5,
        comment: Some("after planting".to_string()),
        information_source: None,
        properties: Properties::new(),
    };

    let err = store
        .add_scenario_indicator_value(value(Some(district), Some(hexagon.hexagon_id)))
        .await
        .expect_err("both");
    assert!(matches!(err, IduError::Validation { .. }));
    let err = store
        .add_scenario_indicator_value(value(None, None))
        .await
        .expect_err("neither");
    assert!(matches!(err, IduError::Validation { .. }));

    let by_territory = store
        .add_scenario_indicator_value(value(Some(district), None))
        .await?;
    let by_hexagon = store
        .add_scenario_indicator_value(value(None, Some(hexagon.hexagon_id)))
        .await?;
    assert_eq!(by_territory.comment.as_deref(), Some("after planting"));

    // The NULL hexagon still takes part in the identity.
    let err = store
        .add_scenario_indicator_value(value(Some(district), None))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, IduError::UniquenessConflict { .. }));

    let err = store
        .add_scenario_indicator_value(value(None, Some(HexagonId(404))))
        .await
        .expect_err("missing hexagon");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));
    let mut orphan = value(Some(district), None);
    orphan.scenario_id = ScenarioId(404);
    let err = store
        .add_scenario_indicator_value(orphan)
        .await
        .expect_err("missing scenario");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));

    let listed = store
        .list_scenario_indicator_values(project.scenario_id)
        .await?;
    assert_eq!(listed, vec![by_territory, by_hexagon]);
    Ok(())
}

#[tokio::test]
async fn scenario_geometries_live_in_the_project_schema() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let project = store.create_scenario(scenario("Tram depot", None)).await?;
    let created = store
        .create_scenario_object_geometry(ScenarioObjectGeometryInput {
            scenario_id: project.scenario_id,
            geometry: ObjectGeometryInput {
                territory_id: None,
                geometry: square(30.0, 59.0, 0.2),
                centre_point: None,
                address: Some("Depot lane".to_string()),
                osm_id: None,
            },
        })
        .await?;
    assert_eq!(created.scenario_id, project.scenario_id);
    assert_eq!(
        store
            .get_scenario_object_geometry(created.geometry.object_geometry_id)
            .await?,
        created
    );
    assert_eq!(count_rows(&store, "object_geometries_data").await?, 0);
    assert_eq!(count_rows(&store, "user_projects_object_geometries_data").await?, 1);

    let err = store
        .create_scenario_object_geometry(ScenarioObjectGeometryInput {
            scenario_id: ScenarioId(404),
            geometry: ObjectGeometryInput {
                territory_id: None,
                geometry: Geometry::Point([30.0, 59.0]),
                centre_point: None,
                address: None,
                osm_id: None,
            },
        })
        .await
        .expect_err("missing scenario");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));
    Ok(())
}
