use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, Order, Query, SelectStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend, QueryResult, TransactionTrait};

use idu_urban_core::{
    GeometryProfile, Hexagon, HexagonId, HexagonInput, IdentityKeyName, IduError, IduResult,
    IndicatorId, IndicatorValueId, KeyValue, ObjectGeometryId, Scenario, ScenarioApi, ScenarioId,
    ScenarioIndicatorValue, ScenarioIndicatorValueInput, ScenarioInput, ScenarioObjectGeometry,
    ScenarioObjectGeometryInput, ScenarioPhase, TerritoryId, current_identity_key,
    resolve_centre_point,
};

use crate::db::{
    HexagonsData, IndicatorsData, IndicatorsDict, ProjectObjectGeometriesData, ScenariosData,
    project_table,
};
use crate::geometry::{ensure_territory, prepare_object_geometry, read_object_geometry};
use crate::identity::find_identity_conflict;
use crate::store::{
    UrbanStore, col_name, encode_properties, ensure_exists, insert_returning_id, now, query_all,
    query_one, read_geometry, read_opt_i32, read_properties, required_name,
};

async fn fetch_scenario<C>(conn: &C, backend: DatabaseBackend, scenario_id: i32) -> IduResult<Option<Scenario>>
where
    C: ConnectionTrait,
{
    let select = Query::select()
        .from(project_table(backend, ScenariosData::Table))
        .columns([
            ScenariosData::ScenarioId,
            ScenariosData::Name,
            ScenariosData::IsBased,
            ScenariosData::Phase,
            ScenariosData::PhasePercentage,
            ScenariosData::Properties,
            ScenariosData::CreatedAt,
            ScenariosData::UpdatedAt,
        ])
        .and_where(Expr::col(ScenariosData::ScenarioId).eq(scenario_id))
        .to_owned();
    let Some(row) = query_one(conn, &select).await? else {
        return Ok(None);
    };
    let phase: Option<String> = row.try_get("", &col_name(ScenariosData::Phase))?;
    Ok(Some(Scenario {
        scenario_id: ScenarioId(scenario_id),
        name: row.try_get("", &col_name(ScenariosData::Name))?,
        is_based: row.try_get("", &col_name(ScenariosData::IsBased))?,
        phase: phase.as_deref().map(ScenarioPhase::parse).transpose()?,
        phase_percentage: row.try_get("", &col_name(ScenariosData::PhasePercentage))?,
        properties: read_properties(&row, ScenariosData::Properties)?,
        created_at: row.try_get("", &col_name(ScenariosData::CreatedAt))?,
        updated_at: row.try_get("", &col_name(ScenariosData::UpdatedAt))?,
    }))
}

async fn fetch_scenario_geometry<C>(
    conn: &C,
    backend: DatabaseBackend,
    object_geometry_id: i32,
) -> IduResult<Option<ScenarioObjectGeometry>>
where
    C: ConnectionTrait,
{
    let select = Query::select()
        .from(project_table(backend, ProjectObjectGeometriesData::Table))
        .columns([
            ProjectObjectGeometriesData::ObjectGeometryId,
            ProjectObjectGeometriesData::ScenarioId,
            ProjectObjectGeometriesData::TerritoryId,
            ProjectObjectGeometriesData::Geometry,
            ProjectObjectGeometriesData::CentrePoint,
            ProjectObjectGeometriesData::Address,
            ProjectObjectGeometriesData::OsmId,
            ProjectObjectGeometriesData::CreatedAt,
            ProjectObjectGeometriesData::UpdatedAt,
        ])
        .and_where(Expr::col(ProjectObjectGeometriesData::ObjectGeometryId).eq(object_geometry_id))
        .to_owned();
    let Some(row) = query_one(conn, &select).await? else {
        return Ok(None);
    };
    Ok(Some(ScenarioObjectGeometry {
        scenario_id: ScenarioId(row.try_get("", &col_name(ProjectObjectGeometriesData::ScenarioId))?),
        geometry: read_object_geometry(&row)?,
    }))
}

fn select_indicator_values(backend: DatabaseBackend) -> SelectStatement {
    Query::select()
        .from(project_table(backend, IndicatorsData::Table))
        .columns([
            IndicatorsData::IndicatorValueId,
            IndicatorsData::IndicatorId,
            IndicatorsData::ScenarioId,
            IndicatorsData::TerritoryId,
            IndicatorsData::HexagonId,
            IndicatorsData::Value,
            IndicatorsData::Comment,
            IndicatorsData::InformationSource,
            IndicatorsData::Properties,
            IndicatorsData::CreatedAt,
            IndicatorsData::UpdatedAt,
        ])
        .to_owned()
}

fn read_indicator_value(row: &QueryResult) -> IduResult<ScenarioIndicatorValue> {
    Ok(ScenarioIndicatorValue {
        indicator_value_id: IndicatorValueId(row.try_get("", &col_name(IndicatorsData::IndicatorValueId))?),
        indicator_id: IndicatorId(row.try_get("", &col_name(IndicatorsData::IndicatorId))?),
        scenario_id: ScenarioId(row.try_get("", &col_name(IndicatorsData::ScenarioId))?),
        territory_id: read_opt_i32(row, IndicatorsData::TerritoryId)?.map(TerritoryId),
        hexagon_id: read_opt_i32(row, IndicatorsData::HexagonId)?.map(HexagonId),
        value: row.try_get("", &col_name(IndicatorsData::Value))?,
        comment: row.try_get("", &col_name(IndicatorsData::Comment))?,
        information_source: row.try_get("", &col_name(IndicatorsData::InformationSource))?,
        properties: read_properties(row, IndicatorsData::Properties)?,
        created_at: row.try_get("", &col_name(IndicatorsData::CreatedAt))?,
        updated_at: row.try_get("", &col_name(IndicatorsData::UpdatedAt))?,
    })
}

async fn ensure_scenario<C>(conn: &C, backend: DatabaseBackend, scenario_id: ScenarioId) -> IduResult<()>
where
    C: ConnectionTrait,
{
    ensure_exists(
        conn,
        project_table(backend, ScenariosData::Table),
        ScenariosData::ScenarioId,
        scenario_id.get(),
        "scenario",
    )
    .await
}

#[async_trait]
impl ScenarioApi for UrbanStore {
    async fn create_scenario(&self, input: ScenarioInput) -> IduResult<Scenario> {
        let name = required_name(&input.name, "scenario")?;
        if let Some(percentage) = input.phase_percentage {
            if !(0.0..=100.0).contains(&percentage) {
                return Err(IduError::validation(format!(
                    "phase_percentage must lie in 0..=100, got {percentage}"
                )));
            }
        }
        let properties = encode_properties(&input.properties)?;
        self.timed("create_scenario", async move {
            let stamp = now();
            let insert = Query::insert()
                .into_table(project_table(self.backend, ScenariosData::Table))
                .columns([
                    ScenariosData::Name,
                    ScenariosData::IsBased,
                    ScenariosData::Phase,
                    ScenariosData::PhasePercentage,
                    ScenariosData::Properties,
                    ScenariosData::CreatedAt,
                    ScenariosData::UpdatedAt,
                ])
                .values_panic([
                    name.into(),
                    input.is_based.into(),
                    input.phase.map(|phase| phase.as_str().to_string()).into(),
                    input.phase_percentage.into(),
                    properties.into(),
                    stamp.into(),
                    stamp.into(),
                ])
                .returning_col(ScenariosData::ScenarioId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, ScenariosData::ScenarioId).await?;
            fetch_scenario(&self.conn, self.backend, id)
                .await?
                .ok_or_else(|| IduError::storage(format!("scenario {id} vanished")))
        })
        .await
    }

    async fn create_scenario_object_geometry(
        &self,
        input: ScenarioObjectGeometryInput,
    ) -> IduResult<ScenarioObjectGeometry> {
        let centre_point = prepare_object_geometry(&input.geometry, None)?;
        self.timed("create_scenario_object_geometry", async move {
            ensure_scenario(&self.conn, self.backend, input.scenario_id).await?;
            let payload = &input.geometry;
            ensure_territory(&self.conn, payload.territory_id).await?;
            let stamp = now();
            let insert = Query::insert()
                .into_table(project_table(self.backend, ProjectObjectGeometriesData::Table))
                .columns([
                    ProjectObjectGeometriesData::ScenarioId,
                    ProjectObjectGeometriesData::TerritoryId,
                    ProjectObjectGeometriesData::Geometry,
                    ProjectObjectGeometriesData::CentrePoint,
                    ProjectObjectGeometriesData::Address,
                    ProjectObjectGeometriesData::OsmId,
                    ProjectObjectGeometriesData::CreatedAt,
                    ProjectObjectGeometriesData::UpdatedAt,
                ])
                .values_panic([
                    input.scenario_id.get().into(),
                    payload.territory_id.map(TerritoryId::get).into(),
                    payload.geometry.to_json()?.into(),
                    centre_point.to_json()?.into(),
                    payload.address.clone().into(),
                    payload.osm_id.clone().into(),
                    stamp.into(),
                    stamp.into(),
                ])
                .returning_col(ProjectObjectGeometriesData::ObjectGeometryId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, ProjectObjectGeometriesData::ObjectGeometryId).await?;
            fetch_scenario_geometry(&self.conn, self.backend, id)
                .await?
                .ok_or_else(|| IduError::storage(format!("scenario object geometry {id} vanished")))
        })
        .await
    }

    async fn get_scenario_object_geometry(
        &self,
        object_geometry_id: ObjectGeometryId,
    ) -> IduResult<ScenarioObjectGeometry> {
        self.timed("get_scenario_object_geometry", async move {
            fetch_scenario_geometry(&self.conn, self.backend, object_geometry_id.get())
                .await?
                .ok_or_else(|| {
                    IduError::not_found(format!(
                        "scenario object geometry {object_geometry_id} not found"
                    ))
                })
        })
        .await
    }

    async fn create_hexagon(&self, input: HexagonInput) -> IduResult<Hexagon> {
        input.geometry.validate(GeometryProfile::Areal)?;
        let centre_point = resolve_centre_point(&input.geometry, input.centre_point.clone())?;
        let properties = encode_properties(&input.properties)?;
        self.timed("create_hexagon", async move {
            ensure_territory(&self.conn, Some(input.territory_id)).await?;
            let insert = Query::insert()
                .into_table(project_table(self.backend, HexagonsData::Table))
                .columns([
                    HexagonsData::TerritoryId,
                    HexagonsData::Geometry,
                    HexagonsData::CentrePoint,
                    HexagonsData::Properties,
                ])
                .values_panic([
                    input.territory_id.get().into(),
                    input.geometry.to_json()?.into(),
                    centre_point.to_json()?.into(),
                    properties.into(),
                ])
                .returning_col(HexagonsData::HexagonId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, HexagonsData::HexagonId).await?;
            let select = Query::select()
                .from(project_table(self.backend, HexagonsData::Table))
                .columns([
                    HexagonsData::Geometry,
                    HexagonsData::CentrePoint,
                    HexagonsData::Properties,
                ])
                .and_where(Expr::col(HexagonsData::HexagonId).eq(id))
                .to_owned();
            let row = query_one(&self.conn, &select)
                .await?
                .ok_or_else(|| IduError::storage(format!("hexagon {id} vanished")))?;
            Ok(Hexagon {
                hexagon_id: HexagonId(id),
                territory_id: input.territory_id,
                geometry: read_geometry(&row, HexagonsData::Geometry)?,
                centre_point: read_geometry(&row, HexagonsData::CentrePoint)?,
                properties: read_properties(&row, HexagonsData::Properties)?,
            })
        })
        .await
    }

    async fn add_scenario_indicator_value(
        &self,
        input: ScenarioIndicatorValueInput,
    ) -> IduResult<ScenarioIndicatorValue> {
        match (input.territory_id, input.hexagon_id) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(IduError::validation(
                    "exactly one of territory_id and hexagon_id must be set",
                ));
            }
        }
        if !input.value.is_finite() {
            return Err(IduError::validation("indicator value must be finite"));
        }
        let properties = encode_properties(&input.properties)?;
        self.timed("add_scenario_indicator_value", async move {
            let backend = self.backend;
            let tx = self.conn.begin().await?;
            ensure_scenario(&tx, backend, input.scenario_id).await?;
            ensure_exists(
                &tx,
                IndicatorsDict::Table,
                IndicatorsDict::IndicatorId,
                input.indicator_id.get(),
                "indicator",
            )
            .await?;
            ensure_territory(&tx, input.territory_id).await?;
            if let Some(hexagon_id) = input.hexagon_id {
                ensure_exists(
                    &tx,
                    project_table(backend, HexagonsData::Table),
                    HexagonsData::HexagonId,
                    hexagon_id.get(),
                    "hexagon",
                )
                .await?;
            }

            let spec = current_identity_key(IdentityKeyName::ScenarioIndicatorValue);
            let key = [
                KeyValue::from(input.indicator_id.get()),
                KeyValue::from(input.scenario_id.get()),
                KeyValue::from(input.territory_id.map(TerritoryId::get)),
                KeyValue::from(input.hexagon_id.map(HexagonId::get)),
            ];
            if let Some(existing) = find_identity_conflict(&tx, spec, &key, None).await? {
                return Err(IduError::uniqueness(format!(
                    "scenario {} already has value {existing} for indicator {}",
                    input.scenario_id, input.indicator_id
                )));
            }

            let stamp = now();
            let insert = Query::insert()
                .into_table(project_table(backend, IndicatorsData::Table))
                .columns([
                    IndicatorsData::IndicatorId,
                    IndicatorsData::ScenarioId,
                    IndicatorsData::TerritoryId,
                    IndicatorsData::HexagonId,
                    IndicatorsData::Value,
                    IndicatorsData::Comment,
                    IndicatorsData::InformationSource,
                    IndicatorsData::Properties,
                    IndicatorsData::CreatedAt,
                    IndicatorsData::UpdatedAt,
                ])
                .values_panic([
                    input.indicator_id.get().into(),
                    input.scenario_id.get().into(),
                    input.territory_id.map(TerritoryId::get).into(),
                    input.hexagon_id.map(HexagonId::get).into(),
                    input.value.into(),
                    input.comment.clone().into(),
                    input.information_source.clone().into(),
                    properties.into(),
                    stamp.into(),
                    stamp.into(),
                ])
                .returning_col(IndicatorsData::IndicatorValueId)
                .to_owned();
            let id = insert_returning_id(&tx, &insert, IndicatorsData::IndicatorValueId).await?;
            let select = select_indicator_values(backend)
                .and_where(Expr::col(IndicatorsData::IndicatorValueId).eq(id))
                .to_owned();
            let row = query_one(&tx, &select)
                .await?
                .ok_or_else(|| IduError::storage(format!("indicator value {id} vanished")))?;
            let value = read_indicator_value(&row)?;
            tx.commit().await?;
            Ok(value)
        })
        .await
    }

    async fn list_scenario_indicator_values(
        &self,
        scenario_id: ScenarioId,
    ) -> IduResult<Vec<ScenarioIndicatorValue>> {
        self.timed("list_scenario_indicator_values", async move {
            let select = select_indicator_values(self.backend)
                .and_where(Expr::col(IndicatorsData::ScenarioId).eq(scenario_id.get()))
                .order_by(IndicatorsData::IndicatorValueId, Order::Asc)
                .to_owned();
            query_all(&self.conn, &select)
                .await?
                .iter()
                .map(read_indicator_value)
                .collect()
        })
        .await
    }
}
