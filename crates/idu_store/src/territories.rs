use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, Order, Query, SelectStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend, QueryResult};

use idu_urban_core::{
    GeometryProfile, HierarchyKind, IduError, IduResult, Territory, TerritoryApi, TerritoryId,
    TerritoryInput, TerritoryType, TerritoryTypeId, TerritoryTypeInput, resolve_centre_point,
};

use crate::db::{
    FunctionalZonesData, HexagonsData, IndicatorsData, ObjectGeometriesData,
    ProjectObjectGeometriesData, ServiceTypesNormativesData, TerritoriesData,
    TerritoryIndicatorsData, TerritoryTypesDict, project_table,
};
use crate::hierarchy::SqlHierarchy;
use crate::store::{
    UrbanStore, col_name, encode_properties, ensure_exists, exec, insert_returning_id, now,
    query_all, query_one, read_geometry, read_opt_i32, read_properties, required_name,
};

const TERRITORY_COLUMNS: [TerritoriesData; 14] = [
    TerritoriesData::TerritoryId,
    TerritoriesData::TerritoryTypeId,
    TerritoriesData::ParentId,
    TerritoriesData::Name,
    TerritoriesData::Level,
    TerritoriesData::Geometry,
    TerritoriesData::CentrePoint,
    TerritoriesData::IsCity,
    TerritoriesData::AdminCenterId,
    TerritoriesData::OktmoCode,
    TerritoriesData::OkatoCode,
    TerritoriesData::Properties,
    TerritoriesData::CreatedAt,
    TerritoriesData::UpdatedAt,
];

fn select_territories() -> SelectStatement {
    Query::select()
        .from(TerritoriesData::Table)
        .columns(TERRITORY_COLUMNS)
        .to_owned()
}

fn read_territory(row: &QueryResult) -> IduResult<Territory> {
    Ok(Territory {
        territory_id: TerritoryId(row.try_get("", &col_name(TerritoriesData::TerritoryId))?),
        territory_type_id: TerritoryTypeId(
            row.try_get("", &col_name(TerritoriesData::TerritoryTypeId))?,
        ),
        parent_id: read_opt_i32(row, TerritoriesData::ParentId)?.map(TerritoryId),
        name: row.try_get("", &col_name(TerritoriesData::Name))?,
        level: row.try_get("", &col_name(TerritoriesData::Level))?,
        geometry: read_geometry(row, TerritoriesData::Geometry)?,
        centre_point: read_geometry(row, TerritoriesData::CentrePoint)?,
        is_city: row.try_get("", &col_name(TerritoriesData::IsCity))?,
        admin_center_id: read_opt_i32(row, TerritoriesData::AdminCenterId)?.map(TerritoryId),
        oktmo_code: row.try_get("", &col_name(TerritoriesData::OktmoCode))?,
        okato_code: row.try_get("", &col_name(TerritoriesData::OkatoCode))?,
        properties: read_properties(row, TerritoriesData::Properties)?,
        created_at: row.try_get("", &col_name(TerritoriesData::CreatedAt))?,
        updated_at: row.try_get("", &col_name(TerritoriesData::UpdatedAt))?,
    })
}

pub(crate) async fn fetch_territory<C>(conn: &C, territory_id: i32) -> IduResult<Option<Territory>>
where
    C: ConnectionTrait,
{
    let select = select_territories()
        .and_where(Expr::col(TerritoriesData::TerritoryId).eq(territory_id))
        .to_owned();
    match query_one(conn, &select).await? {
        Some(row) => Ok(Some(read_territory(&row)?)),
        None => Ok(None),
    }
}

async fn check_territory_refs<C>(conn: &C, input: &TerritoryInput) -> IduResult<()>
where
    C: ConnectionTrait,
{
    ensure_exists(
        conn,
        TerritoryTypesDict::Table,
        TerritoryTypesDict::TerritoryTypeId,
        input.territory_type_id.get(),
        "territory type",
    )
    .await?;
    if let Some(admin_center) = input.admin_center_id {
        ensure_exists(
            conn,
            TerritoriesData::Table,
            TerritoriesData::TerritoryId,
            admin_center.get(),
            "admin center territory",
        )
        .await?;
    }
    Ok(())
}

#[async_trait]
impl TerritoryApi for UrbanStore {
    async fn create_territory_type(&self, input: TerritoryTypeInput) -> IduResult<TerritoryType> {
        let name = required_name(&input.name, "territory type")?;
        self.timed("create_territory_type", async move {
            let insert = Query::insert()
                .into_table(TerritoryTypesDict::Table)
                .columns([TerritoryTypesDict::Name])
                .values_panic([name.clone().into()])
                .returning_col(TerritoryTypesDict::TerritoryTypeId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, TerritoryTypesDict::TerritoryTypeId).await?;
            Ok(TerritoryType {
                territory_type_id: TerritoryTypeId(id),
                name,
            })
        })
        .await
    }

    async fn create_territory(&self, input: TerritoryInput) -> IduResult<Territory> {
        let name = required_name(&input.name, "territory")?;
        input.geometry.validate(GeometryProfile::AreaOrPoint)?;
        let centre_point = resolve_centre_point(&input.geometry, input.centre_point.clone())?;
        let geometry = input.geometry.to_json()?;
        let centre_point = centre_point.to_json()?;
        let properties = encode_properties(&input.properties)?;
        self.timed("create_territory", async move {
            let (_guard, tx) = self.begin_hierarchy_write(HierarchyKind::Territory).await?;
            check_territory_refs(&tx, &input).await?;
            let parent_id = input.parent_id.map(TerritoryId::get);
            let mut nodes = SqlHierarchy::new(&tx, HierarchyKind::Territory);
            let level = self
                .engine(HierarchyKind::Territory)
                .level_for_parent(&mut nodes, parent_id)
                .await?;
            let stamp = now();
            let insert = Query::insert()
                .into_table(TerritoriesData::Table)
                .columns([
                    TerritoriesData::TerritoryTypeId,
                    TerritoriesData::ParentId,
                    TerritoriesData::Name,
                    TerritoriesData::Level,
                    TerritoriesData::Geometry,
                    TerritoriesData::CentrePoint,
                    TerritoriesData::IsCity,
                    TerritoriesData::AdminCenterId,
                    TerritoriesData::OktmoCode,
                    TerritoriesData::OkatoCode,
                    TerritoriesData::Properties,
                    TerritoriesData::CreatedAt,
                    TerritoriesData::UpdatedAt,
                ])
                .values_panic([
                    input.territory_type_id.get().into(),
                    parent_id.into(),
                    name.into(),
                    level.into(),
                    geometry.into(),
                    centre_point.into(),
                    input.is_city.into(),
                    input.admin_center_id.map(TerritoryId::get).into(),
                    input.oktmo_code.clone().into(),
                    input.okato_code.clone().into(),
                    properties.into(),
                    stamp.into(),
                    stamp.into(),
                ])
                .returning_col(TerritoriesData::TerritoryId)
                .to_owned();
            let territory_id = insert_returning_id(&tx, &insert, TerritoriesData::TerritoryId).await?;
            self.maybe_failpoint("territory.create.after_insert")?;
            let territory = fetch_territory(&tx, territory_id)
                .await?
                .ok_or_else(|| IduError::storage(format!("territory {territory_id} vanished")))?;
            tx.commit().await?;
            Ok(territory)
        })
        .await
    }

    async fn update_territory(&self, territory_id: TerritoryId, input: TerritoryInput) -> IduResult<Territory> {
        let name = required_name(&input.name, "territory")?;
        let properties = encode_properties(&input.properties)?;
        self.timed("update_territory", async move {
            let id = territory_id.get();
            let (_guard, tx) = self.begin_hierarchy_write(HierarchyKind::Territory).await?;
            let existing = fetch_territory(&tx, id)
                .await?
                .ok_or_else(|| IduError::not_found(format!("territory {id} not found")))?;
            input
                .geometry
                .validate_change(Some(&existing.geometry), GeometryProfile::AreaOrPoint)?;
            let centre_point = match input.centre_point.clone() {
                Some(point) => resolve_centre_point(&input.geometry, Some(point))?,
                None if input.geometry == existing.geometry => existing.centre_point.clone(),
                None => resolve_centre_point(&input.geometry, None)?,
            };
            check_territory_refs(&tx, &input).await?;

            let mut nodes = SqlHierarchy::new(&tx, HierarchyKind::Territory);
            let moved = self
                .engine(HierarchyKind::Territory)
                .move_node(&mut nodes, id, input.parent_id.map(TerritoryId::get))
                .await?;
            if moved.relevelled > 0 {
                log::debug!(
                    "territory {id} moved from {:?}, {} levels rewritten",
                    moved.previous_parent,
                    moved.relevelled
                );
            }
            self.maybe_failpoint("territory.update.after_move")?;

            let update = Query::update()
                .table(TerritoriesData::Table)
                .values([
                    (TerritoriesData::TerritoryTypeId, input.territory_type_id.get().into()),
                    (TerritoriesData::Name, name.into()),
                    (TerritoriesData::Geometry, input.geometry.to_json()?.into()),
                    (TerritoriesData::CentrePoint, centre_point.to_json()?.into()),
                    (TerritoriesData::IsCity, input.is_city.into()),
                    (
                        TerritoriesData::AdminCenterId,
                        input.admin_center_id.map(TerritoryId::get).into(),
                    ),
                    (TerritoriesData::OktmoCode, input.oktmo_code.clone().into()),
                    (TerritoriesData::OkatoCode, input.okato_code.clone().into()),
                    (TerritoriesData::Properties, properties.into()),
                    (TerritoriesData::UpdatedAt, now().into()),
                ])
                .and_where(Expr::col(TerritoriesData::TerritoryId).eq(id))
                .to_owned();
            exec(&tx, &update).await?;
            let territory = fetch_territory(&tx, id)
                .await?
                .ok_or_else(|| IduError::storage(format!("territory {id} vanished")))?;
            tx.commit().await?;
            Ok(territory)
        })
        .await
    }

    async fn delete_territory(&self, territory_id: TerritoryId) -> IduResult<()> {
        self.timed("delete_territory", async move {
            let id = territory_id.get();
            let backend = self.backend;
            let (_guard, tx) = self.begin_hierarchy_write(HierarchyKind::Territory).await?;
            let mut nodes = SqlHierarchy::new(&tx, HierarchyKind::Territory);
            let splice = self
                .engine(HierarchyKind::Territory)
                .splice_out(&mut nodes, id)
                .await?;
            let parent = splice.parent_id;

            // Containment follows the hierarchy up to the grandparent.
            let reparented = reparent_contained(&tx, backend, id, parent).await?;

            let clear_admin = Query::update()
                .table(TerritoriesData::Table)
                .values([(TerritoriesData::AdminCenterId, Option::<i32>::None.into())])
                .and_where(Expr::col(TerritoriesData::AdminCenterId).eq(id))
                .to_owned();
            exec(&tx, &clear_admin).await?;

            let removed = delete_scoped_values(&tx, backend, id).await?;
            self.maybe_failpoint("territory.delete.before_row")?;

            let delete = Query::delete()
                .from_table(TerritoriesData::Table)
                .and_where(Expr::col(TerritoriesData::TerritoryId).eq(id))
                .to_owned();
            exec(&tx, &delete).await?;
            tx.commit().await?;
            log::debug!(
                "deleted territory {id}: {} children and {reparented} dependents moved to {parent:?}, \
                 {} levels rewritten, {removed} scoped rows removed",
                splice.children.len(),
                splice.relevelled
            );
            Ok(())
        })
        .await
    }

    async fn get_territory(&self, territory_id: TerritoryId) -> IduResult<Territory> {
        self.timed("get_territory", async move {
            fetch_territory(&self.conn, territory_id.get())
                .await?
                .ok_or_else(|| IduError::not_found(format!("territory {territory_id} not found")))
        })
        .await
    }

    async fn list_child_territories(&self, parent_id: Option<TerritoryId>) -> IduResult<Vec<Territory>> {
        self.timed("list_child_territories", async move {
            let mut select = select_territories();
            match parent_id {
                Some(parent) => select.and_where(Expr::col(TerritoriesData::ParentId).eq(parent.get())),
                None => select.and_where(Expr::col(TerritoriesData::ParentId).is_null()),
            };
            select.order_by(TerritoriesData::TerritoryId, Order::Asc);
            query_all(&self.conn, &select)
                .await?
                .iter()
                .map(read_territory)
                .collect()
        })
        .await
    }
}

/// Points geometries and zones of the deleted territory at `parent`.
async fn reparent_contained<C>(
    conn: &C,
    backend: DatabaseBackend,
    territory_id: i32,
    parent: Option<i32>,
) -> IduResult<u64>
where
    C: ConnectionTrait,
{
    let stamp = now();
    let geometries = Query::update()
        .table(ObjectGeometriesData::Table)
        .values([
            (ObjectGeometriesData::TerritoryId, parent.into()),
            (ObjectGeometriesData::UpdatedAt, stamp.into()),
        ])
        .and_where(Expr::col(ObjectGeometriesData::TerritoryId).eq(territory_id))
        .to_owned();
    let zones = Query::update()
        .table(FunctionalZonesData::Table)
        .values([
            (FunctionalZonesData::TerritoryId, parent.into()),
            (FunctionalZonesData::UpdatedAt, stamp.into()),
        ])
        .and_where(Expr::col(FunctionalZonesData::TerritoryId).eq(territory_id))
        .to_owned();
    let project_geometries = Query::update()
        .table(project_table(backend, ProjectObjectGeometriesData::Table))
        .values([
            (ProjectObjectGeometriesData::TerritoryId, parent.into()),
            (ProjectObjectGeometriesData::UpdatedAt, stamp.into()),
        ])
        .and_where(Expr::col(ProjectObjectGeometriesData::TerritoryId).eq(territory_id))
        .to_owned();
    let mut moved = exec(conn, &geometries).await?;
    moved += exec(conn, &zones).await?;
    moved += exec(conn, &project_geometries).await?;
    Ok(moved)
}

/// Removes value data owned by the deleted territory.
async fn delete_scoped_values<C>(conn: &C, backend: DatabaseBackend, territory_id: i32) -> IduResult<u64>
where
    C: ConnectionTrait,
{
    let hexagons = Query::select()
        .column(HexagonsData::HexagonId)
        .from(project_table(backend, HexagonsData::Table))
        .and_where(Expr::col(HexagonsData::TerritoryId).eq(territory_id))
        .to_owned();
    let project_values = Query::delete()
        .from_table(project_table(backend, IndicatorsData::Table))
        .cond_where(
            sea_orm::sea_query::Cond::any()
                .add(Expr::col(IndicatorsData::TerritoryId).eq(territory_id))
                .add(Expr::col(IndicatorsData::HexagonId).in_subquery(hexagons)),
        )
        .to_owned();
    let hexagon_rows = Query::delete()
        .from_table(project_table(backend, HexagonsData::Table))
        .and_where(Expr::col(HexagonsData::TerritoryId).eq(territory_id))
        .to_owned();
    let normatives = Query::delete()
        .from_table(ServiceTypesNormativesData::Table)
        .and_where(Expr::col(ServiceTypesNormativesData::TerritoryId).eq(territory_id))
        .to_owned();
    let indicator_values = Query::delete()
        .from_table(TerritoryIndicatorsData::Table)
        .and_where(Expr::col(TerritoryIndicatorsData::TerritoryId).eq(territory_id))
        .to_owned();
    let mut removed = exec(conn, &project_values).await?;
    removed += exec(conn, &hexagon_rows).await?;
    removed += exec(conn, &normatives).await?;
    removed += exec(conn, &indicator_values).await?;
    Ok(removed)
}
