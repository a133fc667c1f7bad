use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, Query, SelectStatement};
use sea_orm::{ConnectionTrait, QueryResult};

use idu_urban_core::{
    FunctionalZone, FunctionalZoneId, FunctionalZoneInput, Geometry, GeometryApi, GeometryProfile,
    IduError, IduResult, ObjectGeometry, ObjectGeometryId, ObjectGeometryInput, TerritoryId,
    resolve_centre_point,
};

use crate::db::{FunctionalZonesData, ObjectGeometriesData, TerritoriesData};
use crate::store::{
    UrbanStore, col_name, encode_properties, ensure_exists, exec, insert_returning_id, now,
    query_one, read_geometry, read_opt_i32, read_properties,
};

const OBJECT_GEOMETRY_COLUMNS: [ObjectGeometriesData; 8] = [
    ObjectGeometriesData::ObjectGeometryId,
    ObjectGeometriesData::TerritoryId,
    ObjectGeometriesData::Geometry,
    ObjectGeometriesData::CentrePoint,
    ObjectGeometriesData::Address,
    ObjectGeometriesData::OsmId,
    ObjectGeometriesData::CreatedAt,
    ObjectGeometriesData::UpdatedAt,
];

fn select_object_geometries() -> SelectStatement {
    Query::select()
        .from(ObjectGeometriesData::Table)
        .columns(OBJECT_GEOMETRY_COLUMNS)
        .to_owned()
}

/// Reads the object geometry columns, which scenario geometries share.
pub(crate) fn read_object_geometry(row: &QueryResult) -> IduResult<ObjectGeometry> {
    Ok(ObjectGeometry {
        object_geometry_id: ObjectGeometryId(
            row.try_get("", &col_name(ObjectGeometriesData::ObjectGeometryId))?,
        ),
        territory_id: read_opt_i32(row, ObjectGeometriesData::TerritoryId)?.map(TerritoryId),
        geometry: read_geometry(row, ObjectGeometriesData::Geometry)?,
        centre_point: read_geometry(row, ObjectGeometriesData::CentrePoint)?,
        address: row.try_get("", &col_name(ObjectGeometriesData::Address))?,
        osm_id: row.try_get("", &col_name(ObjectGeometriesData::OsmId))?,
        created_at: row.try_get("", &col_name(ObjectGeometriesData::CreatedAt))?,
        updated_at: row.try_get("", &col_name(ObjectGeometriesData::UpdatedAt))?,
    })
}

/// Validates an object geometry payload and fills in its centre point.
pub(crate) fn prepare_object_geometry(
    input: &ObjectGeometryInput,
    previous: Option<&ObjectGeometry>,
) -> IduResult<Geometry> {
    input
        .geometry
        .validate_change(previous.map(|prev| &prev.geometry), GeometryProfile::Any)?;
    match (input.centre_point.clone(), previous) {
        (Some(point), _) => resolve_centre_point(&input.geometry, Some(point)),
        (None, Some(prev)) if prev.geometry == input.geometry => Ok(prev.centre_point.clone()),
        (None, _) => resolve_centre_point(&input.geometry, None),
    }
}

pub(crate) async fn ensure_territory<C>(conn: &C, territory_id: Option<TerritoryId>) -> IduResult<()>
where
    C: ConnectionTrait,
{
    match territory_id {
        Some(id) => {
            ensure_exists(
                conn,
                TerritoriesData::Table,
                TerritoriesData::TerritoryId,
                id.get(),
                "territory",
            )
            .await
        }
        None => Ok(()),
    }
}

async fn fetch_object_geometry<C>(conn: &C, object_geometry_id: i32) -> IduResult<Option<ObjectGeometry>>
where
    C: ConnectionTrait,
{
    let select = select_object_geometries()
        .and_where(Expr::col(ObjectGeometriesData::ObjectGeometryId).eq(object_geometry_id))
        .to_owned();
    match query_one(conn, &select).await? {
        Some(row) => Ok(Some(read_object_geometry(&row)?)),
        None => Ok(None),
    }
}

async fn fetch_functional_zone<C>(conn: &C, functional_zone_id: i32) -> IduResult<Option<FunctionalZone>>
where
    C: ConnectionTrait,
{
    let select = Query::select()
        .from(FunctionalZonesData::Table)
        .columns([
            FunctionalZonesData::FunctionalZoneId,
            FunctionalZonesData::TerritoryId,
            FunctionalZonesData::Name,
            FunctionalZonesData::Year,
            FunctionalZonesData::Geometry,
            FunctionalZonesData::Source,
            FunctionalZonesData::Properties,
            FunctionalZonesData::CreatedAt,
            FunctionalZonesData::UpdatedAt,
        ])
        .and_where(Expr::col(FunctionalZonesData::FunctionalZoneId).eq(functional_zone_id))
        .to_owned();
    let Some(row) = query_one(conn, &select).await? else {
        return Ok(None);
    };
    Ok(Some(FunctionalZone {
        functional_zone_id: FunctionalZoneId(functional_zone_id),
        territory_id: read_opt_i32(&row, FunctionalZonesData::TerritoryId)?.map(TerritoryId),
        name: row.try_get("", &col_name(FunctionalZonesData::Name))?,
        year: row.try_get("", &col_name(FunctionalZonesData::Year))?,
        geometry: read_geometry(&row, FunctionalZonesData::Geometry)?,
        source: row.try_get("", &col_name(FunctionalZonesData::Source))?,
        properties: read_properties(&row, FunctionalZonesData::Properties)?,
        created_at: row.try_get("", &col_name(FunctionalZonesData::CreatedAt))?,
        updated_at: row.try_get("", &col_name(FunctionalZonesData::UpdatedAt))?,
    }))
}

#[async_trait]
impl GeometryApi for UrbanStore {
    async fn create_object_geometry(&self, input: ObjectGeometryInput) -> IduResult<ObjectGeometry> {
        let centre_point = prepare_object_geometry(&input, None)?;
        self.timed("create_object_geometry", async move {
            ensure_territory(&self.conn, input.territory_id).await?;
            let stamp = now();
            let insert = Query::insert()
                .into_table(ObjectGeometriesData::Table)
                .columns([
                    ObjectGeometriesData::TerritoryId,
                    ObjectGeometriesData::Geometry,
                    ObjectGeometriesData::CentrePoint,
                    ObjectGeometriesData::Address,
                    ObjectGeometriesData::OsmId,
                    ObjectGeometriesData::CreatedAt,
                    ObjectGeometriesData::UpdatedAt,
                ])
                .values_panic([
                    input.territory_id.map(TerritoryId::get).into(),
                    input.geometry.to_json()?.into(),
                    centre_point.to_json()?.into(),
                    input.address.clone().into(),
                    input.osm_id.clone().into(),
                    stamp.into(),
                    stamp.into(),
                ])
                .returning_col(ObjectGeometriesData::ObjectGeometryId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, ObjectGeometriesData::ObjectGeometryId).await?;
            fetch_object_geometry(&self.conn, id)
                .await?
                .ok_or_else(|| IduError::storage(format!("object geometry {id} vanished")))
        })
        .await
    }

    async fn update_object_geometry(
        &self,
        object_geometry_id: ObjectGeometryId,
        input: ObjectGeometryInput,
    ) -> IduResult<ObjectGeometry> {
        self.timed("update_object_geometry", async move {
            let id = object_geometry_id.get();
            let existing = fetch_object_geometry(&self.conn, id)
                .await?
                .ok_or_else(|| IduError::not_found(format!("object geometry {id} not found")))?;
            let centre_point = prepare_object_geometry(&input, Some(&existing))?;
            ensure_territory(&self.conn, input.territory_id).await?;
            let update = Query::update()
                .table(ObjectGeometriesData::Table)
                .values([
                    (
                        ObjectGeometriesData::TerritoryId,
                        input.territory_id.map(TerritoryId::get).into(),
                    ),
                    (ObjectGeometriesData::Geometry, input.geometry.to_json()?.into()),
                    (ObjectGeometriesData::CentrePoint, centre_point.to_json()?.into()),
                    (ObjectGeometriesData::Address, input.address.clone().into()),
                    (ObjectGeometriesData::OsmId, input.osm_id.clone().into()),
                    (ObjectGeometriesData::UpdatedAt, now().into()),
                ])
                .and_where(Expr::col(ObjectGeometriesData::ObjectGeometryId).eq(id))
                .to_owned();
            exec(&self.conn, &update).await?;
            fetch_object_geometry(&self.conn, id)
                .await?
                .ok_or_else(|| IduError::not_found(format!("object geometry {id} not found")))
        })
        .await
    }

    async fn get_object_geometry(&self, object_geometry_id: ObjectGeometryId) -> IduResult<ObjectGeometry> {
        self.timed("get_object_geometry", async move {
            fetch_object_geometry(&self.conn, object_geometry_id.get())
                .await?
                .ok_or_else(|| {
                    IduError::not_found(format!("object geometry {object_geometry_id} not found"))
                })
        })
        .await
    }

    async fn create_functional_zone(&self, input: FunctionalZoneInput) -> IduResult<FunctionalZone> {
        input.geometry.validate(GeometryProfile::Areal)?;
        let properties = encode_properties(&input.properties)?;
        self.timed("create_functional_zone", async move {
            ensure_territory(&self.conn, Some(input.territory_id)).await?;
            let stamp = now();
            let insert = Query::insert()
                .into_table(FunctionalZonesData::Table)
                .columns([
                    FunctionalZonesData::TerritoryId,
                    FunctionalZonesData::Name,
                    FunctionalZonesData::Year,
                    FunctionalZonesData::Geometry,
                    FunctionalZonesData::Source,
                    FunctionalZonesData::Properties,
                    FunctionalZonesData::CreatedAt,
                    FunctionalZonesData::UpdatedAt,
                ])
                .values_panic([
                    input.territory_id.get().into(),
                    input.name.clone().into(),
                    input.year.into(),
                    input.geometry.to_json()?.into(),
                    input.source.clone().into(),
                    properties.into(),
                    stamp.into(),
                    stamp.into(),
                ])
                .returning_col(FunctionalZonesData::FunctionalZoneId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, FunctionalZonesData::FunctionalZoneId).await?;
            fetch_functional_zone(&self.conn, id)
                .await?
                .ok_or_else(|| IduError::storage(format!("functional zone {id} vanished")))
        })
        .await
    }

    async fn get_functional_zone(&self, functional_zone_id: FunctionalZoneId) -> IduResult<FunctionalZone> {
        self.timed("get_functional_zone", async move {
            fetch_functional_zone(&self.conn, functional_zone_id.get())
                .await?
                .ok_or_else(|| {
                    IduError::not_found(format!("functional zone {functional_zone_id} not found"))
                })
        })
        .await
    }
}
