//! GeoJSON geometry model and the write-time geometry checks.
//!
//! Geometries are stored as GeoJSON text. Every insert or update of a geometry
//! column passes through [`Geometry::validate_change`], and centre points that
//! the caller leaves out are derived with [`resolve_centre_point`].

use geo::{Centroid, Validation};
use serde::{Deserialize, Serialize};

use crate::{IduError, IduResult};

pub type Position = [f64; 2];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    MultiLineString(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiLineString,
    MultiPolygon,
}

/// Set of geometry kinds a column accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GeometryProfile {
    Any,
    AreaOrPoint,
    Areal,
}

impl GeometryProfile {
    pub fn allowed(self) -> &'static [GeometryKind] {
        match self {
            Self::Any => &[
                GeometryKind::Point,
                GeometryKind::LineString,
                GeometryKind::Polygon,
                GeometryKind::MultiLineString,
                GeometryKind::MultiPolygon,
            ],
            Self::AreaOrPoint => &[
                GeometryKind::Point,
                GeometryKind::Polygon,
                GeometryKind::MultiPolygon,
            ],
            Self::Areal => &[GeometryKind::Polygon, GeometryKind::MultiPolygon],
        }
    }

    pub fn accepts(self, kind: GeometryKind) -> bool {
        self.allowed().contains(&kind)
    }
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::LineString(_) => GeometryKind::LineString,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point(_) => false,
            Self::LineString(coords) => coords.is_empty(),
            Self::Polygon(rings) => rings.first().is_none_or(|ring| ring.is_empty()),
            Self::MultiLineString(lines) => lines.iter().all(|line| line.is_empty()),
            Self::MultiPolygon(polygons) => polygons
                .iter()
                .all(|rings| rings.first().is_none_or(|ring| ring.is_empty())),
        }
    }

    /// Type, emptiness, structure and OGC validity checks, in that order.
    pub fn validate(&self, profile: GeometryProfile) -> IduResult<()> {
        let kind = self.kind();
        if !profile.accepts(kind) {
            return Err(IduError::invalid_geometry(format!(
                "geometry type {kind:?} is not allowed here"
            )));
        }
        if self.is_empty() {
            return Err(IduError::invalid_geometry("empty geometry"));
        }
        self.check_structure()?;
        if !self.to_geo().is_valid() {
            return Err(IduError::invalid_geometry(format!(
                "{kind:?} is not topologically valid"
            )));
        }
        Ok(())
    }

    /// Validation is skipped when an update leaves the stored geometry untouched.
    pub fn validate_change(&self, previous: Option<&Geometry>, profile: GeometryProfile) -> IduResult<()> {
        if previous == Some(self) {
            return Ok(());
        }
        self.validate(profile)
    }

    pub fn centroid(&self) -> Option<Geometry> {
        self.to_geo()
            .centroid()
            .map(|point| Geometry::Point([point.x(), point.y()]))
    }

    /// Coordinate-wise equality within `tolerance`; shapes must match exactly.
    pub fn approx_eq(&self, other: &Geometry, tolerance: f64) -> bool {
        if self.kind() != other.kind() || self.shape() != other.shape() {
            return false;
        }
        self.positions()
            .iter()
            .zip(other.positions())
            .all(|(a, b)| (a[0] - b[0]).abs() <= tolerance && (a[1] - b[1]).abs() <= tolerance)
    }

    pub fn to_json(&self) -> IduResult<String> {
        serde_json::to_string(self).map_err(|err| IduError::storage(format!("encode geometry: {err}")))
    }

    pub fn from_json(raw: &str) -> IduResult<Self> {
        serde_json::from_str(raw).map_err(|err| IduError::invalid_geometry(format!("decode geometry: {err}")))
    }

    fn check_structure(&self) -> IduResult<()> {
        if self.positions().iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(IduError::invalid_geometry("coordinates must be finite"));
        }
        match self {
            Self::Point(_) => Ok(()),
            Self::LineString(coords) => check_line(coords),
            Self::MultiLineString(lines) => lines.iter().try_for_each(|line| check_line(line)),
            Self::Polygon(rings) => rings.iter().try_for_each(|ring| check_ring(ring)),
            Self::MultiPolygon(polygons) => polygons
                .iter()
                .flatten()
                .try_for_each(|ring| check_ring(ring)),
        }
    }

    fn positions(&self) -> Vec<Position> {
        match self {
            Self::Point(p) => vec![*p],
            Self::LineString(coords) => coords.clone(),
            Self::Polygon(rings) | Self::MultiLineString(rings) => rings.concat(),
            Self::MultiPolygon(polygons) => polygons.iter().flatten().flatten().copied().collect(),
        }
    }

    fn shape(&self) -> Vec<usize> {
        match self {
            Self::Point(_) => vec![1],
            Self::LineString(coords) => vec![coords.len()],
            Self::Polygon(rings) | Self::MultiLineString(rings) => {
                rings.iter().map(Vec::len).collect()
            }
            Self::MultiPolygon(polygons) => polygons
                .iter()
                .flat_map(|rings| std::iter::once(usize::MAX).chain(rings.iter().map(Vec::len)))
                .collect(),
        }
    }

    fn to_geo(&self) -> geo::Geometry<f64> {
        match self {
            Self::Point(p) => geo::Geometry::Point(geo::Point::new(p[0], p[1])),
            Self::LineString(coords) => geo::Geometry::LineString(line_string(coords)),
            Self::Polygon(rings) => geo::Geometry::Polygon(polygon(rings)),
            Self::MultiLineString(lines) => geo::Geometry::MultiLineString(geo::MultiLineString::new(
                lines.iter().map(|line| line_string(line)).collect(),
            )),
            Self::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(geo::MultiPolygon::new(
                polygons.iter().map(|rings| polygon(rings)).collect(),
            )),
        }
    }
}

/// Keeps a supplied centre point, or derives the geometric centroid when absent.
pub fn resolve_centre_point(geometry: &Geometry, centre_point: Option<Geometry>) -> IduResult<Geometry> {
    match centre_point {
        Some(point @ Geometry::Point(_)) => {
            point.validate(GeometryProfile::AreaOrPoint)?;
            Ok(point)
        }
        Some(other) => Err(IduError::invalid_geometry(format!(
            "centre_point must be a Point, got {:?}",
            other.kind()
        ))),
        None => geometry
            .centroid()
            .ok_or_else(|| IduError::invalid_geometry("cannot derive centroid of empty geometry")),
    }
}

fn check_line(coords: &[Position]) -> IduResult<()> {
    if coords.len() < 2 {
        return Err(IduError::invalid_geometry("line needs at least two positions"));
    }
    Ok(())
}

fn check_ring(ring: &[Position]) -> IduResult<()> {
    if ring.len() < 4 {
        return Err(IduError::invalid_geometry("polygon ring needs at least four positions"));
    }
    if ring.first() != ring.last() {
        return Err(IduError::invalid_geometry("polygon ring is not closed"));
    }
    Ok(())
}

fn line_string(coords: &[Position]) -> geo::LineString<f64> {
    geo::LineString::from(coords.iter().map(|p| (p[0], p[1])).collect::<Vec<_>>())
}

fn polygon(rings: &[Vec<Position>]) -> geo::Polygon<f64> {
    let exterior = rings
        .first()
        .map(|ring| line_string(ring))
        .unwrap_or_else(|| geo::LineString::new(Vec::new()));
    let interiors = rings.iter().skip(1).map(|ring| line_string(ring)).collect();
    geo::Polygon::new(exterior, interiors)
}
