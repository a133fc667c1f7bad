pub mod api;
pub mod capacity;
pub mod error;
pub mod geometry;
pub mod hierarchy;
pub mod identity;
pub mod ids;
pub mod normative;
pub mod schema_manifest;
pub mod value;

pub use api::*;
pub use capacity::{ResolvedCapacity, resolve_capacity};
pub use error::{IduError, IduResult};
pub use geometry::{Geometry, GeometryKind, GeometryProfile, Position, resolve_centre_point};
pub use hierarchy::{
    DEFAULT_MAX_DEPTH, HierarchyEngine, HierarchyKind, HierarchyNode, HierarchyTx, MoveOutcome,
    SpliceOutcome,
};
pub use identity::{
    DedupePlan, IdentityKeyName, IdentityKeySpec, IdentityReport, IdentityRow, IdentityTuple,
    KeyValue, current_identity_key, identity_key, identity_key_history, plan_deduplication,
};
pub use ids::*;
pub use normative::{Availability, CheckedNormative, NormativeFields, NormativeSubject, PerThousand};
pub use schema_manifest::*;
pub use value::*;
