use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{
    BufferTypeId, DateFieldType, FunctionalZoneId, Geometry, HexagonId, HierarchyKind,
    IdentityKeyName, IdentityReport, IduResult, IndicatorId, IndicatorValueId, IndicatorValueType,
    InfrastructureType, NormativeFields, NormativeId, ObjectGeometryId, PhysicalObjectFunctionId,
    PhysicalObjectTypeId, ScenarioId, ScenarioPhase, ServiceId, ServiceTypeId, TerritoryId,
    TerritoryTypeId, UrbanFunctionId, UrbanObjectId,
};

pub type Properties = Map<String, JsonValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerritoryTypeInput {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerritoryType {
    pub territory_type_id: TerritoryTypeId,
    pub name: String,
}

/// Insert payload, also used as the full replacement on update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerritoryInput {
    pub territory_type_id: TerritoryTypeId,
    pub parent_id: Option<TerritoryId>,
    pub name: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub centre_point: Option<Geometry>,
    #[serde(default)]
    pub is_city: bool,
    #[serde(default)]
    pub admin_center_id: Option<TerritoryId>,
    #[serde(default)]
    pub oktmo_code: Option<String>,
    #[serde(default)]
    pub okato_code: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub territory_id: TerritoryId,
    pub territory_type_id: TerritoryTypeId,
    pub parent_id: Option<TerritoryId>,
    pub name: String,
    pub level: i32,
    pub geometry: Geometry,
    pub centre_point: Geometry,
    pub is_city: bool,
    pub admin_center_id: Option<TerritoryId>,
    pub oktmo_code: Option<String>,
    pub okato_code: Option<String>,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    UrbanFunction,
    PhysicalObjectFunction,
}

impl FunctionKind {
    pub fn hierarchy(self) -> HierarchyKind {
        match self {
            Self::UrbanFunction => HierarchyKind::UrbanFunction,
            Self::PhysicalObjectFunction => HierarchyKind::PhysicalObjectFunction,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionInput {
    pub parent_id: Option<i32>,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub kind: FunctionKind,
    pub function_id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub level: i32,
    pub list_label: String,
    pub code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalObjectTypeInput {
    pub name: String,
    pub physical_object_function_id: Option<PhysicalObjectFunctionId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalObjectType {
    pub physical_object_type_id: PhysicalObjectTypeId,
    pub name: String,
    pub physical_object_function_id: Option<PhysicalObjectFunctionId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectGeometryInput {
    pub territory_id: Option<TerritoryId>,
    pub geometry: Geometry,
    #[serde(default)]
    pub centre_point: Option<Geometry>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub osm_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectGeometry {
    pub object_geometry_id: ObjectGeometryId,
    pub territory_id: Option<TerritoryId>,
    pub geometry: Geometry,
    pub centre_point: Geometry,
    pub address: Option<String>,
    pub osm_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionalZoneInput {
    pub territory_id: TerritoryId,
    pub name: Option<String>,
    pub year: i32,
    pub geometry: Geometry,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionalZone {
    pub functional_zone_id: FunctionalZoneId,
    pub territory_id: Option<TerritoryId>,
    pub name: Option<String>,
    pub year: i32,
    pub geometry: Geometry,
    pub source: Option<String>,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceTypeInput {
    pub urban_function_id: UrbanFunctionId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub capacity_modeled: Option<i32>,
    #[serde(default)]
    pub infrastructure_type: InfrastructureType,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceType {
    pub service_type_id: ServiceTypeId,
    pub urban_function_id: UrbanFunctionId,
    pub name: String,
    pub code: Option<String>,
    pub capacity_modeled: Option<i32>,
    pub infrastructure_type: InfrastructureType,
    pub properties: Properties,
}

/// `is_capacity_real` only matters when `capacity` is given.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceInput {
    pub service_type_id: ServiceTypeId,
    #[serde(default)]
    pub territory_type_id: Option<TerritoryTypeId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub is_capacity_real: Option<bool>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub service_id: ServiceId,
    pub service_type_id: ServiceTypeId,
    pub territory_type_id: Option<TerritoryTypeId>,
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub is_capacity_real: bool,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormativeInput {
    #[serde(flatten)]
    pub fields: NormativeFields,
    pub territory_id: Option<TerritoryId>,
    pub year: i32,
    #[serde(default)]
    pub is_regulated: bool,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Normative {
    pub normative_id: NormativeId,
    #[serde(flatten)]
    pub fields: NormativeFields,
    pub territory_id: Option<TerritoryId>,
    pub year: i32,
    pub is_regulated: bool,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormativeFilter {
    pub territory_id: Option<TerritoryId>,
    pub year: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndicatorInput {
    pub name_full: String,
    #[serde(default)]
    pub name_short: Option<String>,
    #[serde(default)]
    pub measurement_unit: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub indicator_id: IndicatorId,
    pub name_full: String,
    pub name_short: Option<String>,
    pub measurement_unit: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerritoryIndicatorValueInput {
    pub indicator_id: IndicatorId,
    pub territory_id: TerritoryId,
    pub date_type: DateFieldType,
    pub date_value: NaiveDate,
    pub value: f64,
    pub value_type: IndicatorValueType,
    pub information_source: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerritoryIndicatorValue {
    pub indicator_id: IndicatorId,
    pub territory_id: TerritoryId,
    pub date_type: DateFieldType,
    pub date_value: NaiveDate,
    pub value: f64,
    pub value_type: IndicatorValueType,
    pub information_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub name: String,
    #[serde(default)]
    pub is_based: bool,
    #[serde(default)]
    pub phase: Option<ScenarioPhase>,
    #[serde(default)]
    pub phase_percentage: Option<f64>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: ScenarioId,
    pub name: String,
    pub is_based: bool,
    pub phase: Option<ScenarioPhase>,
    pub phase_percentage: Option<f64>,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioObjectGeometryInput {
    pub scenario_id: ScenarioId,
    #[serde(flatten)]
    pub geometry: ObjectGeometryInput,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioObjectGeometry {
    pub scenario_id: ScenarioId,
    #[serde(flatten)]
    pub geometry: ObjectGeometry,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HexagonInput {
    pub territory_id: TerritoryId,
    pub geometry: Geometry,
    #[serde(default)]
    pub centre_point: Option<Geometry>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hexagon {
    pub hexagon_id: HexagonId,
    pub territory_id: TerritoryId,
    pub geometry: Geometry,
    pub centre_point: Geometry,
    pub properties: Properties,
}

/// Exactly one of `territory_id` and `hexagon_id` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioIndicatorValueInput {
    pub indicator_id: IndicatorId,
    pub scenario_id: ScenarioId,
    #[serde(default)]
    pub territory_id: Option<TerritoryId>,
    #[serde(default)]
    pub hexagon_id: Option<HexagonId>,
    pub value: f64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub information_source: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioIndicatorValue {
    pub indicator_value_id: IndicatorValueId,
    pub indicator_id: IndicatorId,
    pub scenario_id: ScenarioId,
    pub territory_id: Option<TerritoryId>,
    pub hexagon_id: Option<HexagonId>,
    pub value: f64,
    pub comment: Option<String>,
    pub information_source: Option<String>,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BufferTypeInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BufferType {
    pub buffer_type_id: BufferTypeId,
    pub name: String,
    pub description: Option<String>,
}

/// Keyed by the buffer type plus exactly one of the two object type ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefaultBufferValueInput {
    pub buffer_type_id: BufferTypeId,
    #[serde(default)]
    pub physical_object_type_id: Option<PhysicalObjectTypeId>,
    #[serde(default)]
    pub service_type_id: Option<ServiceTypeId>,
    pub buffer_value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UrbanObjectInput {
    pub object_geometry_id: ObjectGeometryId,
    #[serde(default)]
    pub physical_object_type_id: Option<PhysicalObjectTypeId>,
    #[serde(default)]
    pub service_id: Option<ServiceId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UrbanObject {
    pub urban_object_id: UrbanObjectId,
    pub object_geometry_id: ObjectGeometryId,
    pub physical_object_type_id: Option<PhysicalObjectTypeId>,
    pub service_id: Option<ServiceId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BufferInput {
    pub buffer_type_id: BufferTypeId,
    pub urban_object_id: UrbanObjectId,
    pub geometry: Geometry,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Buffer {
    pub buffer_type_id: BufferTypeId,
    pub urban_object_id: UrbanObjectId,
    pub geometry: Geometry,
    pub is_custom: bool,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait TerritoryApi {
    async fn create_territory_type(&self, input: TerritoryTypeInput) -> IduResult<TerritoryType>;
    async fn create_territory(&self, input: TerritoryInput) -> IduResult<Territory>;
    async fn update_territory(&self, territory_id: TerritoryId, input: TerritoryInput) -> IduResult<Territory>;
    async fn delete_territory(&self, territory_id: TerritoryId) -> IduResult<()>;
    async fn get_territory(&self, territory_id: TerritoryId) -> IduResult<Territory>;
    /// `None` lists the roots.
    async fn list_child_territories(&self, parent_id: Option<TerritoryId>) -> IduResult<Vec<Territory>>;
}

#[async_trait]
pub trait FunctionDictionaryApi {
    async fn create_function(&self, kind: FunctionKind, input: FunctionInput) -> IduResult<FunctionRecord>;
    async fn update_function(
        &self,
        kind: FunctionKind,
        function_id: i32,
        input: FunctionInput,
    ) -> IduResult<FunctionRecord>;
    async fn delete_function(&self, kind: FunctionKind, function_id: i32) -> IduResult<()>;
    async fn get_function(&self, kind: FunctionKind, function_id: i32) -> IduResult<FunctionRecord>;
    async fn list_functions(&self, kind: FunctionKind, parent_id: Option<i32>) -> IduResult<Vec<FunctionRecord>>;
    async fn create_physical_object_type(
        &self,
        input: PhysicalObjectTypeInput,
    ) -> IduResult<PhysicalObjectType>;
    async fn get_physical_object_type(
        &self,
        physical_object_type_id: PhysicalObjectTypeId,
    ) -> IduResult<PhysicalObjectType>;
}

#[async_trait]
pub trait GeometryApi {
    async fn create_object_geometry(&self, input: ObjectGeometryInput) -> IduResult<ObjectGeometry>;
    async fn update_object_geometry(
        &self,
        object_geometry_id: ObjectGeometryId,
        input: ObjectGeometryInput,
    ) -> IduResult<ObjectGeometry>;
    async fn get_object_geometry(&self, object_geometry_id: ObjectGeometryId) -> IduResult<ObjectGeometry>;
    async fn create_functional_zone(&self, input: FunctionalZoneInput) -> IduResult<FunctionalZone>;
    async fn get_functional_zone(&self, functional_zone_id: FunctionalZoneId) -> IduResult<FunctionalZone>;
}

#[async_trait]
pub trait ServiceApi {
    async fn create_service_type(&self, input: ServiceTypeInput) -> IduResult<ServiceType>;
    async fn create_service(&self, input: ServiceInput) -> IduResult<Service>;
    async fn update_service(&self, service_id: ServiceId, input: ServiceInput) -> IduResult<Service>;
    async fn get_service(&self, service_id: ServiceId) -> IduResult<Service>;
}

#[async_trait]
pub trait NormativeApi {
    async fn add_normative(&self, input: NormativeInput) -> IduResult<Normative>;
    async fn update_normative(&self, normative_id: NormativeId, input: NormativeInput) -> IduResult<Normative>;
    async fn get_normative(&self, normative_id: NormativeId) -> IduResult<Normative>;
    async fn list_normatives(&self, filter: NormativeFilter) -> IduResult<Vec<Normative>>;
}

#[async_trait]
pub trait IndicatorApi {
    async fn create_indicator(&self, input: IndicatorInput) -> IduResult<Indicator>;
    /// Fails with `UniquenessConflict` when the identity tuple already has a value.
    async fn add_territory_indicator_value(
        &self,
        input: TerritoryIndicatorValueInput,
    ) -> IduResult<TerritoryIndicatorValue>;
    /// Insert or overwrite the value for the identity tuple.
    async fn put_territory_indicator_value(
        &self,
        input: TerritoryIndicatorValueInput,
    ) -> IduResult<TerritoryIndicatorValue>;
    async fn list_territory_indicator_values(
        &self,
        territory_id: TerritoryId,
        indicator_id: Option<IndicatorId>,
    ) -> IduResult<Vec<TerritoryIndicatorValue>>;
}

#[async_trait]
pub trait ScenarioApi {
    async fn create_scenario(&self, input: ScenarioInput) -> IduResult<Scenario>;
    async fn create_scenario_object_geometry(
        &self,
        input: ScenarioObjectGeometryInput,
    ) -> IduResult<ScenarioObjectGeometry>;
    async fn get_scenario_object_geometry(
        &self,
        object_geometry_id: ObjectGeometryId,
    ) -> IduResult<ScenarioObjectGeometry>;
    async fn create_hexagon(&self, input: HexagonInput) -> IduResult<Hexagon>;
    async fn add_scenario_indicator_value(
        &self,
        input: ScenarioIndicatorValueInput,
    ) -> IduResult<ScenarioIndicatorValue>;
    async fn list_scenario_indicator_values(
        &self,
        scenario_id: ScenarioId,
    ) -> IduResult<Vec<ScenarioIndicatorValue>>;
}

#[async_trait]
pub trait BufferApi {
    async fn create_buffer_type(&self, input: BufferTypeInput) -> IduResult<BufferType>;
    async fn set_default_buffer_value(&self, input: DefaultBufferValueInput) -> IduResult<()>;
    async fn create_urban_object(&self, input: UrbanObjectInput) -> IduResult<UrbanObject>;
    async fn default_buffer_radius(
        &self,
        buffer_type_id: BufferTypeId,
        urban_object_id: UrbanObjectId,
    ) -> IduResult<Option<f64>>;
    async fn put_buffer(&self, input: BufferInput) -> IduResult<Buffer>;
    async fn get_buffer(&self, buffer_type_id: BufferTypeId, urban_object_id: UrbanObjectId) -> IduResult<Buffer>;
    async fn delete_buffer(&self, buffer_type_id: BufferTypeId, urban_object_id: UrbanObjectId) -> IduResult<()>;
}

#[async_trait]
pub trait IdentityMaintenanceApi {
    /// Collapses rows colliding under the key version, then adds its unique index.
    /// `None` selects the current version.
    async fn enforce_identity_key(
        &self,
        key: IdentityKeyName,
        version: Option<u32>,
    ) -> IduResult<IdentityReport>;
}
