use sea_orm::DatabaseBackend;
use sea_orm::sea_query::{self, Alias, IntoTableRef, TableRef};
use sea_orm_migration::prelude::Iden;

use idu_urban_core::Namespace;

pub const PROJECT_SCHEMA: &str = "user_projects";

/// Project tables live in their own schema on Postgres and behind a name
/// prefix on SQLite, which has no schemas.
pub fn project_table(backend: DatabaseBackend, table: impl sea_query::Iden) -> TableRef {
    let name = table.to_string();
    match backend {
        DatabaseBackend::Postgres => {
            (Alias::new(PROJECT_SCHEMA), Alias::new(name)).into_table_ref()
        }
        _ => Alias::new(format!("{PROJECT_SCHEMA}_{name}")).into_table_ref(),
    }
}

pub fn namespaced_table(backend: DatabaseBackend, namespace: Namespace, table: &str) -> TableRef {
    match namespace {
        Namespace::Public => Alias::new(table.to_string()).into_table_ref(),
        Namespace::UserProjects => project_table(backend, Alias::new(table.to_string())),
    }
}

#[derive(Iden, Clone, Copy)]
pub enum TerritoryTypesDict {
    Table,
    TerritoryTypeId,
    Name,
}

#[derive(Iden, Clone, Copy)]
pub enum TerritoriesData {
    Table,
    TerritoryId,
    TerritoryTypeId,
    ParentId,
    Name,
    Level,
    Geometry,
    CentrePoint,
    IsCity,
    AdminCenterId,
    OktmoCode,
    OkatoCode,
    Properties,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum UrbanFunctionsDict {
    Table,
    UrbanFunctionId,
    ParentId,
    Name,
    Level,
    ListLabel,
    Code,
}

#[derive(Iden, Clone, Copy)]
pub enum PhysicalObjectFunctionsDict {
    Table,
    PhysicalObjectFunctionId,
    ParentId,
    Name,
    Level,
    ListLabel,
    Code,
}

#[derive(Iden, Clone, Copy)]
pub enum PhysicalObjectTypesDict {
    Table,
    PhysicalObjectTypeId,
    Name,
    PhysicalObjectFunctionId,
}

#[derive(Iden, Clone, Copy)]
pub enum ServiceTypesDict {
    Table,
    ServiceTypeId,
    UrbanFunctionId,
    Name,
    Code,
    CapacityModeled,
    InfrastructureType,
    Properties,
}

#[derive(Iden, Clone, Copy)]
pub enum ServicesData {
    Table,
    ServiceId,
    ServiceTypeId,
    TerritoryTypeId,
    Name,
    Capacity,
    IsCapacityReal,
    Properties,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum ServiceTypesNormativesData {
    Table,
    NormativeId,
    ServiceTypeId,
    UrbanFunctionId,
    TerritoryId,
    Year,
    RadiusAvailabilityMeters,
    TimeAvailabilityMinutes,
    #[iden = "services_per_1000_normative"]
    ServicesPer1000Normative,
    #[iden = "services_capacity_per_1000_normative"]
    ServicesCapacityPer1000Normative,
    IsRegulated,
    Source,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum ObjectGeometriesData {
    Table,
    ObjectGeometryId,
    TerritoryId,
    Geometry,
    CentrePoint,
    Address,
    OsmId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum FunctionalZonesData {
    Table,
    FunctionalZoneId,
    TerritoryId,
    Name,
    Year,
    Geometry,
    Source,
    Properties,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum IndicatorsDict {
    Table,
    IndicatorId,
    NameFull,
    NameShort,
    MeasurementUnit,
}

#[derive(Iden, Clone, Copy)]
pub enum TerritoryIndicatorsData {
    Table,
    IndicatorId,
    TerritoryId,
    DateType,
    DateValue,
    Value,
    ValueType,
    InformationSource,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum BufferTypesDict {
    Table,
    BufferTypeId,
    Name,
    Description,
}

#[derive(Iden, Clone, Copy)]
pub enum DefaultBufferValuesDict {
    Table,
    DefaultBufferValueId,
    BufferTypeId,
    PhysicalObjectTypeId,
    ServiceTypeId,
    BufferValue,
}

#[derive(Iden, Clone, Copy)]
pub enum UrbanObjectsData {
    Table,
    UrbanObjectId,
    ObjectGeometryId,
    PhysicalObjectTypeId,
    ServiceId,
}

#[derive(Iden, Clone, Copy)]
pub enum BuffersData {
    Table,
    BufferTypeId,
    UrbanObjectId,
    Geometry,
    IsCustom,
    UpdatedAt,
}

// Project namespace. Use through `project_table`.

#[derive(Iden, Clone, Copy)]
pub enum ScenariosData {
    Table,
    ScenarioId,
    Name,
    IsBased,
    Phase,
    PhasePercentage,
    Properties,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum ProjectObjectGeometriesData {
    #[iden = "object_geometries_data"]
    Table,
    ObjectGeometryId,
    ScenarioId,
    TerritoryId,
    Geometry,
    CentrePoint,
    Address,
    OsmId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum HexagonsData {
    Table,
    HexagonId,
    TerritoryId,
    Geometry,
    CentrePoint,
    Properties,
}

#[derive(Iden, Clone, Copy)]
pub enum IndicatorsData {
    Table,
    IndicatorValueId,
    IndicatorId,
    ScenarioId,
    TerritoryId,
    HexagonId,
    Value,
    Comment,
    InformationSource,
    Properties,
    CreatedAt,
    UpdatedAt,
}
