use sea_orm_migration::prelude::*;

use super::{geometry_col, id_col, json_col, ref_col, timestamp_col};
use crate::db::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        create_territory_tables(manager).await?;
        create_function_tables(manager).await?;
        create_service_tables(manager).await?;
        create_geometry_tables(manager).await?;
        create_indicator_tables(manager).await?;
        create_buffer_tables(manager).await?;
        create_indexes(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            BuffersData::Table.to_string(),
            UrbanObjectsData::Table.to_string(),
            DefaultBufferValuesDict::Table.to_string(),
            BufferTypesDict::Table.to_string(),
            TerritoryIndicatorsData::Table.to_string(),
            IndicatorsDict::Table.to_string(),
            FunctionalZonesData::Table.to_string(),
            ObjectGeometriesData::Table.to_string(),
            ServiceTypesNormativesData::Table.to_string(),
            ServicesData::Table.to_string(),
            ServiceTypesDict::Table.to_string(),
            PhysicalObjectTypesDict::Table.to_string(),
            PhysicalObjectFunctionsDict::Table.to_string(),
            UrbanFunctionsDict::Table.to_string(),
            TerritoriesData::Table.to_string(),
            TerritoryTypesDict::Table.to_string(),
        ] {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

async fn create_territory_tables(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(TerritoryTypesDict::Table)
                .if_not_exists()
                .col(id_col(TerritoryTypesDict::TerritoryTypeId))
                .col(ColumnDef::new(TerritoryTypesDict::Name).string().not_null().unique_key())
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(TerritoriesData::Table)
                .if_not_exists()
                .col(id_col(TerritoriesData::TerritoryId))
                .col(ref_col(TerritoriesData::TerritoryTypeId, false))
                .col(ref_col(TerritoriesData::ParentId, true))
                .col(ColumnDef::new(TerritoriesData::Name).string().not_null())
                .col(ColumnDef::new(TerritoriesData::Level).integer().not_null())
                .col(geometry_col(TerritoriesData::Geometry))
                .col(geometry_col(TerritoriesData::CentrePoint))
                .col(
                    ColumnDef::new(TerritoriesData::IsCity)
                        .boolean()
                        .not_null()
                        .default(false),
                )
                .col(ref_col(TerritoriesData::AdminCenterId, true))
                .col(ColumnDef::new(TerritoriesData::OktmoCode).string())
                .col(ColumnDef::new(TerritoriesData::OkatoCode).string())
                .col(json_col(TerritoriesData::Properties))
                .col(timestamp_col(TerritoriesData::CreatedAt))
                .col(timestamp_col(TerritoriesData::UpdatedAt))
                .foreign_key(
                    ForeignKey::create()
                        .name("territories_data_fk_territory_type_id")
                        .from(TerritoriesData::Table, TerritoriesData::TerritoryTypeId)
                        .to(TerritoryTypesDict::Table, TerritoryTypesDict::TerritoryTypeId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("territories_data_fk_parent_id")
                        .from(TerritoriesData::Table, TerritoriesData::ParentId)
                        .to(TerritoriesData::Table, TerritoriesData::TerritoryId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("territories_data_fk_admin_center_id")
                        .from(TerritoriesData::Table, TerritoriesData::AdminCenterId)
                        .to(TerritoriesData::Table, TerritoriesData::TerritoryId),
                )
                .to_owned(),
        )
        .await?;
    Ok(())
}

async fn create_function_tables(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(UrbanFunctionsDict::Table)
                .if_not_exists()
                .col(id_col(UrbanFunctionsDict::UrbanFunctionId))
                .col(ref_col(UrbanFunctionsDict::ParentId, true))
                .col(ColumnDef::new(UrbanFunctionsDict::Name).string().not_null())
                .col(ColumnDef::new(UrbanFunctionsDict::Level).integer().not_null())
                .col(ColumnDef::new(UrbanFunctionsDict::ListLabel).string())
                .col(ColumnDef::new(UrbanFunctionsDict::Code).string())
                .foreign_key(
                    ForeignKey::create()
                        .name("urban_functions_dict_fk_parent_id")
                        .from(UrbanFunctionsDict::Table, UrbanFunctionsDict::ParentId)
                        .to(UrbanFunctionsDict::Table, UrbanFunctionsDict::UrbanFunctionId),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(PhysicalObjectFunctionsDict::Table)
                .if_not_exists()
                .col(id_col(PhysicalObjectFunctionsDict::PhysicalObjectFunctionId))
                .col(ref_col(PhysicalObjectFunctionsDict::ParentId, true))
                .col(ColumnDef::new(PhysicalObjectFunctionsDict::Name).string().not_null())
                .col(ColumnDef::new(PhysicalObjectFunctionsDict::Level).integer().not_null())
                .col(ColumnDef::new(PhysicalObjectFunctionsDict::ListLabel).string())
                .col(ColumnDef::new(PhysicalObjectFunctionsDict::Code).string())
                .foreign_key(
                    ForeignKey::create()
                        .name("physical_object_functions_dict_fk_parent_id")
                        .from(
                            PhysicalObjectFunctionsDict::Table,
                            PhysicalObjectFunctionsDict::ParentId,
                        )
                        .to(
                            PhysicalObjectFunctionsDict::Table,
                            PhysicalObjectFunctionsDict::PhysicalObjectFunctionId,
                        ),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(PhysicalObjectTypesDict::Table)
                .if_not_exists()
                .col(id_col(PhysicalObjectTypesDict::PhysicalObjectTypeId))
                .col(ColumnDef::new(PhysicalObjectTypesDict::Name).string().not_null())
                .col(ref_col(PhysicalObjectTypesDict::PhysicalObjectFunctionId, true))
                .foreign_key(
                    ForeignKey::create()
                        .name("physical_object_types_dict_fk_physical_object_function_id")
                        .from(
                            PhysicalObjectTypesDict::Table,
                            PhysicalObjectTypesDict::PhysicalObjectFunctionId,
                        )
                        .to(
                            PhysicalObjectFunctionsDict::Table,
                            PhysicalObjectFunctionsDict::PhysicalObjectFunctionId,
                        ),
                )
                .to_owned(),
        )
        .await?;
    Ok(())
}

async fn create_service_tables(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(ServiceTypesDict::Table)
                .if_not_exists()
                .col(id_col(ServiceTypesDict::ServiceTypeId))
                .col(ref_col(ServiceTypesDict::UrbanFunctionId, false))
                .col(ColumnDef::new(ServiceTypesDict::Name).string().not_null())
                .col(ColumnDef::new(ServiceTypesDict::Code).string())
                .col(ColumnDef::new(ServiceTypesDict::CapacityModeled).integer())
                .col(
                    ColumnDef::new(ServiceTypesDict::InfrastructureType)
                        .string()
                        .not_null()
                        .default("basic"),
                )
                .col(json_col(ServiceTypesDict::Properties))
                .foreign_key(
                    ForeignKey::create()
                        .name("service_types_dict_fk_urban_function_id")
                        .from(ServiceTypesDict::Table, ServiceTypesDict::UrbanFunctionId)
                        .to(UrbanFunctionsDict::Table, UrbanFunctionsDict::UrbanFunctionId),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(ServicesData::Table)
                .if_not_exists()
                .col(id_col(ServicesData::ServiceId))
                .col(ref_col(ServicesData::ServiceTypeId, false))
                .col(ref_col(ServicesData::TerritoryTypeId, true))
                .col(ColumnDef::new(ServicesData::Name).string())
                .col(ColumnDef::new(ServicesData::Capacity).integer())
                .col(
                    ColumnDef::new(ServicesData::IsCapacityReal)
                        .boolean()
                        .not_null()
                        .default(false),
                )
                .col(json_col(ServicesData::Properties))
                .col(timestamp_col(ServicesData::CreatedAt))
                .col(timestamp_col(ServicesData::UpdatedAt))
                .foreign_key(
                    ForeignKey::create()
                        .name("services_data_fk_service_type_id")
                        .from(ServicesData::Table, ServicesData::ServiceTypeId)
                        .to(ServiceTypesDict::Table, ServiceTypesDict::ServiceTypeId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("services_data_fk_territory_type_id")
                        .from(ServicesData::Table, ServicesData::TerritoryTypeId)
                        .to(TerritoryTypesDict::Table, TerritoryTypesDict::TerritoryTypeId),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(ServiceTypesNormativesData::Table)
                .if_not_exists()
                .col(id_col(ServiceTypesNormativesData::NormativeId))
                .col(ref_col(ServiceTypesNormativesData::ServiceTypeId, true))
                .col(ref_col(ServiceTypesNormativesData::UrbanFunctionId, true))
                .col(ref_col(ServiceTypesNormativesData::TerritoryId, true))
                .col(ColumnDef::new(ServiceTypesNormativesData::Year).integer().not_null())
                .col(ColumnDef::new(ServiceTypesNormativesData::RadiusAvailabilityMeters).integer())
                .col(ColumnDef::new(ServiceTypesNormativesData::TimeAvailabilityMinutes).integer())
                .col(ColumnDef::new(ServiceTypesNormativesData::ServicesPer1000Normative).double())
                .col(
                    ColumnDef::new(ServiceTypesNormativesData::ServicesCapacityPer1000Normative)
                        .double(),
                )
                .col(
                    ColumnDef::new(ServiceTypesNormativesData::IsRegulated)
                        .boolean()
                        .not_null()
                        .default(false),
                )
                .col(ColumnDef::new(ServiceTypesNormativesData::Source).string())
                .col(timestamp_col(ServiceTypesNormativesData::CreatedAt))
                .col(timestamp_col(ServiceTypesNormativesData::UpdatedAt))
                .foreign_key(
                    ForeignKey::create()
                        .name("service_types_normatives_data_fk_service_type_id")
                        .from(
                            ServiceTypesNormativesData::Table,
                            ServiceTypesNormativesData::ServiceTypeId,
                        )
                        .to(ServiceTypesDict::Table, ServiceTypesDict::ServiceTypeId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("service_types_normatives_data_fk_urban_function_id")
                        .from(
                            ServiceTypesNormativesData::Table,
                            ServiceTypesNormativesData::UrbanFunctionId,
                        )
                        .to(UrbanFunctionsDict::Table, UrbanFunctionsDict::UrbanFunctionId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("service_types_normatives_data_fk_territory_id")
                        .from(
                            ServiceTypesNormativesData::Table,
                            ServiceTypesNormativesData::TerritoryId,
                        )
                        .to(TerritoriesData::Table, TerritoriesData::TerritoryId),
                )
                .to_owned(),
        )
        .await?;
    Ok(())
}

async fn create_geometry_tables(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(ObjectGeometriesData::Table)
                .if_not_exists()
                .col(id_col(ObjectGeometriesData::ObjectGeometryId))
                .col(ref_col(ObjectGeometriesData::TerritoryId, true))
                .col(geometry_col(ObjectGeometriesData::Geometry))
                .col(geometry_col(ObjectGeometriesData::CentrePoint))
                .col(ColumnDef::new(ObjectGeometriesData::Address).string())
                .col(ColumnDef::new(ObjectGeometriesData::OsmId).string())
                .col(timestamp_col(ObjectGeometriesData::CreatedAt))
                .col(timestamp_col(ObjectGeometriesData::UpdatedAt))
                .foreign_key(
                    ForeignKey::create()
                        .name("object_geometries_data_fk_territory_id")
                        .from(ObjectGeometriesData::Table, ObjectGeometriesData::TerritoryId)
                        .to(TerritoriesData::Table, TerritoriesData::TerritoryId),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(FunctionalZonesData::Table)
                .if_not_exists()
                .col(id_col(FunctionalZonesData::FunctionalZoneId))
                .col(ref_col(FunctionalZonesData::TerritoryId, true))
                .col(ColumnDef::new(FunctionalZonesData::Name).string())
                .col(ColumnDef::new(FunctionalZonesData::Year).integer().not_null())
                .col(geometry_col(FunctionalZonesData::Geometry))
                .col(ColumnDef::new(FunctionalZonesData::Source).string())
                .col(json_col(FunctionalZonesData::Properties))
                .col(timestamp_col(FunctionalZonesData::CreatedAt))
                .col(timestamp_col(FunctionalZonesData::UpdatedAt))
                .foreign_key(
                    ForeignKey::create()
                        .name("functional_zones_data_fk_territory_id")
                        .from(FunctionalZonesData::Table, FunctionalZonesData::TerritoryId)
                        .to(TerritoriesData::Table, TerritoriesData::TerritoryId),
                )
                .to_owned(),
        )
        .await?;
    Ok(())
}

async fn create_indicator_tables(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(IndicatorsDict::Table)
                .if_not_exists()
                .col(id_col(IndicatorsDict::IndicatorId))
                .col(ColumnDef::new(IndicatorsDict::NameFull).string().not_null())
                .col(ColumnDef::new(IndicatorsDict::NameShort).string())
                .col(ColumnDef::new(IndicatorsDict::MeasurementUnit).string())
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(TerritoryIndicatorsData::Table)
                .if_not_exists()
                .col(ref_col(TerritoryIndicatorsData::IndicatorId, false))
                .col(ref_col(TerritoryIndicatorsData::TerritoryId, false))
                .col(ColumnDef::new(TerritoryIndicatorsData::DateType).string().not_null())
                .col(ColumnDef::new(TerritoryIndicatorsData::DateValue).date().not_null())
                .col(ColumnDef::new(TerritoryIndicatorsData::Value).double().not_null())
                .col(ColumnDef::new(TerritoryIndicatorsData::ValueType).string().not_null())
                .col(
                    ColumnDef::new(TerritoryIndicatorsData::InformationSource)
                        .string()
                        .not_null(),
                )
                .col(timestamp_col(TerritoryIndicatorsData::CreatedAt))
                .col(timestamp_col(TerritoryIndicatorsData::UpdatedAt))
                .primary_key(
                    Index::create()
                        .name("territory_indicators_data_pk")
                        .col(TerritoryIndicatorsData::IndicatorId)
                        .col(TerritoryIndicatorsData::TerritoryId)
                        .col(TerritoryIndicatorsData::DateType)
                        .col(TerritoryIndicatorsData::DateValue)
                        .col(TerritoryIndicatorsData::ValueType)
                        .col(TerritoryIndicatorsData::InformationSource),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("territory_indicators_data_fk_indicator_id")
                        .from(TerritoryIndicatorsData::Table, TerritoryIndicatorsData::IndicatorId)
                        .to(IndicatorsDict::Table, IndicatorsDict::IndicatorId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("territory_indicators_data_fk_territory_id")
                        .from(TerritoryIndicatorsData::Table, TerritoryIndicatorsData::TerritoryId)
                        .to(TerritoriesData::Table, TerritoriesData::TerritoryId)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;
    Ok(())
}

async fn create_buffer_tables(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(BufferTypesDict::Table)
                .if_not_exists()
                .col(id_col(BufferTypesDict::BufferTypeId))
                .col(ColumnDef::new(BufferTypesDict::Name).string().not_null().unique_key())
                .col(ColumnDef::new(BufferTypesDict::Description).string())
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(DefaultBufferValuesDict::Table)
                .if_not_exists()
                .col(id_col(DefaultBufferValuesDict::DefaultBufferValueId))
                .col(ref_col(DefaultBufferValuesDict::BufferTypeId, false))
                .col(ref_col(DefaultBufferValuesDict::PhysicalObjectTypeId, true))
                .col(ref_col(DefaultBufferValuesDict::ServiceTypeId, true))
                .col(ColumnDef::new(DefaultBufferValuesDict::BufferValue).double().not_null())
                .foreign_key(
                    ForeignKey::create()
                        .name("default_buffer_values_dict_fk_buffer_type_id")
                        .from(DefaultBufferValuesDict::Table, DefaultBufferValuesDict::BufferTypeId)
                        .to(BufferTypesDict::Table, BufferTypesDict::BufferTypeId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("default_buffer_values_dict_fk_physical_object_type_id")
                        .from(
                            DefaultBufferValuesDict::Table,
                            DefaultBufferValuesDict::PhysicalObjectTypeId,
                        )
                        .to(
                            PhysicalObjectTypesDict::Table,
                            PhysicalObjectTypesDict::PhysicalObjectTypeId,
                        ),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("default_buffer_values_dict_fk_service_type_id")
                        .from(DefaultBufferValuesDict::Table, DefaultBufferValuesDict::ServiceTypeId)
                        .to(ServiceTypesDict::Table, ServiceTypesDict::ServiceTypeId),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(UrbanObjectsData::Table)
                .if_not_exists()
                .col(id_col(UrbanObjectsData::UrbanObjectId))
                .col(ref_col(UrbanObjectsData::ObjectGeometryId, false))
                .col(ref_col(UrbanObjectsData::PhysicalObjectTypeId, true))
                .col(ref_col(UrbanObjectsData::ServiceId, true))
                .foreign_key(
                    ForeignKey::create()
                        .name("urban_objects_data_fk_object_geometry_id")
                        .from(UrbanObjectsData::Table, UrbanObjectsData::ObjectGeometryId)
                        .to(ObjectGeometriesData::Table, ObjectGeometriesData::ObjectGeometryId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("urban_objects_data_fk_physical_object_type_id")
                        .from(UrbanObjectsData::Table, UrbanObjectsData::PhysicalObjectTypeId)
                        .to(
                            PhysicalObjectTypesDict::Table,
                            PhysicalObjectTypesDict::PhysicalObjectTypeId,
                        ),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("urban_objects_data_fk_service_id")
                        .from(UrbanObjectsData::Table, UrbanObjectsData::ServiceId)
                        .to(ServicesData::Table, ServicesData::ServiceId),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_table(
            Table::create()
                .table(BuffersData::Table)
                .if_not_exists()
                .col(ref_col(BuffersData::BufferTypeId, false))
                .col(ref_col(BuffersData::UrbanObjectId, false))
                .col(geometry_col(BuffersData::Geometry))
                .col(
                    ColumnDef::new(BuffersData::IsCustom)
                        .boolean()
                        .not_null()
                        .default(false),
                )
                .col(timestamp_col(BuffersData::UpdatedAt))
                .primary_key(
                    Index::create()
                        .name("buffers_data_pk")
                        .col(BuffersData::BufferTypeId)
                        .col(BuffersData::UrbanObjectId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("buffers_data_fk_buffer_type_id")
                        .from(BuffersData::Table, BuffersData::BufferTypeId)
                        .to(BufferTypesDict::Table, BufferTypesDict::BufferTypeId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("buffers_data_fk_urban_object_id")
                        .from(BuffersData::Table, BuffersData::UrbanObjectId)
                        .to(UrbanObjectsData::Table, UrbanObjectsData::UrbanObjectId)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;
    Ok(())
}

async fn create_indexes(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_index(
            Index::create()
                .name("territories_data_parent_id_idx")
                .table(TerritoriesData::Table)
                .col(TerritoriesData::ParentId)
                .if_not_exists()
                .to_owned(),
        )
        .await?;
    manager
        .create_index(
            Index::create()
                .name("urban_functions_dict_parent_id_idx")
                .table(UrbanFunctionsDict::Table)
                .col(UrbanFunctionsDict::ParentId)
                .if_not_exists()
                .to_owned(),
        )
        .await?;
    manager
        .create_index(
            Index::create()
                .name("physical_object_functions_dict_parent_id_idx")
                .table(PhysicalObjectFunctionsDict::Table)
                .col(PhysicalObjectFunctionsDict::ParentId)
                .if_not_exists()
                .to_owned(),
        )
        .await?;
    manager
        .create_index(
            Index::create()
                .name("object_geometries_data_territory_id_idx")
                .table(ObjectGeometriesData::Table)
                .col(ObjectGeometriesData::TerritoryId)
                .if_not_exists()
                .to_owned(),
        )
        .await?;
    manager
        .create_index(
            Index::create()
                .name("service_types_normatives_data_service_type_unique")
                .table(ServiceTypesNormativesData::Table)
                .col(ServiceTypesNormativesData::ServiceTypeId)
                .col(ServiceTypesNormativesData::TerritoryId)
                .col(ServiceTypesNormativesData::Year)
                .unique()
                .if_not_exists()
                .to_owned(),
        )
        .await?;
    manager
        .create_index(
            Index::create()
                .name("service_types_normatives_data_urban_function_unique")
                .table(ServiceTypesNormativesData::Table)
                .col(ServiceTypesNormativesData::UrbanFunctionId)
                .col(ServiceTypesNormativesData::TerritoryId)
                .col(ServiceTypesNormativesData::Year)
                .unique()
                .if_not_exists()
                .to_owned(),
        )
        .await?;
    manager
        .create_index(
            Index::create()
                .name("default_buffer_values_dict_unique")
                .table(DefaultBufferValuesDict::Table)
                .col(DefaultBufferValuesDict::BufferTypeId)
                .col(DefaultBufferValuesDict::PhysicalObjectTypeId)
                .col(DefaultBufferValuesDict::ServiceTypeId)
                .unique()
                .if_not_exists()
                .to_owned(),
        )
        .await?;
    Ok(())
}
