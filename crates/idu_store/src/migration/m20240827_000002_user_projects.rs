use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

use super::{geometry_col, id_col, json_col, ref_col, timestamp_col};
use crate::db::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        if backend == DatabaseBackend::Postgres {
            manager
                .get_connection()
                .execute_raw(Statement::from_string(
                    backend,
                    format!("CREATE SCHEMA IF NOT EXISTS {PROJECT_SCHEMA}"),
                ))
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(project_table(backend, ScenariosData::Table))
                    .if_not_exists()
                    .col(id_col(ScenariosData::ScenarioId))
                    .col(ColumnDef::new(ScenariosData::Name).string().not_null())
                    .col(
                        ColumnDef::new(ScenariosData::IsBased)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ScenariosData::Phase).string())
                    .col(ColumnDef::new(ScenariosData::PhasePercentage).double())
                    .col(json_col(ScenariosData::Properties))
                    .col(timestamp_col(ScenariosData::CreatedAt))
                    .col(timestamp_col(ScenariosData::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(project_table(backend, ProjectObjectGeometriesData::Table))
                    .if_not_exists()
                    .col(id_col(ProjectObjectGeometriesData::ObjectGeometryId))
                    .col(ref_col(ProjectObjectGeometriesData::ScenarioId, false))
                    .col(ref_col(ProjectObjectGeometriesData::TerritoryId, true))
                    .col(geometry_col(ProjectObjectGeometriesData::Geometry))
                    .col(geometry_col(ProjectObjectGeometriesData::CentrePoint))
                    .col(ColumnDef::new(ProjectObjectGeometriesData::Address).string())
                    .col(ColumnDef::new(ProjectObjectGeometriesData::OsmId).string())
                    .col(timestamp_col(ProjectObjectGeometriesData::CreatedAt))
                    .col(timestamp_col(ProjectObjectGeometriesData::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("project_object_geometries_data_fk_scenario_id")
                            .from(
                                project_table(backend, ProjectObjectGeometriesData::Table),
                                ProjectObjectGeometriesData::ScenarioId,
                            )
                            .to(project_table(backend, ScenariosData::Table), ScenariosData::ScenarioId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("project_object_geometries_data_fk_territory_id")
                            .from(
                                project_table(backend, ProjectObjectGeometriesData::Table),
                                ProjectObjectGeometriesData::TerritoryId,
                            )
                            .to(TerritoriesData::Table, TerritoriesData::TerritoryId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(project_table(backend, HexagonsData::Table))
                    .if_not_exists()
                    .col(id_col(HexagonsData::HexagonId))
                    .col(ref_col(HexagonsData::TerritoryId, false))
                    .col(geometry_col(HexagonsData::Geometry))
                    .col(geometry_col(HexagonsData::CentrePoint))
                    .col(json_col(HexagonsData::Properties))
                    .foreign_key(
                        ForeignKey::create()
                            .name("hexagons_data_fk_territory_id")
                            .from(project_table(backend, HexagonsData::Table), HexagonsData::TerritoryId)
                            .to(TerritoriesData::Table, TerritoriesData::TerritoryId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(project_table(backend, IndicatorsData::Table))
                    .if_not_exists()
                    .col(id_col(IndicatorsData::IndicatorValueId))
                    .col(ref_col(IndicatorsData::IndicatorId, false))
                    .col(ref_col(IndicatorsData::ScenarioId, false))
                    .col(ref_col(IndicatorsData::TerritoryId, true))
                    .col(ref_col(IndicatorsData::HexagonId, true))
                    .col(ColumnDef::new(IndicatorsData::Value).double().not_null())
                    .col(ColumnDef::new(IndicatorsData::Comment).string())
                    .col(ColumnDef::new(IndicatorsData::InformationSource).string())
                    .col(json_col(IndicatorsData::Properties))
                    .col(timestamp_col(IndicatorsData::CreatedAt))
                    .col(timestamp_col(IndicatorsData::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("indicators_data_fk_indicator_id")
                            .from(project_table(backend, IndicatorsData::Table), IndicatorsData::IndicatorId)
                            .to(IndicatorsDict::Table, IndicatorsDict::IndicatorId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("indicators_data_fk_scenario_id")
                            .from(project_table(backend, IndicatorsData::Table), IndicatorsData::ScenarioId)
                            .to(project_table(backend, ScenariosData::Table), ScenariosData::ScenarioId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("indicators_data_fk_territory_id")
                            .from(project_table(backend, IndicatorsData::Table), IndicatorsData::TerritoryId)
                            .to(TerritoriesData::Table, TerritoriesData::TerritoryId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("indicators_data_fk_hexagon_id")
                            .from(project_table(backend, IndicatorsData::Table), IndicatorsData::HexagonId)
                            .to(project_table(backend, HexagonsData::Table), HexagonsData::HexagonId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        for table in [
            project_table(backend, IndicatorsData::Table),
            project_table(backend, HexagonsData::Table),
            project_table(backend, ProjectObjectGeometriesData::Table),
            project_table(backend, ScenariosData::Table),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
