use sea_orm_migration::prelude::*;

use idu_urban_core::{IdentityKeyName, IdentityKeySpec, identity_key};

use crate::db::{IndicatorsData, project_table};
use crate::identity::enforce_identity_key;

/// Key version this step enforces. Later versions get their own migration.
const KEY_VERSION: u32 = 1;

fn key_spec() -> Result<&'static IdentityKeySpec, DbErr> {
    identity_key(IdentityKeyName::ScenarioIndicatorValue, KEY_VERSION).ok_or_else(|| {
        DbErr::Custom(format!(
            "scenario indicator identity v{KEY_VERSION} is not registered"
        ))
    })
}

/// Collapses duplicate project indicator values, then adds `indicators_data_unique`.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let spec = key_spec()?;
        let report = enforce_identity_key(manager.get_connection(), spec)
            .await
            .map_err(|err| DbErr::Custom(err.to_string()))?;
        if report.removed > 0 {
            log::warn!(
                "removed {} duplicate project indicator values before adding {}",
                report.removed,
                report.index_name
            );
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let spec = key_spec()?;
        manager
            .drop_index(
                Index::drop()
                    .name(spec.index_name)
                    .table(project_table(backend, IndicatorsData::Table))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::key_spec;

    #[test]
    fn enforces_the_first_key_version() {
        let spec = key_spec().expect("v1 registered");
        assert_eq!(spec.version, 1);
        assert_eq!(spec.index_name, "indicators_data_unique");
        assert_eq!(
            spec.columns,
            ["indicator_id", "scenario_id", "territory_id", "hexagon_id"]
        );
    }
}
