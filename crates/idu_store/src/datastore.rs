//! Opening a store from a data directory that carries its own `idu_store.json`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{DEFAULT_CONFIG_NAME, DEFAULT_DB_NAME};
use crate::{DatabaseConfig, IduError, IduResult, StoreConfig, UrbanStore};

pub fn config_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_CONFIG_NAME)
}

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_DB_NAME)
}

pub fn load_or_init_config(base: &Path) -> IduResult<StoreConfig> {
    StoreConfig::load_or_init(base, &default_sqlite_path(base))
}

/// The SQLite file a configuration resolves to; `None` for Postgres.
pub fn database_file(config: &StoreConfig, base: &Path) -> IduResult<Option<PathBuf>> {
    match config.database {
        DatabaseConfig::Sqlite { .. } => config.sqlite_path(base).map(Some),
        DatabaseConfig::Postgres { .. } => Ok(None),
    }
}

/// Loads (or writes) the directory's config and connects. A configured SQLite
/// file in a subdirectory gets that directory created first.
pub async fn open_store(base: &Path) -> IduResult<UrbanStore> {
    let config = load_or_init_config(base)?;
    match database_file(&config, base)? {
        Some(file) => {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| IduError::storage(format!("create database dir: {err}")))?;
            }
            log::info!("opening urban store at {}", file.display());
        }
        None => log::info!(
            "opening {} urban store configured in {}",
            config.backend_name(),
            config_path(base).display()
        ),
    }
    UrbanStore::connect(&config, base).await
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{config_path, database_file, default_sqlite_path, load_or_init_config, open_store};
    use crate::{DatabaseConfig, StoreConfig};
    use tempfile::tempdir;

    #[tokio::test]
    async fn fresh_directory_gets_config_and_database() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path();
        let config = load_or_init_config(base).expect("config");
        assert!(config_path(base).exists());
        assert_eq!(
            database_file(&config, base).expect("resolve"),
            Some(default_sqlite_path(base))
        );
        let _store = open_store(base).await.expect("open store");
        assert!(default_sqlite_path(base).exists());
    }

    #[tokio::test]
    async fn configured_subdirectory_is_created() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path();
        fs::write(
            config_path(base),
            r#"{ "database": { "backend": "sqlite", "path": "city/2024/urban.sqlite" } }"#,
        )
        .expect("write config");
        let _store = open_store(base).await.expect("open store");
        assert!(base.join("city/2024/urban.sqlite").exists());
        assert!(!default_sqlite_path(base).exists());
    }

    #[test]
    fn postgres_config_has_no_database_file() {
        let dir = tempdir().expect("tempdir");
        let config = StoreConfig {
            database: DatabaseConfig::Postgres {
                url: "postgres://localhost/urban".to_string(),
            },
            ..StoreConfig::default_sqlite("unused.sqlite")
        };
        assert_eq!(database_file(&config, dir.path()).expect("resolve"), None);
    }
}
