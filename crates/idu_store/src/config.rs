use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use idu_urban_core::{DEFAULT_MAX_DEPTH, IduError, IduResult};

pub(crate) const DEFAULT_CONFIG_NAME: &str = "idu_store.json";
pub(crate) const DEFAULT_DB_NAME: &str = "urban.sqlite";
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub operation_timeout_ms: Option<u64>,
    pub max_hierarchy_depth: Option<usize>,
}

impl LimitsConfig {
    pub fn with_defaults() -> Self {
        Self {
            operation_timeout_ms: Some(DEFAULT_OPERATION_TIMEOUT_MS),
            max_hierarchy_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(
            self.operation_timeout_ms
                .unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS),
        )
    }

    pub fn max_depth(&self) -> usize {
        self.max_hierarchy_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub limits: Option<LimitsConfig>,
    /// Named points at which a write aborts; only for exercising rollback.
    pub failpoints: Option<Vec<String>>,
}

impl StoreConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            limits: Some(LimitsConfig::with_defaults()),
            failpoints: None,
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> IduResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| IduError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| IduError::storage(format!("read config: {err}")))?;
            let config: StoreConfig =
                serde_json::from_str(&raw).map_err(|err| IduError::validation(err.to_string()))?;
            return Ok(config);
        }
        let default = StoreConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| IduError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| IduError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> IduResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            DatabaseConfig::Postgres { .. } => {
                Err(IduError::validation("config is not sqlite backend"))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
        }
    }

    pub fn connection_url(&self, base_dir: &Path) -> IduResult<String> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => {
                let path = self.sqlite_path(base_dir)?;
                Ok(format!("sqlite://{}?mode=rwc", path.display()))
            }
            DatabaseConfig::Postgres { url } => Ok(url.clone()),
        }
    }

    pub fn limits(&self) -> LimitsConfig {
        self.limits.clone().unwrap_or_else(LimitsConfig::with_defaults)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{DatabaseConfig, LimitsConfig, StoreConfig};

    #[test]
    fn relative_sqlite_path_resolves_against_base() {
        let config = StoreConfig::default_sqlite("data/urban.sqlite");
        let path = config.sqlite_path(Path::new("/srv/idu")).expect("path");
        assert_eq!(path, Path::new("/srv/idu/data/urban.sqlite"));
        let url = config.connection_url(Path::new("/srv/idu")).expect("url");
        assert_eq!(url, "sqlite:///srv/idu/data/urban.sqlite?mode=rwc");
    }

    #[test]
    fn postgres_has_no_sqlite_path() {
        let config = StoreConfig {
            database: DatabaseConfig::Postgres {
                url: "postgres://idu@localhost/urban".to_string(),
            },
            pool: None,
            limits: None,
            failpoints: None,
        };
        assert!(config.sqlite_path(Path::new(".")).is_err());
        assert_eq!(config.backend_name(), "postgres");
        assert_eq!(config.limits().max_depth(), LimitsConfig::with_defaults().max_depth());
    }
}
