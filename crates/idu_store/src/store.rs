use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{self, ExprTrait, PostgresQueryBuilder, QueryStatementWriter, SqliteQueryBuilder};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, QueryResult, Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use idu_urban_core::{
    Geometry, HierarchyEngine, HierarchyKind, IduError, IduResult, Properties,
};

use crate::StoreConfig;
use crate::migration::Migrator;

#[derive(Clone)]
pub struct UrbanStore {
    pub(crate) conn: DatabaseConnection,
    pub(crate) backend: DatabaseBackend,
    limits: StoreLimits,
    failpoints: HashSet<String>,
    locks: HierarchyLocks,
}

#[derive(Clone, Copy, Debug)]
struct StoreLimits {
    operation_timeout: Duration,
    max_hierarchy_depth: usize,
}

/// In-process serialization of writes to one hierarchy. Postgres additionally
/// takes a transaction-scoped advisory lock so separate processes agree.
#[derive(Clone)]
struct HierarchyLocks {
    territory: Arc<Mutex<()>>,
    urban_function: Arc<Mutex<()>>,
    physical_object_function: Arc<Mutex<()>>,
}

impl HierarchyLocks {
    fn new() -> Self {
        Self {
            territory: Arc::new(Mutex::new(())),
            urban_function: Arc::new(Mutex::new(())),
            physical_object_function: Arc::new(Mutex::new(())),
        }
    }

    async fn acquire(&self, kind: HierarchyKind) -> OwnedMutexGuard<()> {
        let lock = match kind {
            HierarchyKind::Territory => &self.territory,
            HierarchyKind::UrbanFunction => &self.urban_function,
            HierarchyKind::PhysicalObjectFunction => &self.physical_object_function,
        };
        Arc::clone(lock).lock_owned().await
    }
}

impl UrbanStore {
    pub async fn connect(config: &StoreConfig, base_dir: &Path) -> IduResult<Self> {
        let url = config.connection_url(base_dir)?;
        let mut options = ConnectOptions::new(url);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        options.sqlx_logging(false);
        let conn = Database::connect(options).await.map_err(IduError::from)?;
        let backend = conn.get_database_backend();
        let limits = config.limits();
        let failpoints = config
            .failpoints
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect::<HashSet<_>>();
        let store = Self {
            conn,
            backend,
            limits: StoreLimits {
                operation_timeout: limits.operation_timeout(),
                max_hierarchy_depth: limits.max_depth(),
            },
            failpoints,
            locks: HierarchyLocks::new(),
        };
        log::info!("connected urban store ({})", config.backend_name());
        Migrator::up(&store.conn, None)
            .await
            .map_err(IduError::from)?;
        Ok(store)
    }

    pub async fn connect_sqlite(path: &Path) -> IduResult<Self> {
        let config = StoreConfig::default_sqlite(path.to_string_lossy());
        Self::connect(&config, path.parent().unwrap_or_else(|| Path::new("."))).await
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub(crate) fn maybe_failpoint(&self, key: &str) -> IduResult<()> {
        if self.failpoints.contains(key) {
            Err(IduError::storage(format!("failpoint {key}")))
        } else {
            Ok(())
        }
    }

    pub(crate) fn engine(&self, kind: HierarchyKind) -> HierarchyEngine {
        HierarchyEngine::new(kind, self.limits.max_hierarchy_depth)
    }

    /// Bounds one API operation. A timed-out write drops its transaction,
    /// which rolls it back.
    pub(crate) async fn timed<T, F>(&self, operation: &str, fut: F) -> IduResult<T>
    where
        F: Future<Output = IduResult<T>> + Send,
    {
        match tokio::time::timeout(self.limits.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "{operation} exceeded {} ms and was rolled back",
                    self.limits.operation_timeout.as_millis()
                );
                Err(IduError::timeout(format!("{operation} timed out")))
            }
        }
    }

    /// Opens a write transaction that holds the hierarchy's lock until it is
    /// committed or dropped.
    pub(crate) async fn begin_hierarchy_write(
        &self,
        kind: HierarchyKind,
    ) -> IduResult<(OwnedMutexGuard<()>, DatabaseTransaction)> {
        let guard = self.locks.acquire(kind).await;
        let tx = self.conn.begin().await?;
        if self.backend == DatabaseBackend::Postgres {
            tx.execute_raw(Statement::from_sql_and_values(
                self.backend,
                "SELECT pg_advisory_xact_lock($1)",
                [kind.lock_key().into()],
            ))
            .await?;
        }
        Ok((guard, tx))
    }
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn col_name(column: impl sea_query::Iden) -> String {
    column.to_string()
}

pub(crate) fn read_geometry(row: &QueryResult, column: impl sea_query::Iden) -> IduResult<Geometry> {
    let raw: String = row.try_get("", &col_name(column))?;
    Geometry::from_json(&raw).map_err(|err| IduError::storage(format!("stored geometry: {err}")))
}

pub(crate) fn read_properties(row: &QueryResult, column: impl sea_query::Iden) -> IduResult<Properties> {
    let raw: Option<String> = row.try_get("", &col_name(column))?;
    match raw {
        Some(raw) if !raw.is_empty() => {
            serde_json::from_str(&raw).map_err(|err| IduError::storage(err.to_string()))
        }
        _ => Ok(Properties::new()),
    }
}

pub(crate) fn encode_properties(properties: &Properties) -> IduResult<String> {
    serde_json::to_string(properties).map_err(|err| IduError::storage(err.to_string()))
}

pub(crate) fn read_opt_i32(row: &QueryResult, column: impl sea_query::Iden) -> IduResult<Option<i32>> {
    Ok(row.try_get("", &col_name(column))?)
}

pub(crate) fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        _ => stmt.build(SqliteQueryBuilder),
    }
}

pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> IduResult<u64>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let result = conn
        .execute_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> IduResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let rows = conn
        .query_all_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(rows)
}

pub(crate) async fn query_one<C, S>(conn: &C, stmt: &S) -> IduResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let row = conn
        .query_one_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(row)
}

/// Runs an `INSERT ... RETURNING <id>` and reads the new id back.
pub(crate) async fn insert_returning_id<C>(
    conn: &C,
    stmt: &sea_query::InsertStatement,
    id_column: impl sea_query::Iden,
) -> IduResult<i32>
where
    C: ConnectionTrait,
{
    let name = col_name(id_column);
    let row = query_one(conn, stmt)
        .await?
        .ok_or_else(|| IduError::storage(format!("insert returned no {name}")))?;
    Ok(row.try_get("", &name)?)
}

/// Fails with `ReferencedEntityMissing` unless a row with `id` exists.
pub(crate) async fn ensure_exists<C, T, K>(conn: &C, table: T, id_column: K, id: i32, what: &str) -> IduResult<()>
where
    C: ConnectionTrait,
    T: sea_query::IntoTableRef,
    K: sea_query::Iden + Clone,
{
    let select = sea_query::Query::select()
        .from(table)
        .column(id_column.clone())
        .and_where(sea_query::Expr::col(id_column).eq(id))
        .limit(1)
        .to_owned();
    match query_one(conn, &select).await? {
        Some(_) => Ok(()),
        None => Err(IduError::missing_reference(format!("{what} {id} does not exist"))),
    }
}

/// Trims a required display name.
pub(crate) fn required_name(name: &str, what: &str) -> IduResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(IduError::validation(format!("{what} name must not be empty")));
    }
    Ok(trimmed.to_string())
}
