use sea_orm::{ConnAcquireErr, DbErr, RuntimeErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IduError {
    #[error("invalid geometry: {message}")]
    InvalidGeometry { message: String },
    #[error("hierarchy cycle: {message}")]
    HierarchyCycle { message: String },
    #[error("uniqueness conflict: {message}")]
    UniquenessConflict { message: String },
    #[error("invalid normative fields: {message}")]
    InvalidNormativeFields { message: String },
    #[error("referenced entity missing: {message}")]
    ReferencedEntityMissing { message: String },
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("timeout: {message}")]
    Timeout { message: String },
    #[error("connection error: {message}")]
    Connection { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("token expired")]
    ExpiredToken,
    #[error("invalid token signature")]
    InvalidTokenSignature,
}

impl IduError {
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    pub fn hierarchy_cycle(message: impl Into<String>) -> Self {
        Self::HierarchyCycle {
            message: message.into(),
        }
    }

    pub fn uniqueness(message: impl Into<String>) -> Self {
        Self::UniquenessConflict {
            message: message.into(),
        }
    }

    pub fn invalid_normative(message: impl Into<String>) -> Self {
        Self::InvalidNormativeFields {
            message: message.into(),
        }
    }

    pub fn missing_reference(message: impl Into<String>) -> Self {
        Self::ReferencedEntityMissing {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Stable machine-readable code, safe to expose to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidGeometry { .. } => "invalid_geometry",
            Self::HierarchyCycle { .. } => "hierarchy_cycle",
            Self::UniquenessConflict { .. } => "uniqueness_conflict",
            Self::InvalidNormativeFields { .. } => "invalid_normative_fields",
            Self::ReferencedEntityMissing { .. } => "referenced_entity_missing",
            Self::Validation { .. } => "validation_failed",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Timeout { .. } => "timeout",
            Self::Connection { .. } => "connection_failed",
            Self::Storage { .. } => "storage_failed",
            Self::ExpiredToken => "expired_token",
            Self::InvalidTokenSignature => "invalid_token_signature",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidGeometry { .. }
            | Self::InvalidNormativeFields { .. }
            | Self::Validation { .. }
            | Self::HierarchyCycle { .. } => 400,
            Self::ExpiredToken | Self::InvalidTokenSignature => 401,
            Self::NotFound { .. } | Self::ReferencedEntityMissing { .. } => 404,
            Self::UniquenessConflict { .. } | Self::Conflict { .. } => 409,
            Self::Connection { .. } => 503,
            Self::Timeout { .. } => 504,
            Self::Storage { .. } => 500,
        }
    }

    /// Only transient failures are worth retrying; validation failures never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection { .. })
    }
}

pub type IduResult<T> = Result<T, IduError>;

impl From<DbErr> for IduError {
    fn from(value: DbErr) -> Self {
        match value.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => return IduError::uniqueness(message),
            Some(SqlErr::ForeignKeyConstraintViolation(message)) => {
                return IduError::missing_reference(message);
            }
            _ => {}
        }
        if lock_contention(&value) {
            return IduError::timeout(format!("database is locked: {value}"));
        }
        match value {
            DbErr::ConnectionAcquire(ConnAcquireErr::Timeout) => {
                IduError::timeout("connection pool acquire timed out")
            }
            DbErr::ConnectionAcquire(err) => IduError::connection(err.to_string()),
            DbErr::Conn(err) => IduError::connection(err.to_string()),
            DbErr::RecordNotFound(message) => IduError::not_found(message),
            other => IduError::storage(other.to_string()),
        }
    }
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";

/// Another writer holds the lock the statement needed; retrying may succeed.
fn lock_contention(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Exec(err) | DbErr::Query(err) | DbErr::Conn(err) => err,
        _ => return false,
    };
    match runtime {
        RuntimeErr::SqlxError(err) => err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| is_lock_contention_code(&code)),
        _ => false,
    }
}

/// Postgres reports five character SQLSTATEs; SQLite reports numeric result
/// codes, extended ones carrying the primary code in the low byte.
fn is_lock_contention_code(code: &str) -> bool {
    if code.len() == 5 {
        return code == PG_LOCK_NOT_AVAILABLE;
    }
    match code.parse::<i32>() {
        Ok(extended) => matches!(extended & 0xff, SQLITE_BUSY | SQLITE_LOCKED),
        Err(_) => false,
    }
}
