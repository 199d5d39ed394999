//! NutriCheck tools module
//!
//! Tool implementations behind the MCP server. Each takes the database and
//! explicit user ids and returns a serializable response.

pub mod measurements;
pub mod profile;
pub mod recommendations;
pub mod reference;
pub mod status;
pub mod survey;

use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;

/// Tool failure, split by whose fault it is
#[derive(Debug, Error)]
pub enum ToolError {
    /// Bad input or missing permission; the caller can fix it
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Internal(String),
}

impl From<DbError> for ToolError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Validation(_) | DbError::PermissionDenied(_) => ToolError::Invalid(e.to_string()),
            // Constraint failures come from ids that do not exist
            DbError::Sqlite(rusqlite::Error::SqliteFailure(ref err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ToolError::Invalid(format!("Constraint violated: {}", e))
            }
            other => ToolError::Internal(other.to_string()),
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

pub(crate) fn invalid(message: impl Into<String>) -> ToolError {
    ToolError::Invalid(message.into())
}

/// Response for delete operations
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_id: i64,
}
