use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::features::geodirectory::models::GeoNodeType;

/// PostgreSQL `serialization_failure`
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// PostgreSQL `deadlock_detected`
const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Geo node '{0}' not found")]
    NotFound(Uuid),

    #[error("Parent geo node '{0}' not found")]
    ParentNotFound(Uuid),

    #[error("A {child} node cannot be placed {}", placement_label(.parent))]
    TypeConstraint {
        child: GeoNodeType,
        parent: Option<GeoNodeType>,
    },

    #[error("Cannot move node '{node_id}' under '{target_id}': the target is the node itself or one of its descendants")]
    Cycle { node_id: Uuid, target_id: Uuid },

    #[error("Field '{0}' cannot be changed by an update; use the move endpoint for structural changes")]
    ImmutableField(&'static str),

    #[error("Structural mutation conflicted with a concurrent write after {attempts} attempt(s)")]
    TransactionConflict { attempts: u32 },

    #[error("Operation did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Hierarchy is corrupted: {0}")]
    Corrupted(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

fn placement_label(parent: &Option<GeoNodeType>) -> String {
    match parent {
        Some(parent) => format!("under a {} node", parent),
        None => "at the root level".to_string(),
    }
}

impl GeoError {
    /// Classify a database error, mapping serialization failures and deadlocks
    /// to a retryable conflict
    pub fn from_db(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if matches!(
                db_err.code().as_deref(),
                Some(SQLSTATE_SERIALIZATION_FAILURE) | Some(SQLSTATE_DEADLOCK_DETECTED)
            ) {
                return GeoError::TransactionConflict { attempts: 1 };
            }
        }
        GeoError::Storage(e)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, GeoError::TransactionConflict { .. })
    }
}

impl From<GeoError> for AppError {
    fn from(e: GeoError) -> Self {
        match e {
            GeoError::NotFound(_) | GeoError::ParentNotFound(_) => AppError::NotFound(e.to_string()),
            GeoError::TypeConstraint { .. } | GeoError::ImmutableField(_) => {
                AppError::Validation(e.to_string())
            }
            GeoError::Cycle { .. } => AppError::BadRequest(e.to_string()),
            GeoError::TransactionConflict { .. } => AppError::Conflict(e.to_string()),
            GeoError::DeadlineExceeded(_) => AppError::Unavailable(e.to_string()),
            GeoError::Corrupted(_) => AppError::Internal(e.to_string()),
            GeoError::Storage(inner) => AppError::Database(inner),
        }
    }
}
