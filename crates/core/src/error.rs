use crate::plan_generation::JobStatus;
use crate::types::DbId;

/// Domain errors shared by the job controller, the stores and the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Nothing of kind `entity` exists for the given owner.
    #[error("{entity} not found for user {owner_id}")]
    NotFound { entity: &'static str, owner_id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The request collides with existing state (e.g. an active job).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A job update that the job's current status does not permit.
    #[error("Cannot apply {attempted} to a {from} job")]
    InvalidTransition {
        from: JobStatus,
        attempted: &'static str,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
