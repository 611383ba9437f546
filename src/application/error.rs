use crate::domain::error::LifecycleError;
use crate::infrastructure::error::InfraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("stale state for session {session_id}: {reason}")]
    StaleSessionState { session_id: i64, reason: String },
    #[error("invalid completion metadata: {0}")]
    InvalidMetadata(String),
    #[error(transparent)]
    Store(#[from] InfraError),
}

impl PlannerError {
    pub(crate) fn stale(session_id: i64, reason: impl Into<String>) -> Self {
        Self::StaleSessionState {
            session_id,
            reason: reason.into(),
        }
    }

    pub(crate) fn from_store(session_id: i64, operation: &str, error: InfraError) -> Self {
        match error {
            InfraError::NotFound(_) => {
                Self::stale(session_id, format!("session no longer exists ({operation})"))
            }
            other => Self::Store(other),
        }
    }

    pub fn is_transition_rejected(&self) -> bool {
        matches!(
            self,
            Self::Lifecycle(LifecycleError::TransitionRejected { .. })
        )
    }
}
