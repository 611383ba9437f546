use crate::domain::lifecycle::SessionAction;
use crate::domain::models::SessionStatus;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("transition rejected: cannot {action} a {current} session ({reason})")]
    TransitionRejected {
        action: SessionAction,
        current: SessionStatus,
        reason: String,
    },
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

impl LifecycleError {
    pub(crate) fn rejected(
        action: SessionAction,
        current: SessionStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self::TransitionRejected {
            action,
            current,
            reason: reason.into(),
        }
    }
}
