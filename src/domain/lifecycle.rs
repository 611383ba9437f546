use crate::domain::error::LifecycleError;
use crate::domain::models::{SessionStatus, StudySession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    /// Also used to resume a paused session.
    Start,
    Pause,
    Complete,
    Cancel,
    Restart { confirmed: bool },
    AutoExpire,
}

impl SessionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Restart { .. } => "restart",
            Self::AutoExpire => "auto-expire",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroEffect {
    None,
    Begin,
    Resume,
    Pause,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: SessionAction,
    pub from: SessionStatus,
    pub to: SessionStatus,
    pub effect: PomodoroEffect,
    pub celebrate: bool,
}

pub fn plan_transition(
    session: &StudySession,
    action: SessionAction,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    use SessionStatus::{Cancelled, Completed, InProgress, Paused, Planned};

    let from = session.status;
    let to = match (from, action) {
        (Planned | Paused, SessionAction::Start) => {
            if session.end_time <= now {
                return Err(LifecycleError::rejected(
                    action,
                    from,
                    "session end time has already passed",
                ));
            }
            InProgress
        }
        (InProgress, SessionAction::Pause) => {
            if !session.session_type.allows_pause() {
                return Err(LifecycleError::rejected(
                    action,
                    from,
                    format!("{} sessions cannot be paused", session.session_type.as_str()),
                ));
            }
            Paused
        }
        (InProgress | Paused, SessionAction::Complete) => Completed,
        (InProgress, SessionAction::Cancel) => Cancelled,
        (Completed, SessionAction::Restart { confirmed }) => {
            if !confirmed {
                return Err(LifecycleError::rejected(
                    action,
                    from,
                    "restart requires explicit confirmation",
                ));
            }
            Planned
        }
        (InProgress | Paused, SessionAction::AutoExpire) => {
            if !is_overdue_and_unresolved(session, now) {
                return Err(LifecycleError::rejected(
                    action,
                    from,
                    "session end time has not passed",
                ));
            }
            Cancelled
        }
        _ => {
            return Err(LifecycleError::rejected(
                action,
                from,
                "not allowed from this status",
            ));
        }
    };

    let effect = if session.is_pomodoro() {
        match (from, to) {
            (Planned, InProgress) => PomodoroEffect::Begin,
            (Paused, InProgress) => PomodoroEffect::Resume,
            (_, Paused) => PomodoroEffect::Pause,
            (_, Completed | Cancelled) => PomodoroEffect::Stop,
            _ => PomodoroEffect::None,
        }
    } else {
        PomodoroEffect::None
    };

    Ok(Transition {
        action,
        from,
        to,
        effect,
        celebrate: to == Completed,
    })
}

pub fn can_start(session: &StudySession, now: DateTime<Utc>) -> bool {
    matches!(session.status, SessionStatus::Planned | SessionStatus::Paused)
        && session.end_time > now
}

pub fn is_overdue_and_unresolved(session: &StudySession, now: DateTime<Utc>) -> bool {
    !session.status.is_resolved() && session.end_time < now
}

pub fn ensure_schedule_editable(session: &StudySession) -> Result<(), LifecycleError> {
    if !session.status.allows_schedule_edit() {
        return Err(LifecycleError::InvalidSchedule(format!(
            "cannot change the schedule of a {} session",
            session.status
        )));
    }
    Ok(())
}

pub fn validate_schedule(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if end_time <= start_time {
        return Err(LifecycleError::InvalidSchedule(
            "endTime must be after startTime".to_string(),
        ));
    }
    Ok(())
}
