use crate::domain::lifecycle::SessionAction;
use crate::domain::models::{SessionStatus, StudySession};
use crate::domain::pomodoro::PomodoroPhase;
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PlannerEvent {
    TransitionRejected {
        session_id: i64,
        action: SessionAction,
        current_status: SessionStatus,
    },
    PhaseComplete {
        session_id: i64,
        completed: PomodoroPhase,
        phase: PomodoroPhase,
        cycle: u32,
    },
    SessionCompleted {
        session: StudySession,
    },
    SessionAutoExpired {
        session: StudySession,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PlannerEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: PlannerEvent) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: PlannerEvent) {
        match event {
            PlannerEvent::TransitionRejected {
                session_id,
                action,
                current_status,
            } => warn!(session_id, %action, %current_status, "transition rejected"),
            PlannerEvent::PhaseComplete {
                session_id,
                completed,
                phase,
                cycle,
            } => debug!(
                session_id,
                completed = completed.as_str(),
                phase = phase.as_str(),
                cycle,
                "phase complete"
            ),
            PlannerEvent::SessionCompleted { session } => {
                info!(session_id = session.id, "session completed")
            }
            PlannerEvent::SessionAutoExpired { session } => {
                info!(session_id = session.id, "session auto-expired")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: UnboundedSender<PlannerEvent>,
}

impl ChannelEventSink {
    pub fn channel() -> (Self, UnboundedReceiver<PlannerEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: PlannerEvent) {
        let _ = self.sender.send(event);
    }
}
