use crate::application::context::NowProvider;
use crate::application::error::PlannerError;
use crate::application::events::{EventSink, PlannerEvent};
use crate::domain::lifecycle::{
    SessionAction, Transition, ensure_schedule_editable, plan_transition, validate_schedule,
};
use crate::domain::models::{
    CompletionMetadata, CompletionUpdate, SessionStatus, StatusChange, StudySession,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::session_store::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub session: StudySession,
    pub transition: Transition,
}

pub struct SessionLifecycleService<S>
where
    S: SessionStore,
{
    store: Arc<S>,
    events: Arc<dyn EventSink>,
    now_provider: NowProvider,
}

impl<S> Clone for SessionLifecycleService<S>
where
    S: SessionStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            now_provider: Arc::clone(&self.now_provider),
        }
    }
}

impl<S> SessionLifecycleService<S>
where
    S: SessionStore,
{
    pub fn new(store: Arc<S>, events: Arc<dyn EventSink>, now_provider: NowProvider) -> Self {
        Self {
            store,
            events,
            now_provider,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub async fn start(&self, session_id: i64) -> Result<TransitionOutcome, PlannerError> {
        self.apply(session_id, SessionAction::Start, CompletionUpdate::Keep)
            .await
    }

    pub async fn pause(&self, session_id: i64) -> Result<TransitionOutcome, PlannerError> {
        self.apply(session_id, SessionAction::Pause, CompletionUpdate::Keep)
            .await
    }

    pub async fn complete(
        &self,
        session_id: i64,
        metadata: Option<CompletionMetadata>,
    ) -> Result<TransitionOutcome, PlannerError> {
        let completion = match metadata {
            Some(metadata) => {
                metadata.validate().map_err(PlannerError::InvalidMetadata)?;
                CompletionUpdate::Record(metadata)
            }
            None => CompletionUpdate::Keep,
        };
        self.apply(session_id, SessionAction::Complete, completion)
            .await
    }

    pub async fn cancel(&self, session_id: i64) -> Result<TransitionOutcome, PlannerError> {
        self.apply(session_id, SessionAction::Cancel, CompletionUpdate::Keep)
            .await
    }

    pub async fn restart(
        &self,
        session_id: i64,
        confirmed: bool,
    ) -> Result<TransitionOutcome, PlannerError> {
        self.apply(
            session_id,
            SessionAction::Restart { confirmed },
            CompletionUpdate::Clear,
        )
        .await
    }

    pub async fn auto_expire(&self, session_id: i64) -> Result<TransitionOutcome, PlannerError> {
        self.apply(session_id, SessionAction::AutoExpire, CompletionUpdate::Keep)
            .await
    }

    pub async fn reschedule(
        &self,
        session: &StudySession,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<StudySession, PlannerError> {
        if let Err(error) =
            ensure_schedule_editable(session).and_then(|()| validate_schedule(start_time, end_time))
        {
            warn!(session_id = session.id, %error, "schedule edit rejected");
            return Err(error.into());
        }

        let current = self
            .store
            .get_session(session.id)
            .await
            .map_err(|error| PlannerError::from_store(session.id, "reschedule", error))?;
        if !current.status.allows_schedule_edit() {
            warn!(
                session_id = session.id,
                status = current.status.as_str(),
                "schedule edit on a session that has since moved on"
            );
            return Err(PlannerError::stale(
                session.id,
                format!("session is now {}", current.status.as_str()),
            ));
        }

        let updated = self
            .store
            .update_session_schedule(session.id, start_time, end_time)
            .await
            .map_err(|error| match error {
                InfraError::Rejected(reason) => PlannerError::stale(session.id, reason),
                other => PlannerError::from_store(session.id, "reschedule", other),
            })?;

        info!(
            session_id = session.id,
            start = %updated.start_time,
            end = %updated.end_time,
            duration = updated.duration,
            "session rescheduled"
        );
        Ok(updated)
    }

    async fn apply(
        &self,
        session_id: i64,
        action: SessionAction,
        completion: CompletionUpdate,
    ) -> Result<TransitionOutcome, PlannerError> {
        let current = self
            .store
            .get_session(session_id)
            .await
            .map_err(|error| PlannerError::from_store(session_id, action.as_str(), error))?;

        let now = self.now();
        let transition = match plan_transition(&current, action, now) {
            Ok(transition) => transition,
            Err(error) => {
                warn!(session_id, %action, status = %current.status, %error, "transition rejected");
                self.events.emit(PlannerEvent::TransitionRejected {
                    session_id,
                    action,
                    current_status: current.status,
                });
                return Err(error.into());
            }
        };

        let change = StatusChange {
            status: transition.to,
            completion,
        };
        let updated = self
            .store
            .update_session_status(session_id, &change)
            .await
            .map_err(|error| PlannerError::from_store(session_id, action.as_str(), error))?;

        if updated.status != transition.to {
            return Err(PlannerError::stale(
                session_id,
                format!(
                    "store reports {} after {action}, expected {}",
                    updated.status, transition.to
                ),
            ));
        }

        info!(
            session_id,
            %action,
            from = %transition.from,
            to = %transition.to,
            "session transitioned"
        );

        match (transition.to, action) {
            (SessionStatus::Completed, _) => self.events.emit(PlannerEvent::SessionCompleted {
                session: updated.clone(),
            }),
            (SessionStatus::Cancelled, SessionAction::AutoExpire) => {
                self.events.emit(PlannerEvent::SessionAutoExpired {
                    session: updated.clone(),
                })
            }
            _ => {}
        }

        Ok(TransitionOutcome {
            session: updated,
            transition,
        })
    }
}
