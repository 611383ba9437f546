use crate::application::error::PlannerError;
use crate::application::lifecycle_service::SessionLifecycleService;
use crate::domain::lifecycle::is_overdue_and_unresolved;
use crate::domain::models::SessionStatus;
use crate::infrastructure::session_store::SessionStore;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: Vec<i64>,
    /// Overdue sessions that were never started. Reported, left untouched.
    pub missed: Vec<i64>,
    /// Overdue sessions whose state changed before the sweep reached them.
    pub skipped: Vec<i64>,
    pub failed: Vec<(i64, String)>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty()
            && self.missed.is_empty()
            && self.skipped.is_empty()
            && self.failed.is_empty()
    }

    fn merge(&mut self, other: SweepReport) {
        self.expired.extend(other.expired);
        self.missed.extend(other.missed);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}

pub struct OverdueSweeper<S>
where
    S: SessionStore,
{
    lifecycle: SessionLifecycleService<S>,
}

impl<S> Clone for OverdueSweeper<S>
where
    S: SessionStore,
{
    fn clone(&self) -> Self {
        Self {
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<S> OverdueSweeper<S>
where
    S: SessionStore,
{
    pub fn new(lifecycle: SessionLifecycleService<S>) -> Self {
        Self { lifecycle }
    }

    pub async fn sweep_once(
        &self,
        user_id: i64,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<SweepReport, PlannerError> {
        let sessions = self
            .lifecycle
            .store()
            .list_sessions_in_range(user_id, range_start, range_end)
            .await?;
        let now = self.lifecycle.now();
        let mut report = SweepReport::default();

        for session in sessions
            .iter()
            .filter(|session| is_overdue_and_unresolved(session, now))
        {
            if session.status == SessionStatus::Planned {
                report.missed.push(session.id);
                continue;
            }

            match self.lifecycle.auto_expire(session.id).await {
                Ok(_) => report.expired.push(session.id),
                Err(error)
                    if error.is_transition_rejected()
                        || matches!(error, PlannerError::StaleSessionState { .. }) =>
                {
                    debug!(session_id = session.id, %error, "overdue session changed before sweep");
                    report.skipped.push(session.id);
                }
                Err(error) => {
                    error!(session_id = session.id, %error, "failed to auto-expire session");
                    report.failed.push((session.id, error.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Sweeps everything the user has scheduled up to now, however old.
    pub async fn sweep_overdue(&self, user_id: i64) -> Result<SweepReport, PlannerError> {
        let now = self.lifecycle.now();
        self.sweep_once(user_id, DateTime::<Utc>::UNIX_EPOCH, now).await
    }

    async fn sweep_users(&self, user_ids: &[i64]) -> SweepReport {
        let mut report = SweepReport::default();
        for &user_id in user_ids {
            match self.sweep_overdue(user_id).await {
                Ok(user_report) => report.merge(user_report),
                Err(error) => warn!(user_id, %error, "overdue sweep could not list sessions"),
            }
        }
        report
    }
}

impl<S> OverdueSweeper<S>
where
    S: SessionStore + 'static,
{
    /// Runs the sweep for every user on a fixed interval until the handle is stopped.
    /// The first sweep runs immediately.
    pub fn spawn(self, period: Duration, user_ids: Vec<i64>) -> SweepHandle {
        let period = period.max(MIN_SWEEP_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = self.sweep_users(&user_ids).await;
                if report.is_empty() {
                    debug!(users = user_ids.len(), "overdue sweep found nothing");
                } else {
                    info!(
                        expired = report.expired.len(),
                        missed = report.missed.len(),
                        skipped = report.skipped.len(),
                        failed = report.failed.len(),
                        "overdue sweep finished"
                    );
                }
            }
        });
        info!(interval_secs = period.as_secs_f64(), "overdue sweep started");
        SweepHandle {
            handle: Some(handle),
        }
    }
}

#[derive(Debug)]
pub struct SweepHandle {
    handle: Option<JoinHandle<()>>,
}

impl SweepHandle {
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            info!("overdue sweep stopped");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::{ChannelEventSink, PlannerEvent};
    use crate::application::lifecycle_service::test_support::CountingStore;
    use crate::domain::models::StudySession;
    use crate::domain::models::fixtures::{fixed_time, sample_session};
    use crate::infrastructure::logging::init_test_logging;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn now() -> DateTime<Utc> {
        fixed_time("2026-02-16T12:00:00Z")
    }

    fn session(id: i64, status: SessionStatus, minutes_past_end: i64) -> StudySession {
        let end_time = now() - chrono::Duration::minutes(minutes_past_end);
        StudySession {
            id,
            status,
            start_time: end_time - chrono::Duration::minutes(60),
            end_time,
            ..sample_session()
        }
    }

    fn sweeper_with(
        sessions: Vec<StudySession>,
    ) -> (
        OverdueSweeper<CountingStore>,
        Arc<CountingStore>,
        UnboundedReceiver<PlannerEvent>,
    ) {
        let store = Arc::new(CountingStore::with_sessions(sessions));
        let (sink, receiver) = ChannelEventSink::channel();
        let lifecycle =
            SessionLifecycleService::new(Arc::clone(&store), Arc::new(sink), Arc::new(now));
        (OverdueSweeper::new(lifecycle), store, receiver)
    }

    #[tokio::test]
    async fn sweep_cancels_session_left_running_past_end_time() {
        let (sweeper, store, mut events) =
            sweeper_with(vec![session(1, SessionStatus::InProgress, 5)]);

        let report = sweeper.sweep_overdue(7).await.expect("sweep");

        assert_eq!(report.expired, vec![1]);
        let reloaded = store.inner.get_session(1).await.expect("reload");
        assert_eq!(reloaded.status, SessionStatus::Cancelled);
        assert!(matches!(
            events.try_recv(),
            Ok(PlannerEvent::SessionAutoExpired { session }) if session.id == 1
        ));
    }

    #[tokio::test]
    async fn sweep_reaches_sessions_that_ended_long_ago() {
        let (sweeper, store, _events) = sweeper_with(vec![
            session(1, SessionStatus::InProgress, 8 * 24 * 60),
            session(2, SessionStatus::Paused, 400 * 24 * 60),
        ]);

        let report = sweeper.sweep_overdue(7).await.expect("sweep");

        assert_eq!(report.expired, vec![2, 1]);
        for id in [1, 2] {
            assert_eq!(
                store.inner.get_session(id).await.expect("reload").status,
                SessionStatus::Cancelled
            );
        }
    }

    #[tokio::test]
    async fn sweep_reports_missed_planned_sessions_without_writing() {
        let (sweeper, store, _events) = sweeper_with(vec![
            session(1, SessionStatus::Planned, 30),
            session(2, SessionStatus::Paused, 30),
            session(3, SessionStatus::Completed, 30),
            session(4, SessionStatus::InProgress, -10),
        ]);

        let report = sweeper.sweep_overdue(7).await.expect("sweep");

        assert_eq!(report.missed, vec![1]);
        assert_eq!(report.expired, vec![2]);
        assert!(report.failed.is_empty());
        assert_eq!(
            store.inner.get_session(1).await.expect("reload").status,
            SessionStatus::Planned
        );
        assert_eq!(
            store.inner.get_session(4).await.expect("reload").status,
            SessionStatus::InProgress
        );
    }

    #[tokio::test]
    async fn sweep_only_touches_requested_user() {
        let mut other_user = session(2, SessionStatus::InProgress, 5);
        other_user.user_id = 99;
        let (sweeper, store, _events) =
            sweeper_with(vec![session(1, SessionStatus::InProgress, 5), other_user]);

        let report = sweeper.sweep_overdue(7).await.expect("sweep");

        assert_eq!(report.expired, vec![1]);
        assert_eq!(
            store.inner.get_session(2).await.expect("reload").status,
            SessionStatus::InProgress
        );
    }

    #[tokio::test]
    async fn sweep_records_sessions_that_do_not_settle_and_continues() {
        let (sweeper, store, _events) = sweeper_with(vec![
            session(1, SessionStatus::InProgress, 5),
            session(2, SessionStatus::InProgress, 5),
        ]);
        store
            .ignore_status_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let report = sweeper.sweep_overdue(7).await.expect("sweep");

        assert!(report.expired.is_empty());
        assert_eq!(report.skipped, vec![1, 2]);
    }

    #[tokio::test]
    async fn spawned_sweep_runs_until_stopped() {
        init_test_logging();
        let (sweeper, store, _events) =
            sweeper_with(vec![session(1, SessionStatus::InProgress, 5)]);

        let handle = sweeper.spawn(Duration::from_millis(10), vec![7]);

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let status = store.inner.get_session(1).await.expect("reload").status;
                if status == SessionStatus::Cancelled {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sweep should cancel the overdue session");

        assert!(!handle.is_finished());
        handle.stop().await;

        store
            .inner
            .insert(session(2, SessionStatus::InProgress, 5))
            .expect("insert");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            store.inner.get_session(2).await.expect("reload").status,
            SessionStatus::InProgress
        );
    }

    #[tokio::test]
    async fn zero_sweep_interval_is_clamped() {
        let (sweeper, store, _events) =
            sweeper_with(vec![session(1, SessionStatus::InProgress, 5)]);

        let handle = sweeper.spawn(Duration::ZERO, vec![7]);

        tokio::time::timeout(Duration::from_secs(2), async {
            while store.inner.get_session(1).await.expect("reload").status
                != SessionStatus::Cancelled
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sweep should run");
        assert!(!handle.is_finished());
        handle.stop().await;
    }
}
