use crate::application::events::{EventSink, TracingEventSink};
use crate::application::lifecycle_service::SessionLifecycleService;
use crate::application::overdue_sweep::OverdueSweeper;
use crate::application::pomodoro_timer::PomodoroTimer;
use crate::domain::models::StudySession;
use crate::infrastructure::config::PlannerConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::session_store::{RestSessionStore, SessionStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct PlannerContext<S>
where
    S: SessionStore,
{
    config: PlannerConfig,
    store: Arc<S>,
    events: Arc<dyn EventSink>,
    now_provider: NowProvider,
}

impl<S> PlannerContext<S>
where
    S: SessionStore,
{
    pub fn new(config: PlannerConfig, store: Arc<S>) -> Self {
        Self {
            config,
            store,
            events: Arc::new(TracingEventSink),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn lifecycle(&self) -> SessionLifecycleService<S> {
        SessionLifecycleService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.events),
            Arc::clone(&self.now_provider),
        )
    }

    pub fn sweeper(&self) -> OverdueSweeper<S> {
        OverdueSweeper::new(self.lifecycle())
    }
}

impl<S> PlannerContext<S>
where
    S: SessionStore + 'static,
{
    pub fn pomodoro_timer(&self, session: &StudySession) -> PomodoroTimer<S> {
        PomodoroTimer::new(
            session,
            self.config.pomodoro_fallback(),
            Arc::clone(&self.store),
            Arc::clone(&self.events),
        )
    }
}

impl PlannerContext<RestSessionStore> {
    pub fn from_config(config: PlannerConfig) -> Result<Self, InfraError> {
        let store = RestSessionStore::new(&config.store_base_url, config.store_token.clone())?;
        Ok(Self::new(config, Arc::new(store)))
    }
}
