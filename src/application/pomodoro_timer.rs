use crate::application::events::{EventSink, PlannerEvent};
use crate::domain::lifecycle::PomodoroEffect;
use crate::domain::models::StudySession;
use crate::domain::pomodoro::{PhaseChange, PomodoroConfig, PomodoroEngine, PomodoroSnapshot};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::session_store::SessionStore;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, warn};

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// The ticker and the control methods share one lock, so once `pause` or
/// `stop` returns no further tick is applied. Must be used inside a Tokio
/// runtime. Dropping the timer aborts the ticker.
pub struct PomodoroTimer<S>
where
    S: SessionStore + 'static,
{
    session_id: i64,
    engine: Arc<Mutex<PomodoroEngine>>,
    store: Arc<S>,
    events: Arc<dyn EventSink>,
    tick_interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl<S> PomodoroTimer<S>
where
    S: SessionStore + 'static,
{
    pub fn new(
        session: &StudySession,
        fallback: PomodoroConfig,
        store: Arc<S>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            session_id: session.id,
            engine: Arc::new(Mutex::new(PomodoroEngine::for_session_with_fallback(
                session, fallback,
            ))),
            store,
            events,
            tick_interval: DEFAULT_TICK_INTERVAL,
            ticker: Mutex::new(None),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(MIN_TICK_INTERVAL);
        self
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn begin(&self) -> Result<bool, InfraError> {
        let started = {
            let mut engine = self.lock_engine()?;
            engine.reset();
            engine.resume() || engine.is_running()
        };
        if started {
            self.ensure_ticker()?;
        }
        Ok(started)
    }

    /// Continues from the retained phase and remaining time. Also attaches the
    /// ticker to an engine that was created running.
    pub fn resume(&self) -> Result<bool, InfraError> {
        let running = {
            let mut engine = self.lock_engine()?;
            engine.resume();
            engine.is_running()
        };
        if running {
            self.ensure_ticker()?;
        }
        Ok(running)
    }

    pub fn pause(&self) -> Result<bool, InfraError> {
        Ok(self.lock_engine()?.pause())
    }

    pub fn stop(&self) -> Result<(), InfraError> {
        self.lock_engine()?.stop();
        self.abort_ticker()
    }

    pub fn reset(&self) -> Result<(), InfraError> {
        self.lock_engine()?.reset();
        Ok(())
    }

    pub fn snapshot(&self) -> Result<PomodoroSnapshot, InfraError> {
        Ok(self.lock_engine()?.snapshot())
    }

    pub fn completed_work_intervals(&self) -> Result<u32, InfraError> {
        Ok(self.lock_engine()?.completed_work_intervals())
    }

    pub fn apply_effect(&self, effect: PomodoroEffect) -> Result<(), InfraError> {
        match effect {
            PomodoroEffect::None => Ok(()),
            PomodoroEffect::Begin => self.begin().map(|_| ()),
            PomodoroEffect::Resume => self.resume().map(|_| ()),
            PomodoroEffect::Pause => self.pause().map(|_| ()),
            PomodoroEffect::Stop => self.stop(),
        }
    }

    fn lock_engine(&self) -> Result<MutexGuard<'_, PomodoroEngine>, InfraError> {
        self.engine.lock().map_err(|error| {
            InfraError::LockPoisoned(format!("pomodoro engine {}: {error}", self.session_id))
        })
    }

    fn lock_ticker(&self) -> Result<MutexGuard<'_, Option<JoinHandle<()>>>, InfraError> {
        self.ticker.lock().map_err(|error| {
            InfraError::LockPoisoned(format!("pomodoro ticker {}: {error}", self.session_id))
        })
    }

    fn abort_ticker(&self) -> Result<(), InfraError> {
        if let Some(handle) = self.lock_ticker()?.take() {
            handle.abort();
        }
        Ok(())
    }

    fn ensure_ticker(&self) -> Result<(), InfraError> {
        let mut ticker = self.lock_ticker()?;
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let session_id = self.session_id;
        let engine = Arc::clone(&self.engine);
        let store = Arc::clone(&self.store);
        let events = Arc::clone(&self.events);
        let tick_interval = self.tick_interval;

        *ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            // The first tick of an interval completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;

                let changes = {
                    let mut guard = match engine.lock() {
                        Ok(guard) => guard,
                        Err(error) => {
                            error!(session_id, %error, "pomodoro engine lock poisoned; ticker exiting");
                            break;
                        }
                    };
                    if guard.is_stopped() {
                        break;
                    }
                    guard.tick(1)
                };

                for change in changes {
                    report_phase_change(session_id, change, &store, events.as_ref());
                }
            }
        }));
        Ok(())
    }
}

fn report_phase_change<S>(session_id: i64, change: PhaseChange, store: &Arc<S>, events: &dyn EventSink)
where
    S: SessionStore + 'static,
{
    events.emit(PlannerEvent::PhaseComplete {
        session_id,
        completed: change.completed,
        phase: change.phase,
        cycle: change.cycle,
    });

    let store = Arc::clone(store);
    tokio::spawn(async move {
        if let Err(error) = store.update_session_progress(session_id, change.cycle).await {
            warn!(session_id, cycle = change.cycle, %error, "failed to persist pomodoro progress");
        }
    });
}

impl<S> Drop for PomodoroTimer<S>
where
    S: SessionStore + 'static,
{
    fn drop(&mut self) {
        if let Ok(mut ticker) = self.ticker.lock() {
            if let Some(handle) = ticker.take() {
                handle.abort();
            }
        }
    }
}
