pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::context::{NowProvider, PlannerContext};
pub use application::error::PlannerError;
pub use application::events::{ChannelEventSink, EventSink, NoopEventSink, PlannerEvent, TracingEventSink};
pub use application::lifecycle_service::{SessionLifecycleService, TransitionOutcome};
pub use application::overdue_sweep::{OverdueSweeper, SweepHandle, SweepReport};
pub use application::pomodoro_timer::PomodoroTimer;
pub use domain::lifecycle::{PomodoroEffect, SessionAction, Transition, plan_transition};
pub use domain::models::{CompletionMetadata, SessionStatus, SessionType, StudySession};
pub use domain::pomodoro::{PomodoroConfig, PomodoroEngine, PomodoroPhase};
pub use infrastructure::session_store::{InMemorySessionStore, RestSessionStore, SessionStore};
