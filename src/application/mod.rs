pub mod bootstrap;
pub mod context;
pub mod error;
pub mod events;
pub mod lifecycle_service;
pub mod overdue_sweep;
pub mod pomodoro_timer;
