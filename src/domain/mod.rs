pub mod error;
pub mod lifecycle;
pub mod models;
pub mod pomodoro;
