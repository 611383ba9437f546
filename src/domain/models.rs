use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Planned,
    InProgress,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn allows_schedule_edit(self) -> bool {
        matches!(self, Self::Planned | Self::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Study,
    Break,
    Pomodoro,
    Review,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::Break => "break",
            Self::Pomodoro => "pomodoro",
            Self::Review => "review",
        }
    }

    pub fn allows_pause(self) -> bool {
        matches!(
            self,
            Self::Study | Self::Break | Self::Pomodoro | Self::Review
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum SessionCategory {
    Course {
        #[serde(rename = "courseId")]
        course_id: i64,
        #[serde(rename = "topicId", default, skip_serializing_if = "Option::is_none")]
        topic_id: Option<i64>,
    },
    Break,
    Custom {
        #[serde(rename = "taskName")]
        task_name: String,
    },
}

impl SessionCategory {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Course { course_id, topic_id } => {
                if *course_id <= 0 {
                    return Err("session.courseId must be > 0".to_string());
                }
                if matches!(topic_id, Some(topic) if *topic <= 0) {
                    return Err("session.topicId must be > 0".to_string());
                }
                Ok(())
            }
            Self::Break => Ok(()),
            Self::Custom { task_name } => validate_non_empty(task_name, "session.taskName"),
        }
    }
}

/// Pomodoro settings as they arrive from the session store. Any field may be
/// missing or nonsensical; `PomodoroConfig::resolve` turns them into a usable config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PomodoroSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_break: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_break: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles_before_long_break: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_cycle: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: i64,
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: i64,
    pub session_type: SessionType,
    pub status: SessionStatus,
    #[serde(flatten)]
    pub category: SessionCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<i64>,
    #[serde(flatten)]
    pub pomodoro: PomodoroSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub productivity: Option<u8>,
}

impl StudySession {
    pub fn validate(&self) -> Result<(), String> {
        if self.end_time <= self.start_time {
            return Err("session.endTime must be after session.startTime".to_string());
        }
        let expected = duration_minutes(self.start_time, self.end_time);
        if self.duration != expected {
            return Err(format!(
                "session.duration must equal endTime - startTime ({expected} minutes)"
            ));
        }
        self.category.validate()?;
        validate_productivity(self.productivity)?;
        Ok(())
    }

    pub fn recompute_duration(&mut self) {
        self.duration = duration_minutes(self.start_time, self.end_time);
    }

    pub fn is_pomodoro(&self) -> bool {
        self.session_type == SessionType::Pomodoro
    }

    pub fn course_id(&self) -> Option<i64> {
        match &self.category {
            SessionCategory::Course { course_id, .. } => Some(*course_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionMetadata {
    pub notes: Option<String>,
    pub productivity: Option<u8>,
}

impl CompletionMetadata {
    pub fn new(notes: Option<String>, productivity: Option<u8>) -> Self {
        Self {
            notes: notes
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
            productivity,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_productivity(self.productivity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionUpdate {
    Keep,
    Record(CompletionMetadata),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: SessionStatus,
    pub completion: CompletionUpdate,
}

impl StatusChange {
    pub fn to(status: SessionStatus) -> Self {
        Self {
            status,
            completion: CompletionUpdate::Keep,
        }
    }
}

pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let seconds = (end - start).num_seconds();
    (seconds as f64 / 60.0).round() as i64
}

fn validate_productivity(productivity: Option<u8>) -> Result<(), String> {
    match productivity {
        Some(value) if !(1..=5).contains(&value) => {
            Err("session.productivity must be between 1 and 5".to_string())
        }
        _ => Ok(()),
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
