use crate::domain::models::{
    CompletionUpdate, StatusChange, StudySession, duration_minutes,
};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use url::Url;

const SESSIONS_RESOURCE: &str = "study-sessions";

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, id: i64) -> Result<StudySession, InfraError>;

    async fn update_session_status(
        &self,
        id: i64,
        change: &StatusChange,
    ) -> Result<StudySession, InfraError>;

    async fn update_session_schedule(
        &self,
        id: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<StudySession, InfraError>;

    async fn list_sessions_in_range(
        &self,
        user_id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Vec<StudySession>, InfraError>;

    async fn update_session_progress(
        &self,
        id: i64,
        current_cycle: u32,
    ) -> Result<StudySession, InfraError>;
}

#[derive(Debug, Clone)]
pub struct RestSessionStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl RestSessionStore {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, InfraError> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(InfraError::InvalidConfig(
                "storeBaseUrl must not be empty".to_string(),
            ));
        }
        let mut base_url = Url::parse(trimmed).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid storeBaseUrl '{trimmed}': {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(format!(
                "storeBaseUrl cannot be a base: {trimmed}"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            token: token
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
        })
    }

    fn sessions_endpoint(&self) -> Result<Url, InfraError> {
        self.base_url
            .join(SESSIONS_RESOURCE)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid sessions url: {error}")))
    }

    fn session_endpoint(&self, id: i64, action: Option<&str>) -> Result<Url, InfraError> {
        let mut url = self.sessions_endpoint()?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("sessions url cannot be a base".to_string())
            })?;
            segments.push(&id.to_string());
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        id: Option<i64>,
        context: &str,
    ) -> Result<String, InfraError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("{context}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Network(format!("{context}: failed reading body: {error}")))?;

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(InfraError::NotFound(id));
            }
        }
        if !status.is_success() {
            return Err(InfraError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn parse_session(body: &str) -> Result<StudySession, InfraError> {
        serde_json::from_str(body).map_err(InfraError::from)
    }
}

pub(crate) fn status_change_body(change: &StatusChange) -> serde_json::Value {
    let mut body = serde_json::json!({ "status": change.status });
    if let Some(object) = body.as_object_mut() {
        match &change.completion {
            CompletionUpdate::Keep => {}
            CompletionUpdate::Record(metadata) => {
                object.insert("notes".to_string(), serde_json::json!(metadata.notes));
                object.insert(
                    "productivity".to_string(),
                    serde_json::json!(metadata.productivity),
                );
            }
            CompletionUpdate::Clear => {
                object.insert("notes".to_string(), serde_json::Value::Null);
                object.insert("productivity".to_string(), serde_json::Value::Null);
            }
        }
    }
    body
}

#[async_trait]
impl SessionStore for RestSessionStore {
    async fn get_session(&self, id: i64) -> Result<StudySession, InfraError> {
        let url = self.session_endpoint(id, None)?;
        let body = self
            .send(self.client.get(url), Some(id), "fetching session")
            .await?;
        Self::parse_session(&body)
    }

    async fn update_session_status(
        &self,
        id: i64,
        change: &StatusChange,
    ) -> Result<StudySession, InfraError> {
        let url = self.session_endpoint(id, Some("status"))?;
        let body = self
            .send(
                self.client.patch(url).json(&status_change_body(change)),
                Some(id),
                "updating session status",
            )
            .await?;
        Self::parse_session(&body)
    }

    async fn update_session_schedule(
        &self,
        id: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<StudySession, InfraError> {
        let url = self.session_endpoint(id, Some("schedule"))?;
        let payload = serde_json::json!({
            "startTime": start_time,
            "endTime": end_time,
            "duration": duration_minutes(start_time, end_time),
        });
        let body = self
            .send(
                self.client.patch(url).json(&payload),
                Some(id),
                "updating session schedule",
            )
            .await?;
        Self::parse_session(&body)
    }

    async fn list_sessions_in_range(
        &self,
        user_id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Vec<StudySession>, InfraError> {
        let url = self.sessions_endpoint()?;
        let request = self.client.get(url).query(&[
            ("userId", user_id.to_string()),
            ("startDate", start_date.to_rfc3339()),
            ("endDate", end_date.to_rfc3339()),
        ]);
        let body = self.send(request, None, "listing sessions").await?;
        serde_json::from_str(&body).map_err(InfraError::from)
    }

    async fn update_session_progress(
        &self,
        id: i64,
        current_cycle: u32,
    ) -> Result<StudySession, InfraError> {
        let url = self.session_endpoint(id, Some("progress"))?;
        let payload = serde_json::json!({ "currentCycle": current_cycle });
        let body = self
            .send(
                self.client.patch(url).json(&payload),
                Some(id),
                "updating session progress",
            )
            .await?;
        Self::parse_session(&body)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<i64, StudySession>>,
}

impl InMemorySessionStore {
    pub fn with_sessions(sessions: impl IntoIterator<Item = StudySession>) -> Self {
        Self {
            sessions: Mutex::new(
                sessions
                    .into_iter()
                    .map(|session| (session.id, session))
                    .collect(),
            ),
        }
    }

    pub fn insert(&self, session: StudySession) -> Result<(), InfraError> {
        session.validate().map_err(InfraError::Rejected)?;
        self.lock()?.insert(session.id, session);
        Ok(())
    }

    pub fn remove(&self, id: i64) -> Result<bool, InfraError> {
        Ok(self.lock()?.remove(&id).is_some())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<i64, StudySession>>, InfraError> {
        self.sessions
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("session store: {error}")))
    }

    fn modify<F>(&self, id: i64, apply: F) -> Result<StudySession, InfraError>
    where
        F: FnOnce(&mut StudySession) -> Result<(), InfraError>,
    {
        let mut sessions = self.lock()?;
        let session = sessions.get_mut(&id).ok_or(InfraError::NotFound(id))?;
        let mut updated = session.clone();
        apply(&mut updated)?;
        *session = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_session(&self, id: i64) -> Result<StudySession, InfraError> {
        self.lock()?.get(&id).cloned().ok_or(InfraError::NotFound(id))
    }

    async fn update_session_status(
        &self,
        id: i64,
        change: &StatusChange,
    ) -> Result<StudySession, InfraError> {
        self.modify(id, |session| {
            session.status = change.status;
            match &change.completion {
                CompletionUpdate::Keep => {}
                CompletionUpdate::Record(metadata) => {
                    session.notes = metadata.notes.clone();
                    session.productivity = metadata.productivity;
                }
                CompletionUpdate::Clear => {
                    session.notes = None;
                    session.productivity = None;
                }
            }
            Ok(())
        })
    }

    async fn update_session_schedule(
        &self,
        id: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<StudySession, InfraError> {
        if end_time <= start_time {
            return Err(InfraError::Rejected(
                "endTime must be after startTime".to_string(),
            ));
        }
        self.modify(id, |session| {
            if !session.status.allows_schedule_edit() {
                return Err(InfraError::Rejected(format!(
                    "cannot reschedule a {} session",
                    session.status.as_str()
                )));
            }
            session.start_time = start_time;
            session.end_time = end_time;
            session.recompute_duration();
            Ok(())
        })
    }

    async fn list_sessions_in_range(
        &self,
        user_id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Vec<StudySession>, InfraError> {
        let sessions = self.lock()?;
        let mut matching = sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .filter(|session| session.start_time < end_date && session.end_time > start_date)
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| {
            left.start_time
                .cmp(&right.start_time)
                .then(left.id.cmp(&right.id))
        });
        Ok(matching)
    }

    async fn update_session_progress(
        &self,
        id: i64,
        current_cycle: u32,
    ) -> Result<StudySession, InfraError> {
        self.modify(id, |session| {
            session.pomodoro.current_cycle = Some(i64::from(current_cycle));
            Ok(())
        })
    }
}
