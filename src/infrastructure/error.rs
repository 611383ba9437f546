use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("session not found: {0}")]
    NotFound(i64),
    #[error("session store error: http {status}; body={body}")]
    Http { status: u16, body: String },
    #[error("session store rejected update: {0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}
