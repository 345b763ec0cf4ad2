use thiserror::Error;

/// Input problems caught before any request goes out
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a media URL")]
    EmptyUrl,
    #[error("Please enter start and end times for trimming (e.g. 00:30, 01:45)")]
    MissingTrimBounds,
    #[error("Trim start and end are the same point")]
    EmptyTrimRange,
}

/// An operation that the session cannot accept in its current state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Another operation is still running")]
    Busy,
    #[error("{action} is not valid while {state}")]
    Invalid {
        action: &'static str,
        state: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Failures talking to the local backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Failed to parse backend response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend answered with `{ "error": ... }`
    #[error("{0}")]
    Reported(String),

    #[error("Backend returned HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {source}")]
    BadUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{key} must be a whole number of seconds, got {value:?}")]
    BadNumber { key: &'static str, value: String },
}
