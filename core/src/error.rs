use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error at '{path}': {reason}")]
    Config { path: String, reason: String },

    #[error("KeyError: no {family} registered under '{name}'")]
    UnknownType { family: &'static str, name: String },

    #[error("Unknown particle '{name}'")]
    UnknownParticle { name: String },

    #[error("Rejection sampler gave up after {trials} trials")]
    SamplerExhausted { trials: u64 },

    #[error("No event accepted after {trials} trials")]
    TrialsExhausted { trials: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenError {
    pub fn config(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config { path: path.into(), reason: reason.into() }
    }
}

pub type GenResult<T> = Result<T, GenError>;
