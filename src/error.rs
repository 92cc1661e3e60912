use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    /// No session could be acquired from the pool after all retries.
    #[error("Data source unavailable after {attempts} attempts: {message}")]
    Unavailable { attempts: u32, message: String },

    #[error("Invalid preset: {0}")]
    PresetParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Adviser not found: {0}")]
    NotFound(String),
}

/// How a failed request is reported at the outer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The caller asked for something malformed.
    InvalidInput,
    NotFound,
    TemporarilyUnavailable,
    Unexpected,
}

impl FailureOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            FailureOutcome::InvalidInput => 400,
            FailureOutcome::NotFound => 404,
            FailureOutcome::TemporarilyUnavailable => 503,
            FailureOutcome::Unexpected => 500,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FailureOutcome::InvalidInput => "The request parameters are invalid.",
            FailureOutcome::NotFound => "The requested adviser was not found.",
            FailureOutcome::TemporarilyUnavailable => {
                "Database temporarily unavailable. Please try again shortly."
            }
            FailureOutcome::Unexpected => "An unexpected server error occurred. Please try again.",
        }
    }
}

impl Error {
    pub fn outcome(&self) -> FailureOutcome {
        match self {
            Error::Unavailable { .. } => FailureOutcome::TemporarilyUnavailable,
            Error::PresetParse(_) => FailureOutcome::InvalidInput,
            Error::NotFound(_) => FailureOutcome::NotFound,
            _ => FailureOutcome::Unexpected,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
