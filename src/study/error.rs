//! Error taxonomy for the study engine

use std::fmt;

use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

/// A validation failure on a single input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// One or more field-level validation failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: &str, message: &str) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.to_string(),
                message: message.to_string(),
            }],
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [only] => write!(f, "{}: {}", only.field, only.message),
            errors => write!(f, "{} errors", errors.len()),
        }
    }
}

/// Collects field errors while validating an input
#[derive(Debug, Default)]
pub(crate) struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn into_result(self) -> StudyResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(StudyError::Validation(ValidationError { errors: self.0 }))
        }
    }
}

#[derive(Error, Debug)]
pub enum StudyError {
    /// Missing, or owned by someone else
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(ValidationError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type StudyResult<T> = std::result::Result<T, StudyError>;

impl StudyError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation(ValidationError::single(field, message))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<rusqlite::Error> for StudyError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == ErrorCode::ConstraintViolation
                    && matches!(
                        e.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    ) =>
            {
                Self::AlreadyExists(msg.clone().unwrap_or_else(|| "constraint violation".to_string()))
            }
            _ => Self::Sqlite(err),
        }
    }
}
