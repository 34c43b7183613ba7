use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error at record {index}, field {field}: {message}")]
    Validation {
        index: usize,
        field: String,
        message: String,
    },

    #[error("malformed input at record {index}, field {field}: {message}")]
    MalformedInput {
        index: usize,
        field: String,
        message: String,
    },

    #[error("id collision: {0}")]
    Collision(String),

    #[error("io error: {0}")]
    Io(String),
}

impl ReplayError {
    pub fn malformed(index: usize, field: &str, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            index,
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Record index and field name for errors that point at a specific input value.
    pub fn location(&self) -> Option<(usize, &str)> {
        match self {
            Self::Validation { index, field, .. } | Self::MalformedInput { index, field, .. } => {
                Some((*index, field.as_str()))
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReplayError>;
