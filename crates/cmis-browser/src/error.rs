use thiserror::Error;

pub type CmisResult<T> = Result<T, CmisError>;

/// Exception name the browser binding uses for missing objects.
pub const OBJECT_NOT_FOUND_EXCEPTION: &str = "objectNotFound";

#[derive(Debug, Error)]
pub enum CmisError {
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),
    #[error("invalid value {value:?} for {parameter}: expected {expected}")]
    InvalidParameterValue {
        parameter: String,
        value: String,
        expected: String,
    },
    #[error("unsupported base type id: {0}")]
    UnsupportedType(String),
    #[error("{}", request_error_message(.status, .exception, .message))]
    Request {
        status: u16,
        exception: Option<String>,
        message: String,
    },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("object has not been created yet: {0}")]
    DetachedObject(String),
    #[error("session closed")]
    SessionClosed,
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl CmisError {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidParameterValue {
            parameter: parameter.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Server supplied exception name, when the error came from a CMIS response.
    pub fn exception(&self) -> Option<&str> {
        match self {
            Self::Request { exception, .. } => exception.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::RepositoryNotFound(_) => true,
            Self::Request {
                status, exception, ..
            } => *status == 404 || exception.as_deref() == Some(OBJECT_NOT_FOUND_EXCEPTION),
            _ => false,
        }
    }
}

fn request_error_message(status: &u16, exception: &Option<String>, message: &str) -> String {
    match exception {
        Some(exception) => format!("cmis request failed ({status}): {exception} -- {message}"),
        None => format!("cmis request failed ({status}): {message}"),
    }
}
