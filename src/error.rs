use std::time::Duration;

/// Failure reported by the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// HTTP status of the response that reported the failure. For a failed
    /// long-running operation this is the status poll's own status, usually 200.
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(target: &str) -> Self {
        Self::new(
            404,
            "ResourceNotFound",
            format!("The resource '{}' was not found.", target),
        )
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)
    }
}

#[derive(Debug)]
pub enum AzError {
    /// No credential in the chain produced a usable token.
    AuthenticationUnavailable(String),
    /// An operation ran before `connect` populated the session.
    PreconditionMissing(&'static str),
    Backend(BackendError),
    /// The execution-detail fetch outside the management client failed.
    ExternalCallFailed {
        url: String,
        status: Option<u16>,
        message: String,
    },
    TimedOut {
        operation: String,
        after: Duration,
    },
    Unexpected(String),
    Operation {
        operation: &'static str,
        target: String,
        source: Box<AzError>,
    },
}

impl AzError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        AzError::Unexpected(message.into())
    }

    /// Wrap with the operation name and target identifier.
    pub fn in_operation(self, operation: &'static str, target: impl Into<String>) -> Self {
        match self {
            // Keep the outermost context only.
            AzError::Operation { .. } => self,
            other => AzError::Operation {
                operation,
                target: target.into(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any operation context stripped.
    pub fn kind(&self) -> &AzError {
        match self {
            AzError::Operation { source, .. } => source.kind(),
            other => other,
        }
    }

    /// Fatal errors stop the invocation instead of being reported and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), AzError::PreconditionMissing(_))
    }

    pub fn backend(&self) -> Option<&BackendError> {
        match self.kind() {
            AzError::Backend(e) => Some(e),
            _ => None,
        }
    }

    /// Short stable identifier for the error category.
    pub fn category(&self) -> &'static str {
        match self.kind() {
            AzError::AuthenticationUnavailable(_) => "AuthenticationUnavailable",
            AzError::PreconditionMissing(_) => "PreconditionMissing",
            AzError::Backend(_) => "BackendRequestError",
            AzError::ExternalCallFailed { .. } => "ExternalCallFailed",
            AzError::TimedOut { .. } => "TimedOut",
            AzError::Unexpected(_) | AzError::Operation { .. } => "UnexpectedError",
        }
    }
}

impl std::fmt::Display for AzError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AzError::AuthenticationUnavailable(e) => {
                write!(f, "authentication unavailable: {}", e)
            }
            AzError::PreconditionMissing(what) => write!(f, "precondition missing: {}", what),
            AzError::Backend(e) => write!(f, "backend request failed: {}", e),
            AzError::ExternalCallFailed {
                url,
                status: Some(status),
                message,
            } => write!(f, "request to {} failed with status {}: {}", url, status, message),
            AzError::ExternalCallFailed {
                url,
                status: None,
                message,
            } => write!(f, "request to {} failed: {}", url, message),
            AzError::TimedOut { operation, after } => write!(
                f,
                "{} did not reach a terminal state within {}s",
                operation,
                after.as_secs()
            ),
            AzError::Unexpected(e) => write!(f, "unexpected error: {}", e),
            AzError::Operation {
                operation,
                target,
                source,
            } => write!(f, "{} '{}': {}", operation, target, source),
        }
    }
}

impl std::error::Error for AzError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AzError::Operation { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<BackendError> for AzError {
    fn from(e: BackendError) -> Self {
        AzError::Backend(e)
    }
}

impl From<serde_json::Error> for AzError {
    fn from(e: serde_json::Error) -> Self {
        AzError::Unexpected(format!("malformed document: {}", e))
    }
}

pub type Result<T, E = AzError> = std::result::Result<T, E>;
