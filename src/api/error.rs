use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the session layer.
///
/// Every variant is a structured outcome with a message and, where one
/// exists, a concrete next step via [`ApiError::hint`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not logged in")]
    Unauthenticated,

    #[error("session expired and re-authentication failed: {0}")]
    ReauthFailed(String),

    #[error("request to '{endpoint}' timed out after {timeout_secs}s")]
    NetworkTimeout { endpoint: String, timeout_secs: u64 },

    #[error("network error calling '{endpoint}' after {attempts} attempt(s): {reason}")]
    NetworkError {
        endpoint: String,
        attempts: u32,
        reason: String,
    },

    #[error("rate limited; try again in {wait_seconds}s")]
    RateLimited { wait_seconds: u64 },

    #[error("{reason}")]
    PreconditionFailed { reason: String, hint: String },

    #[error("{}", server_error_text(.code, .message))]
    ServerError { code: String, message: String },

    #[error("interrupted")]
    Interrupted,

    #[error("credentials: {0}")]
    Credentials(String),

    #[error("endpoint name must not be empty")]
    EmptyEndpoint,

    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn server_error_text(code: &str, message: &str) -> String {
    if code.is_empty() {
        message.to_string()
    } else {
        format!("{message} [{code}]")
    }
}

impl ApiError {
    /// Remediation line shown under the error message.
    pub fn hint(&self) -> Option<String> {
        match self {
            ApiError::Unauthenticated | ApiError::ReauthFailed(_) => {
                Some("Hint: sm login [cred_file]".into())
            }
            ApiError::NetworkTimeout { .. } | ApiError::NetworkError { .. } => {
                Some("Check your connection and retry; raise --timeout for slow links".into())
            }
            ApiError::RateLimited { wait_seconds } => {
                Some(format!("Wait {wait_seconds}s before the next action"))
            }
            ApiError::PreconditionFailed { hint, .. } => Some(hint.clone()),
            ApiError::Credentials(_) => {
                Some("Expected 'Username: <name>' and 'Password: <secret>' lines".into())
            }
            _ => None,
        }
    }

    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ApiError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
