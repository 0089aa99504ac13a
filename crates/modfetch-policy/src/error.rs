use std::time::Duration;

/// Tagged failure domains. Retryability is a property of the variant, not of
/// a string match against a status code or message.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("authentication rejected by {host} ({status})")]
    AuthRejected { host: String, status: u16 },

    #[error("rate limited{}", retry_after.map(|d| format!(", retry after {}s", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient transport error: {cause}")]
    Transient { cause: String },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("verification failed: {reason}")]
    VerifyFailed { reason: String },

    #[error("disk error: {reason}")]
    Disk { reason: String },

    #[error("fatal configuration error: {reason}")]
    Fatal { reason: String },
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::RateLimited { .. } | EngineError::Transient { .. })
    }

    /// A short, host-specific sentence suitable for a CLI's final summary line.
    pub fn friendly_message(&self, hint: Option<&crate::registry::HostHint>) -> String {
        match self {
            EngineError::AuthRejected { host, status } => match hint {
                Some(hint) => format!(
                    "{host} rejected the request ({status}); set {} {}",
                    hint.token_env_var,
                    hint.gated_hint.unwrap_or_default()
                )
                .trim_end()
                .to_string(),
                None => format!("{host} rejected the request ({status})"),
            },
            EngineError::RateLimited { retry_after } => match retry_after {
                Some(d) => format!("rate limited, retry after {}s", d.as_secs()),
                None => "rate limited".to_string(),
            },
            EngineError::Transient { cause } => format!("transient network error: {cause}"),
            EngineError::IntegrityMismatch { expected, actual } => {
                format!("checksum mismatch: expected {expected}, got {actual}")
            }
            EngineError::VerifyFailed { reason } => format!("verification failed: {reason}"),
            EngineError::Disk { reason } => format!("disk error: {reason}"),
            EngineError::Fatal { reason } => format!("configuration error: {reason}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
