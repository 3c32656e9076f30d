/// Failures observed while opening or reading one streaming response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The request could not be sent, or reading the body failed.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The backend answered with a non-success HTTP status.
    #[error("backend returned status {status}: {body}")]
    Http { status: u16, body: String },
    /// The response did not match the expected wire contract.
    #[error("protocol error: {message}")]
    Protocol { message: String },
    /// The caller cancelled the session.
    #[error("stream cancelled")]
    Cancelled,
}

impl StreamError {
    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Client-side HTTP errors are final except for request timeouts (408) and
    /// rate limiting (429). Cancellation is never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Protocol { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Cancelled => false,
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid request input, rejected before anything is sent.
    #[error("validation error: {0}")]
    Validation(String),
    /// The request or its stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// Every retry attempt failed; carries the last cause.
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: u32,
        last_error: Box<ClientError>,
    },
}

impl ClientError {
    /// Whether the retry wrapper may try again after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Stream(err) => err.is_retryable(),
            Self::Config(_) | Self::Validation(_) | Self::RetryExhausted { .. } => false,
        }
    }

    /// Returns true when the error came from a caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Stream(StreamError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_retry_and_client_errors_do_not() {
        assert!(StreamError::http(503, "busy").is_retryable());
        assert!(StreamError::http(429, "slow down").is_retryable());
        assert!(!StreamError::http(401, "bad token").is_retryable());
        assert!(!StreamError::Cancelled.is_retryable());
        assert!(StreamError::transport("reset").is_retryable());
    }

    #[test]
    fn validation_is_final_and_exhaustion_keeps_cause() {
        assert!(!ClientError::Validation("empty".into()).is_retryable());
        let err = ClientError::RetryExhausted {
            attempts: 3,
            last_error: Box::new(StreamError::transport("reset").into()),
        };
        assert_eq!(
            err.to_string(),
            "gave up after 3 attempts: transport error: reset"
        );
    }
}
