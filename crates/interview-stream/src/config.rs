use std::fmt;
use std::time::Duration;

use crate::errors::ClientError;

/// Backend host used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8010";

/// Configuration for the interview backend client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the backend, without a trailing path.
    pub base_url: String,
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Longest silence tolerated between reads on streaming endpoints. The
    /// stream as a whole is not time-limited.
    pub timeout: Duration,
    /// Total time allowed for a resume upload, analysis stream included.
    pub upload_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    /// Creates a config with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
            upload_timeout: Duration::from_secs(60),
        }
    }

    /// Overrides the backend base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the idle read timeout for streaming requests.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the upload request timeout.
    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        let url = reqwest::Url::parse(self.base_url.trim())
            .map_err(|e| ClientError::Config(format!("invalid base_url {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "base_url must use http or https, got {:?}",
                url.scheme()
            )));
        }
        if self.connect_timeout.is_zero() || self.timeout.is_zero() || self.upload_timeout.is_zero()
        {
            return Err(ClientError::Config("timeouts must be greater than 0".into()));
        }
        Ok(())
    }

    pub(crate) fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim().trim_end_matches('/'), path)
    }
}

/// Credentials passed explicitly with every call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    token: Option<String>,
}

impl Credentials {
    /// Bearer-token credentials. A blank token is treated as anonymous.
    pub fn bearer(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.trim().is_empty()).then_some(token),
        }
    }

    /// No `Authorization` header.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether a token is present.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_some() { "<redacted>" } else { "<none>" };
        f.debug_struct("Credentials").field("token", &token).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_without_double_slash() {
        let config = ClientConfig::new("http://localhost:8010/");
        assert_eq!(
            config.endpoint_url("/knowlage_chat/"),
            "http://localhost:8010/knowlage_chat/"
        );
    }

    #[test]
    fn validate_rejects_bad_urls_and_zero_timeouts() {
        assert!(ClientConfig::default().validate().is_ok());
        assert!(matches!(
            ClientConfig::new("localhost:8010").validate(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::new("ftp://example.com").validate(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::default().timeout(Duration::ZERO).validate(),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn credentials_debug_hides_token_and_blank_is_anonymous() {
        let creds = Credentials::bearer("secret-token");
        assert!(creds.is_authenticated());
        assert!(!format!("{creds:?}").contains("secret-token"));
        assert!(!Credentials::bearer("  ").is_authenticated());
    }
}
