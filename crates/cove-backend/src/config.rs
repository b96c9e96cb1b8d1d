use crate::error::{BackendError, Result};

/// Connection settings for the hosted platform.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL without a trailing slash.
    pub base_url: String,
    /// Public (anonymous) API key, sent with every request.
    pub anon_key: String,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| BackendError::Config(format!("invalid base url `{base_url}`: {e}")))?;
        Ok(Self {
            base_url,
            anon_key: anon_key.into(),
        })
    }

    /// Read `COVE_BACKEND_URL` and `COVE_ANON_KEY`, loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let base_url = std::env::var("COVE_BACKEND_URL")
            .map_err(|_| BackendError::Config("COVE_BACKEND_URL not set".into()))?;
        let anon_key = std::env::var("COVE_ANON_KEY")
            .map_err(|_| BackendError::Config("COVE_ANON_KEY not set".into()))?;

        Self::new(base_url, anon_key)
    }

    /// WebSocket endpoint of the realtime feed, carrying the api key.
    pub(crate) fn realtime_url(&self) -> String {
        let ws_base = self
            .base_url
            .replace("http://", "ws://")
            .replace("https://", "wss://");
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            ws_base, self.anon_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let config = BackendConfig::new("https://demo.example.co/", "key").unwrap();
        assert_eq!(config.base_url, "https://demo.example.co");
    }

    #[test]
    fn rejects_garbage_url() {
        assert!(BackendConfig::new("not a url", "key").is_err());
    }

    #[test]
    fn realtime_url_switches_scheme() {
        let config = BackendConfig::new("https://demo.example.co", "key").unwrap();
        assert_eq!(
            config.realtime_url(),
            "wss://demo.example.co/realtime/v1/websocket?apikey=key&vsn=1.0.0"
        );
    }
}
