use thiserror::Error;

/// Failures talking to the hosted platform.
///
/// Auth and permission denials arrive as [`BackendError::Status`] with a
/// 401/403; callers surface those to the user and abandon the operation;
/// there is no automatic retry anywhere in this crate.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("no active session")]
    MissingSession,
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Turn a non-2xx response into [`BackendError::Status`], keeping the body
/// for diagnostics.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status { status, body })
}
