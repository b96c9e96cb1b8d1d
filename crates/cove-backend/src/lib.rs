//! Client for the hosted backend platform: auth, row storage, realtime
//! change feed and object storage. Everything that touches the network
//! lives in this crate; callers get typed handles and [`serde_json::Value`]
//! rows to map at their own boundary.

pub mod auth;
pub mod config;
pub mod error;
pub mod realtime;
pub mod storage;
pub mod table;

use std::sync::Arc;

use tokio::sync::RwLock;

pub use auth::Session;
pub use config::BackendConfig;
pub use error::{BackendError, Result};
pub use realtime::{ChangeKind, ChangeRecord, Subscription};
pub use table::QueryBuilder;

/// Shared handle to the platform. Cheap to clone; all clones share the
/// HTTP connection pool and the cached session.
#[derive(Clone)]
pub struct Backend {
    inner: Arc<BackendInner>,
}

struct BackendInner {
    http: reqwest::Client,
    config: BackendConfig,
    session: RwLock<Option<Session>>,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            inner: Arc::new(BackendInner {
                http: reqwest::Client::new(),
                config,
                session: RwLock::new(None),
            }),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(BackendConfig::from_env()?))
    }

    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }

    /// The current session, if a sign-in succeeded and no sign-out followed.
    pub async fn session(&self) -> Option<Session> {
        self.inner.session.read().await.clone()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub(crate) async fn store_session(&self, session: Option<Session>) {
        *self.inner.session.write().await = session;
    }

    /// Bearer token for data and storage requests: the session's access
    /// token when signed in, the anonymous key otherwise.
    pub(crate) async fn bearer(&self) -> String {
        match self.session().await {
            Some(session) => session.access_token,
            None => self.inner.config.anon_key.clone(),
        }
    }
}
