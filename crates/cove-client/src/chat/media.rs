//! On-demand resolution of attachment references.
//!
//! Messages store a raw object path, never a fetchable URL. At render time
//! the path is exchanged for a time-limited signed URL, cached per path
//! for the life of the resolver. One resolver serves one viewing session, so the
//! cache is bounded by the conversation itself.

use std::collections::HashMap;
use std::future::Future;

use tracing::warn;

use cove_backend::{Backend, BackendError};

const DEFAULT_TTL_SECS: u64 = 3600;

/// Issues time-limited URLs for stored objects. Implemented by the live
/// backend and by stubs in tests.
pub trait SignUrls {
    fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u64,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}

impl SignUrls for Backend {
    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u64,
    ) -> Result<String, BackendError> {
        self.create_signed_url(bucket, path, ttl_secs).await
    }
}

pub struct MediaResolver<S> {
    signer: S,
    bucket: String,
    ttl_secs: u64,
    cache: HashMap<String, String>,
}

impl<S: SignUrls> MediaResolver<S> {
    pub fn new(signer: S, bucket: impl Into<String>) -> Self {
        Self {
            signer,
            bucket: bucket.into(),
            ttl_secs: DEFAULT_TTL_SECS,
            cache: HashMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// The fetchable URL for a stored object, from cache when the same
    /// path was resolved before. On failure the caller renders the message
    /// without its attachment: log, return `None`, and leave the path
    /// uncached so a later render can retry.
    pub async fn resolve(&mut self, path: &str) -> Option<String> {
        if let Some(url) = self.cache.get(path) {
            return Some(url.clone());
        }
        match self
            .signer
            .signed_url(&self.bucket, path, self.ttl_secs)
            .await
        {
            Ok(url) => {
                self.cache.insert(path.to_string(), url.clone());
                Some(url)
            }
            Err(e) => {
                warn!(path, error = %e, "attachment resolution failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSigner {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubSigner {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl SignUrls for &StubSigner {
        async fn signed_url(
            &self,
            bucket: &str,
            path: &str,
            _ttl_secs: u64,
        ) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                Err(BackendError::MissingSession)
            } else {
                Ok(format!("https://signed.example/{bucket}/{path}"))
            }
        }
    }

    #[tokio::test]
    async fn resolves_once_per_path() {
        let signer = StubSigner::new(false);
        let mut resolver = MediaResolver::new(&signer, "uploads");

        let first = resolver.resolve("u1-17-photo.png").await.unwrap();
        let second = resolver.resolve("u1-17-photo.png").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(signer.calls.load(Ordering::Relaxed), 1);

        resolver.resolve("u1-18-other.png").await.unwrap();
        assert_eq!(signer.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn failure_degrades_and_allows_retry() {
        let signer = StubSigner::new(true);
        let mut resolver = MediaResolver::new(&signer, "uploads");

        assert!(resolver.resolve("gone.png").await.is_none());
        assert!(resolver.resolve("gone.png").await.is_none());
        // Not cached, so each render retries.
        assert_eq!(signer.calls.load(Ordering::Relaxed), 2);
    }
}
