//! Object storage: uploads, removals, and signed read URLs. Objects are
//! addressed by `(bucket, path)`; nothing here ever produces a permanent
//! public URL.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::Backend;
use crate::error::{Result, check_status};

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl Backend {
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config().base_url,
            bucket,
            path
        );
        let response = self
            .http()
            .post(&url)
            .header("apikey", &self.config().anon_key)
            .bearer_auth(self.bearer().await)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        check_status(response).await?;
        debug!(bucket, path, "object uploaded");
        Ok(())
    }

    /// Issue a time-limited read URL for a stored object. `ttl` is in
    /// seconds; the returned URL is directly fetchable until it expires.
    pub async fn create_signed_url(&self, bucket: &str, path: &str, ttl_secs: u64) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.config().base_url,
            bucket,
            path
        );
        let response = self
            .http()
            .post(&url)
            .header("apikey", &self.config().anon_key)
            .bearer_auth(self.bearer().await)
            .json(&json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;
        let body: SignResponse = check_status(response).await?.json().await?;

        // The endpoint answers with a path relative to the storage root.
        Ok(format!(
            "{}/storage/v1{}",
            self.config().base_url,
            body.signed_url
        ))
    }

    pub async fn remove(&self, bucket: &str, paths: &[&str]) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}", self.config().base_url, bucket);
        let response = self
            .http()
            .delete(&url)
            .header("apikey", &self.config().anon_key)
            .bearer_auth(self.bearer().await)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check_status(response).await?;
        debug!(bucket, count = paths.len(), "objects removed");
        Ok(())
    }
}
