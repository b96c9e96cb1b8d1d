//! The platform's auth endpoints. The rest of the client only ever needs
//! the stable account id and the access token held in [`Session`].

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Backend;
use crate::error::{Result, check_status};

#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
}

/// Emails are matched case-insensitively server-side; normalize before
/// submission so sign-up and sign-in agree.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Backend {
    /// Create an account. The returned session may be unusable until the
    /// address is confirmed, depending on project settings.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/auth/v1/signup", self.config().base_url);
        let response = self
            .http()
            .post(&url)
            .header("apikey", &self.config().anon_key)
            .json(&json!({
                "email": normalize_email(email),
                "password": password,
            }))
            .send()
            .await?;
        let body: TokenResponse = check_status(response).await?.json().await?;

        let session = Session {
            access_token: body.access_token,
            user_id: body.user.id,
        };
        self.store_session(Some(session.clone())).await;
        info!(user_id = %session.user_id, "account created");
        Ok(session)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!(
            "{}/auth/v1/token?grant_type=password",
            self.config().base_url
        );
        let response = self
            .http()
            .post(&url)
            .header("apikey", &self.config().anon_key)
            .json(&json!({
                "email": normalize_email(email),
                "password": password,
            }))
            .send()
            .await?;
        let body: TokenResponse = check_status(response).await?.json().await?;

        let session = Session {
            access_token: body.access_token,
            user_id: body.user.id,
        };
        self.store_session(Some(session.clone())).await;
        debug!(user_id = %session.user_id, "signed in");
        Ok(session)
    }

    /// Revoke the session server-side and forget it locally. The local
    /// session is dropped even when the revocation call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session().await else {
            return Ok(());
        };
        self.store_session(None).await;

        let url = format!("{}/auth/v1/logout", self.config().base_url);
        let response = self
            .http()
            .post(&url)
            .header("apikey", &self.config().anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Patch the signed-in account's metadata (display name, avatar, ...).
    pub async fn update_user(&self, metadata: serde_json::Value) -> Result<()> {
        let session = self
            .session()
            .await
            .ok_or(crate::BackendError::MissingSession)?;

        let url = format!("{}/auth/v1/user", self.config().base_url);
        let response = self
            .http()
            .put(&url)
            .header("apikey", &self.config().anon_key)
            .bearer_auth(&session.access_token)
            .json(&json!({ "data": metadata }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }
}
