//! Account lifecycle: registration, sign-in, sign-out. The platform's auth
//! endpoint owns credentials; the `users` relation carries the public
//! profile row keyed by the same account id.

use serde_json::json;
use tracing::warn;

use cove_backend::{Backend, BackendError};
use cove_types::UserProfile;
use cove_types::rows::profile_from_value;

use crate::error::{ClientError, Result};

pub struct AuthService {
    backend: Backend,
}

impl AuthService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Create the account, then its profile row. When the profile insert
    /// fails the auth account still exists; surfaced as-is, the caller
    /// retries registration or falls back to sign-in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<UserProfile> {
        let session = self.backend.sign_up(email, password).await?;

        let mut rows = self
            .backend
            .table("users")
            .insert(json!([{
                "id": session.user_id,
                "email": email.trim().to_lowercase(),
                "username": username,
                "avatar_url": avatar_url,
            }]))
            .await?;
        if rows.is_empty() {
            warn!(user_id = %session.user_id, "profile row insert returned nothing");
            return Err(ClientError::NotFound("user profile"));
        }
        Ok(profile_from_value(rows.remove(0))?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let session = self
            .backend
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| match &e {
                BackendError::Status { body, .. }
                    if body.to_lowercase().contains("not confirmed") =>
                {
                    ClientError::Validation("confirm your email before signing in")
                }
                _ => e.into(),
            })?;

        self.profile_of(session.user_id).await
    }

    pub async fn logout(&self) -> Result<()> {
        Ok(self.backend.sign_out().await?)
    }

    /// Profile of the signed-in account, `None` without a session.
    pub async fn current_user(&self) -> Result<Option<UserProfile>> {
        match self.backend.session().await {
            Some(session) => self.profile_of(session.user_id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn profile_of(&self, user_id: uuid::Uuid) -> Result<UserProfile> {
        let row = self
            .backend
            .table("users")
            .select("id, username, email, avatar_url")
            .eq("id", user_id)
            .fetch_maybe()
            .await?
            .ok_or(ClientError::NotFound("user profile"))?;
        Ok(profile_from_value(row)?)
    }
}
