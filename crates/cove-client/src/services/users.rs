use serde::Serialize;
use uuid::Uuid;

use cove_backend::Backend;
use cove_types::UserProfile;
use cove_types::rows::profile_from_value;

use crate::error::{ClientError, Result};

/// Partial profile update; absent fields are left untouched.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

pub struct UserService {
    backend: Backend,
}

impl UserService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserProfile> {
        let row = self
            .backend
            .table("users")
            .select("id, username, email, avatar_url")
            .eq("id", user_id)
            .fetch_maybe()
            .await?
            .ok_or(ClientError::NotFound("user"))?;
        Ok(profile_from_value(row)?)
    }

    /// Patch the profile row, then mirror the patch into the auth account's
    /// metadata so both stay in step.
    pub async fn update_profile(&self, user_id: Uuid, patch: ProfilePatch) -> Result<UserProfile> {
        let patch_value = serde_json::to_value(&patch).map_err(cove_backend::BackendError::from)?;

        let mut rows = self
            .backend
            .table("users")
            .eq("id", user_id)
            .update(patch_value.clone())
            .await?;
        if rows.is_empty() {
            return Err(ClientError::NotFound("user"));
        }

        self.backend.update_user(patch_value).await?;

        Ok(profile_from_value(rows.remove(0))?)
    }
}
