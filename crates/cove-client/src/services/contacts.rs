use tracing::warn;
use uuid::Uuid;

use cove_backend::Backend;
use cove_types::Contact;
use cove_types::rows::contact_from_value;

use crate::error::Result;

pub struct ContactService {
    backend: Backend,
}

impl ContactService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Accepted relationships where `user_id` is on either side, each with
    /// the counterpart's profile embedded. A row whose embed fails to
    /// decode is kept without a profile rather than dropped.
    pub async fn accepted_contacts(&self, user_id: Uuid) -> Result<Vec<Contact>> {
        let rows = self
            .backend
            .table("contacts")
            .select(
                "id, user_id, contact_id, status, \
                 user:user_id(id, username, email, avatar_url), \
                 contact:contact_id(id, username, email, avatar_url)",
            )
            .or(&format!("user_id.eq.{user_id},contact_id.eq.{user_id}"))
            .eq("status", "accepted")
            .fetch()
            .await?;

        let mut contacts = Vec::with_capacity(rows.len());
        for row in rows {
            match contact_from_value(row, user_id) {
                Ok(contact) => {
                    if contact.profile.is_none() {
                        warn!(contact_id = %contact.id, "contact without profile data");
                    }
                    contacts.push(contact);
                }
                Err(e) => warn!(error = %e, "skipping malformed contact row"),
            }
        }
        Ok(contacts)
    }
}
