//! Client-side state for the chat application.
//!
//! The backend platform owns persistence, auth and fan-out; this crate
//! owns what is left on the client: typed service operations over the
//! platform's row API, the optimistic message timeline for an open
//! conversation, and on-demand resolution of attachment references.

pub mod chat;
pub mod error;
pub mod services;

pub use chat::{ChatSession, Draft, MediaResolver, Reconciler};
pub use error::{ClientError, Result};
pub use services::{AuthService, ChatService, ContactService, MessageService, UserService};
