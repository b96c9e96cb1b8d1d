pub mod events;
pub mod models;
pub mod rows;

pub use events::MessageChange;
pub use models::{
    Chat, ChatEvent, ChatMember, Contact, ContactStatus, MemberRole, Message, MessageId,
    UserProfile,
};
