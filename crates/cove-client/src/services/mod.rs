pub mod auth;
pub mod chats;
pub mod contacts;
pub mod messages;
pub mod users;

pub use auth::AuthService;
pub use chats::ChatService;
pub use contacts::ContactService;
pub use messages::MessageService;
pub use users::UserService;
