pub mod media;
pub mod reconciler;
pub mod session;

pub use media::{MediaResolver, SignUrls};
pub use reconciler::{Draft, Reconciler};
pub use session::{ChangeFeed, ChatSession};
