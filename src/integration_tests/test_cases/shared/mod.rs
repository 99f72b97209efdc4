pub mod create_users;
pub mod open_conversation;
pub mod respond_contact_request;
pub mod seed_history;
pub mod send_contact_request;
pub mod send_message;
pub mod verify_conversations;

pub use create_users::*;
pub use open_conversation::*;
pub use respond_contact_request::*;
pub use seed_history::*;
pub use send_contact_request::*;
pub use send_message::*;
pub use verify_conversations::*;
