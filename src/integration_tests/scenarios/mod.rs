pub mod contacts;
pub mod conversation_switch;
pub mod message_sync;
pub mod pagination;

pub use contacts::*;
pub use conversation_switch::*;
pub use message_sync::*;
pub use pagination::*;
