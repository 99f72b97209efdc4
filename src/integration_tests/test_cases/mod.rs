pub mod message_sync;
pub mod shared;
