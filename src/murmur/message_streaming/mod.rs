//! Broadcast of conversation view updates.
//!
//! Every change of the working sequence is published as a [`BatchUpdate`]
//! carrying the full grouped view, both on a per-conversation channel and on
//! a channel that follows whichever conversation is active.

mod manager;
mod types;

pub use manager::MessageStreamManager;
pub use types::{BatchUpdate, ConversationSubscription, UpdateTrigger};
