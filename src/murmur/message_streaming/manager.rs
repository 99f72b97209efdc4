//! Per-conversation broadcast channels.
//!
//! Streams are created lazily on subscribe and removed on the first emit after
//! all of their receivers are gone.

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::types::BatchUpdate;
use crate::types::ConversationId;

const BUFFER_SIZE: usize = 100;

pub struct MessageStreamManager {
    streams: DashMap<ConversationId, broadcast::Sender<BatchUpdate>>,
    active: broadcast::Sender<BatchUpdate>,
}

impl MessageStreamManager {
    pub fn new() -> Self {
        Self {
            streams: DashMap::new(),
            active: broadcast::channel(BUFFER_SIZE).0,
        }
    }

    /// Updates for one conversation only.
    pub fn subscribe(&self, conversation_id: &ConversationId) -> broadcast::Receiver<BatchUpdate> {
        self.streams
            .entry(conversation_id.clone())
            .or_insert_with(|| broadcast::channel(BUFFER_SIZE).0)
            .subscribe()
    }

    /// Updates for whichever conversation is active at the time.
    pub fn subscribe_active(&self) -> broadcast::Receiver<BatchUpdate> {
        self.active.subscribe()
    }

    pub fn emit(&self, update: BatchUpdate) {
        let conversation_id = update.view.conversation_id.clone();
        // No active subscribers is fine.
        let _ = self.active.send(update.clone());

        if let Some(sender) = self.streams.get(&conversation_id) {
            if sender.send(update).is_err() && sender.receiver_count() == 0 {
                drop(sender);
                self.streams.remove(&conversation_id);
            }
        }
    }
}

impl Default for MessageStreamManager {
    fn default() -> Self {
        Self::new()
    }
}
