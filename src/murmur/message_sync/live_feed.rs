use crate::murmur::backend::{BackendError, Direction, DocumentStore, LiveQuery, Query};
use crate::murmur::message_sync::types::Message;
use crate::types::ConversationId;

/// Standing subscription to the newest `batch_size` messages of one conversation.
///
/// Every emission is the full current window, newest first. Cancelling (or
/// dropping) the feed detaches it from the store.
#[derive(Debug)]
pub struct LiveFeed {
    conversation_id: ConversationId,
    live: LiveQuery,
}

impl LiveFeed {
    pub async fn subscribe(
        store: &dyn DocumentStore,
        conversation_id: ConversationId,
        batch_size: usize,
    ) -> Result<Self, BackendError> {
        let query = Query::collection(conversation_id.messages_path())
            .order_by("timestamp", Direction::Descending)
            .limit(batch_size);

        let live = store.subscribe(query).await?;
        tracing::debug!(
            target: "murmur::message_sync::live_feed",
            "Live feed attached to conversation {}",
            conversation_id
        );

        Ok(Self {
            conversation_id,
            live,
        })
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Waits for the next window.
    ///
    /// Returns `None` once the store has detached the subscription, whether
    /// or not it sent an error first. Callers treat that as a dropped feed.
    pub async fn next_batch(&mut self) -> Option<Result<Vec<Message>, BackendError>> {
        match self.live.next().await {
            Some(Ok(documents)) => Some(Ok(documents
                .iter()
                .map(|doc| Message::from_document(&self.conversation_id, doc))
                .collect())),
            Some(Err(e)) => Some(Err(e)),
            None => None,
        }
    }

    pub fn cancel(self) {
        tracing::debug!(
            target: "murmur::message_sync::live_feed",
            "Live feed detached from conversation {}",
            self.conversation_id
        );
        self.live.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::murmur::backend::{FieldValue, Fields, InMemoryStore};

    fn message_fields(text: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("text".to_string(), text.into());
        fields.insert("sender".to_string(), "alice".into());
        fields.insert("senderName".to_string(), "Alice".into());
        fields.insert("timestamp".to_string(), FieldValue::ServerTimestamp);
        fields
    }

    #[tokio::test]
    async fn window_is_capped_at_batch_size() {
        let store = InMemoryStore::new();
        let conversation = ConversationId::new("alice_bob");
        for i in 0..5 {
            store
                .create_document(&conversation.messages_path(), message_fields(&format!("{}", i)))
                .await
                .unwrap();
        }

        let mut feed = LiveFeed::subscribe(&store, conversation.clone(), 3)
            .await
            .unwrap();
        let window = feed.next_batch().await.unwrap().unwrap();

        assert_eq!(window.len(), 3);
        assert!(window.iter().all(|m| m.conversation_id == conversation));
        assert!(window.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn cancel_detaches_from_store() {
        let store = InMemoryStore::new();
        let conversation = ConversationId::new("alice_bob");
        let feed = LiveFeed::subscribe(&store, conversation.clone(), 25)
            .await
            .unwrap();
        assert_eq!(store.listener_count(&conversation.messages_path()), 1);

        feed.cancel();
        assert_eq!(store.listener_count(&conversation.messages_path()), 0);
    }

    #[tokio::test]
    async fn dropped_subscription_surfaces_error() {
        let store = InMemoryStore::new();
        let conversation = ConversationId::new("alice_bob");
        let mut feed = LiveFeed::subscribe(&store, conversation.clone(), 25)
            .await
            .unwrap();
        let _ = feed.next_batch().await;

        store.drop_subscriptions(&conversation.messages_path(), "lost connection");

        assert!(matches!(
            feed.next_batch().await,
            Some(Err(BackendError::SubscriptionDropped(_)))
        ));
        assert!(feed.next_batch().await.is_none());
    }
}
