use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::broadcast;

use crate::murmur::backend::{DocumentId, FieldValue, Fields};
use crate::murmur::error::{MurmurError, Result};
use crate::murmur::message_streaming::{BatchUpdate, ConversationSubscription, UpdateTrigger};
use crate::murmur::message_sync::{
    BeginFetch, ConversationEngine, ConversationView, LiveFeed, ScrollAction, Viewport, fetch_older,
};
use crate::murmur::{ActiveConversation, Murmur, SyncShared};
use crate::types::ConversationId;

/// Outcome of [`Murmur::load_older`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOlderOutcome {
    /// A page was fetched and merged.
    Loaded { fetched: usize, exhausted: bool },
    /// A fetch is already in flight; nothing was issued.
    AlreadyFetching,
    /// The beginning of the conversation has been reached; nothing was issued.
    Exhausted,
    /// The first live-feed window has not arrived yet; nothing was issued.
    NotReady,
    /// The conversation was switched while the fetch was in flight and the
    /// response was discarded.
    Abandoned,
}

impl Murmur {
    /// Makes `conversation_id` the active conversation.
    ///
    /// The previous live feed is detached before this returns, the working
    /// sequence and pagination state are reset, and a new live feed starts the
    /// initial load. Responses still in flight for the previous conversation
    /// are discarded when they arrive.
    ///
    /// A live feed that fails to attach is reported on the view and returned
    /// as [`MurmurError::Subscription`]; the conversation stays active so
    /// [`Murmur::reconnect_live_feed`] can retry.
    pub async fn switch_conversation(&self, conversation_id: ConversationId) -> Result<()> {
        let _switching = self.switch_guard.lock().await;

        let engine = ConversationEngine::new(conversation_id.clone(), self.config.sync.clone())?;
        let epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = {
            let mut active = self.shared.active.lock().await;
            let opened = engine.update(ScrollAction::Unchanged);
            let previous = active.replace(ActiveConversation {
                epoch,
                engine,
                feed_task: None,
            });
            self.shared
                .streams
                .emit(BatchUpdate::new(UpdateTrigger::ConversationOpened, opened));
            previous
        };

        if let Some(previous) = previous {
            tracing::debug!(
                target: "murmur::messages::switch_conversation",
                "Leaving conversation {}",
                previous.engine.conversation_id()
            );
            previous.shutdown().await;
        }

        tracing::info!(
            target: "murmur::messages::switch_conversation",
            "Opening conversation {}",
            conversation_id
        );
        self.attach_live_feed(epoch, conversation_id).await
    }

    /// Detaches the live feed and clears the active conversation.
    pub async fn close_conversation(&self) {
        let _switching = self.switch_guard.lock().await;
        self.epochs.fetch_add(1, Ordering::SeqCst);

        let previous = self.shared.active.lock().await.take();
        if let Some(previous) = previous {
            tracing::debug!(
                target: "murmur::messages::close_conversation",
                "Closing conversation {}",
                previous.engine.conversation_id()
            );
            previous.shutdown().await;
        }
    }

    /// Re-subscribes the live feed of the active conversation after a failure.
    /// The working sequence is kept.
    pub async fn reconnect_live_feed(&self) -> Result<()> {
        let _switching = self.switch_guard.lock().await;

        let (epoch, conversation_id, task) = {
            let mut active = self.shared.active.lock().await;
            let current = active.as_mut().ok_or(MurmurError::NoActiveConversation)?;
            current.engine.reattach();
            (
                current.epoch,
                current.engine.conversation_id().clone(),
                current.feed_task.take(),
            )
        };

        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }

        self.attach_live_feed(epoch, conversation_id).await
    }

    pub async fn active_conversation(&self) -> Option<ConversationId> {
        self.shared
            .active
            .lock()
            .await
            .as_ref()
            .map(|a| a.engine.conversation_id().clone())
    }

    /// Grouped, ordered view of the active conversation.
    pub async fn current_view(&self) -> Option<ConversationView> {
        self.shared
            .active
            .lock()
            .await
            .as_ref()
            .map(|a| a.engine.view())
    }

    /// Subscribes to every change of whichever conversation is active.
    ///
    /// The returned `initial_view` reflects the state at subscription time;
    /// every later change arrives on `updates`.
    pub async fn on_batch_update(&self) -> ConversationSubscription {
        let active = self.shared.active.lock().await;
        ConversationSubscription {
            updates: self.shared.streams.subscribe_active(),
            initial_view: active.as_ref().map(|a| a.engine.view()),
        }
    }

    /// Subscribes to changes of one conversation only.
    pub fn subscribe_to_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> broadcast::Receiver<BatchUpdate> {
        self.shared.streams.subscribe(conversation_id)
    }

    /// Fetches the page of messages just older than the oldest loaded one.
    ///
    /// Calling this while a fetch is in flight, or after the beginning of the
    /// conversation was reached, returns immediately without issuing a fetch.
    /// A failed fetch leaves the working sequence untouched, is reported on the
    /// view, and can be retried by calling this again.
    pub async fn load_older(&self) -> Result<LoadOlderOutcome> {
        let (epoch, conversation_id, cursor) = {
            let mut active = self.shared.active.lock().await;
            let current = active.as_mut().ok_or(MurmurError::NoActiveConversation)?;

            let cursor = match current.engine.begin_load_older() {
                BeginFetch::Start(cursor) => cursor,
                BeginFetch::AlreadyFetching => return Ok(LoadOlderOutcome::AlreadyFetching),
                BeginFetch::Exhausted => return Ok(LoadOlderOutcome::Exhausted),
                BeginFetch::NoWatermark => return Ok(LoadOlderOutcome::NotReady),
            };

            self.shared.streams.emit(BatchUpdate::new(
                UpdateTrigger::LoadOlderStarted,
                current.engine.update(ScrollAction::Unchanged),
            ));
            (current.epoch, current.engine.conversation_id().clone(), cursor)
        };

        tracing::debug!(
            target: "murmur::messages::load_older",
            "Fetching messages of {} older than {}",
            conversation_id,
            cursor
        );
        let result = fetch_older(
            self.store(),
            &conversation_id,
            cursor,
            self.config.sync.batch_size,
        )
        .await;

        let mut active = self.shared.active.lock().await;
        let Some(current) = active.as_mut().filter(|a| a.epoch == epoch) else {
            tracing::debug!(
                target: "murmur::messages::load_older",
                "Discarding older page for abandoned conversation {}",
                conversation_id
            );
            return Ok(LoadOlderOutcome::Abandoned);
        };

        match result {
            Ok(batch) => {
                let fetched = batch.len();
                let update = current.engine.apply_older_batch(batch);
                let exhausted = !update.view.has_more;
                self.shared
                    .streams
                    .emit(BatchUpdate::new(UpdateTrigger::OlderPage, update));
                Ok(LoadOlderOutcome::Loaded { fetched, exhausted })
            }
            Err(e) => {
                tracing::warn!(
                    target: "murmur::messages::load_older",
                    "Failed to load older messages of {}: {}",
                    conversation_id,
                    e
                );
                let update = current.engine.apply_older_failure(e.to_string());
                self.shared
                    .streams
                    .emit(BatchUpdate::new(UpdateTrigger::LoadOlderFailed, update));
                Err(MurmurError::PaginationFetch(e.to_string()))
            }
        }
    }

    /// Sends `text` to the active conversation.
    ///
    /// Whitespace-only text is rejected before anything is written. The text is
    /// stored as typed; the backend assigns the timestamp and the message
    /// reaches the view through the live feed like any other.
    pub async fn send_message(&self, text: &str) -> Result<DocumentId> {
        if text.trim().is_empty() {
            return Err(MurmurError::SendValidation);
        }
        let conversation_id = self
            .active_conversation()
            .await
            .ok_or(MurmurError::NoActiveConversation)?;
        self.send_message_to(&conversation_id, text).await
    }

    /// Sends `text` to a specific conversation, active or not.
    pub async fn send_message_to(&self, conversation_id: &ConversationId, text: &str) -> Result<DocumentId> {
        if text.trim().is_empty() {
            return Err(MurmurError::SendValidation);
        }
        let identity = self.session().identity()?;

        let mut fields = Fields::new();
        fields.insert("text".to_string(), text.into());
        fields.insert("sender".to_string(), identity.id.as_str().into());
        fields.insert("senderName".to_string(), identity.display_name.as_str().into());
        fields.insert("timestamp".to_string(), FieldValue::ServerTimestamp);

        let id = self
            .store()
            .create_document(&conversation_id.messages_path(), fields)
            .await?;

        tracing::debug!(
            target: "murmur::messages::send_message",
            "Sent message {} to {}",
            id,
            conversation_id
        );
        Ok(id)
    }

    /// Records the presentation layer's scroll geometry for the next anchoring decision.
    pub async fn report_viewport(&self, viewport: Viewport) -> Result<()> {
        let mut active = self.shared.active.lock().await;
        let current = active.as_mut().ok_or(MurmurError::NoActiveConversation)?;
        if let Some(update) = current.engine.set_viewport(viewport) {
            self.shared
                .streams
                .emit(BatchUpdate::new(UpdateTrigger::ViewportChanged, update));
        }
        Ok(())
    }

    async fn attach_live_feed(&self, epoch: u64, conversation_id: ConversationId) -> Result<()> {
        let subscribed = LiveFeed::subscribe(
            self.store(),
            conversation_id.clone(),
            self.config.sync.batch_size,
        )
        .await;

        let mut active = self.shared.active.lock().await;
        let Some(current) = active.as_mut().filter(|a| a.epoch == epoch) else {
            if let Ok(feed) = subscribed {
                feed.cancel();
            }
            return Ok(());
        };

        match subscribed {
            Ok(feed) => {
                current.feed_task = Some(tokio::spawn(run_live_feed(
                    self.shared.clone(),
                    epoch,
                    feed,
                )));
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    target: "murmur::messages::live_feed",
                    "Failed to subscribe to conversation {}: {}",
                    conversation_id,
                    e
                );
                let update = current.engine.apply_subscription_error(e.to_string());
                self.shared
                    .streams
                    .emit(BatchUpdate::new(UpdateTrigger::SubscriptionFailed, update));
                Err(MurmurError::Subscription(e.to_string()))
            }
        }
    }
}

/// Applies live-feed windows to the active conversation until the feed fails
/// or the conversation is left.
async fn run_live_feed(shared: Arc<SyncShared>, epoch: u64, mut feed: LiveFeed) {
    loop {
        let event = feed.next_batch().await;

        let mut active = shared.active.lock().await;
        let Some(current) = active.as_mut().filter(|a| a.epoch == epoch) else {
            break;
        };

        let failure = match event {
            Some(Ok(batch)) => {
                let trigger = if current.engine.is_loading() {
                    UpdateTrigger::InitialLoad
                } else {
                    UpdateTrigger::LiveBatch
                };
                if let Some(update) = current.engine.apply_live_batch(batch) {
                    shared.streams.emit(BatchUpdate::new(trigger, update));
                }
                continue;
            }
            Some(Err(e)) => e.to_string(),
            None => "live feed closed by the backend".to_string(),
        };

        tracing::warn!(
            target: "murmur::messages::live_feed",
            "Live feed of {} failed: {}",
            feed.conversation_id(),
            failure
        );
        let update = current.engine.apply_subscription_error(failure);
        shared
            .streams
            .emit(BatchUpdate::new(UpdateTrigger::SubscriptionFailed, update));
        break;
    }

    feed.cancel();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::murmur::backend::BackendError;
    use crate::murmur::message_sync::{ViewError, merge::is_canonical};
    use crate::murmur::test_utils::*;
    use crate::types::UserId;

    fn alice_bob() -> ConversationId {
        ConversationId::for_participants(&UserId::new("alice"), &UserId::new("bob"))
    }

    #[tokio::test]
    async fn initial_load_shows_newest_window_in_order() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_history(&store, &alice_bob(), 30, 10_000).await;

        murmur.switch_conversation(alice_bob()).await.unwrap();
        let view = wait_for_view(&murmur, |v| !v.loading).await;

        assert_eq!(view.message_count, 25);
        assert!(view.has_more);
        let messages: Vec<_> = view.messages().cloned().collect();
        assert!(is_canonical(&messages));
        assert_eq!(messages.last().unwrap().timestamp.timestamp(), 10_000);
    }

    #[tokio::test]
    async fn empty_conversation_is_exhausted_immediately() {
        let (murmur, store, _logs) = create_mock_murmur();
        murmur.switch_conversation(alice_bob()).await.unwrap();
        let view = wait_for_view(&murmur, |v| !v.loading).await;

        assert_eq!(view.message_count, 0);
        assert!(!view.has_more);
        assert_eq!(murmur.load_older().await.unwrap(), LoadOlderOutcome::Exhausted);
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn load_older_pages_until_exhausted() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_history(&store, &alice_bob(), 60, 10_000).await;

        murmur.switch_conversation(alice_bob()).await.unwrap();
        wait_for_view(&murmur, |v| !v.loading).await;

        assert_eq!(
            murmur.load_older().await.unwrap(),
            LoadOlderOutcome::Loaded {
                fetched: 25,
                exhausted: false
            }
        );
        assert_eq!(
            murmur.load_older().await.unwrap(),
            LoadOlderOutcome::Loaded {
                fetched: 10,
                exhausted: true
            }
        );
        assert_eq!(murmur.load_older().await.unwrap(), LoadOlderOutcome::Exhausted);
        assert_eq!(store.fetch_count(), 2);

        let view = murmur.current_view().await.unwrap();
        assert_eq!(view.message_count, 60);
        let messages: Vec<_> = view.messages().cloned().collect();
        assert!(is_canonical(&messages));
    }

    #[tokio::test]
    async fn empty_older_page_sets_exhaustion() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_history(&store, &alice_bob(), 25, 10_000).await;

        murmur.switch_conversation(alice_bob()).await.unwrap();
        wait_for_view(&murmur, |v| !v.loading).await;

        assert_eq!(
            murmur.load_older().await.unwrap(),
            LoadOlderOutcome::Loaded {
                fetched: 0,
                exhausted: true
            }
        );
        assert_eq!(murmur.load_older().await.unwrap(), LoadOlderOutcome::Exhausted);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_load_older_issues_one_fetch() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_history(&store, &alice_bob(), 60, 10_000).await;
        murmur.switch_conversation(alice_bob()).await.unwrap();
        wait_for_view(&murmur, |v| !v.loading).await;

        store.hold_fetches();
        let murmur = Arc::new(murmur);
        let first = tokio::spawn({
            let murmur = murmur.clone();
            async move { murmur.load_older().await }
        });
        wait_for_view(&murmur, |v| v.loading_older).await;

        assert_eq!(
            murmur.load_older().await.unwrap(),
            LoadOlderOutcome::AlreadyFetching
        );

        store.release_fetches();
        assert!(matches!(
            first.await.unwrap().unwrap(),
            LoadOlderOutcome::Loaded { fetched: 25, .. }
        ));
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn failed_page_keeps_sequence_and_retry_succeeds() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_history(&store, &alice_bob(), 40, 10_000).await;
        murmur.switch_conversation(alice_bob()).await.unwrap();
        wait_for_view(&murmur, |v| !v.loading).await;

        store.fail_next_fetch(BackendError::Unavailable("offline".to_string()));
        let err = murmur.load_older().await.unwrap_err();
        assert!(matches!(err, MurmurError::PaginationFetch(_)));

        let view = murmur.current_view().await.unwrap();
        assert_eq!(view.message_count, 25);
        assert!(matches!(view.error, Some(ViewError::PaginationFetch(_))));

        assert!(matches!(
            murmur.load_older().await.unwrap(),
            LoadOlderOutcome::Loaded { fetched: 15, .. }
        ));
        assert!(murmur.current_view().await.unwrap().error.is_none());
    }

    #[tokio::test]
    async fn switching_discards_in_flight_page() {
        let (murmur, store, _logs) = create_mock_murmur();
        let carol = ConversationId::for_participants(&UserId::new("alice"), &UserId::new("carol"));
        seed_history(&store, &alice_bob(), 60, 10_000).await;
        seed_history(&store, &carol, 3, 20_000).await;

        murmur.switch_conversation(alice_bob()).await.unwrap();
        wait_for_view(&murmur, |v| !v.loading).await;

        store.hold_fetches();
        let murmur = Arc::new(murmur);
        let pending = tokio::spawn({
            let murmur = murmur.clone();
            async move { murmur.load_older().await }
        });
        wait_for_view(&murmur, |v| v.loading_older).await;

        murmur.switch_conversation(carol.clone()).await.unwrap();
        store.release_fetches();

        assert_eq!(pending.await.unwrap().unwrap(), LoadOlderOutcome::Abandoned);

        let view = wait_for_view(&murmur, |v| !v.loading).await;
        assert_eq!(view.conversation_id, carol);
        assert_eq!(view.message_count, 3);
        assert!(view.messages().all(|m| m.conversation_id == carol));
    }

    #[tokio::test]
    async fn switching_detaches_previous_live_feed() {
        let (murmur, store, _logs) = create_mock_murmur();
        let carol = ConversationId::for_participants(&UserId::new("alice"), &UserId::new("carol"));

        murmur.switch_conversation(alice_bob()).await.unwrap();
        wait_for_view(&murmur, |v| !v.loading).await;
        assert_eq!(store.listener_count(&alice_bob().messages_path()), 1);

        murmur.switch_conversation(carol.clone()).await.unwrap();
        assert_eq!(store.listener_count(&alice_bob().messages_path()), 0);

        murmur.send_message_to(&alice_bob(), "late").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let view = murmur.current_view().await.unwrap();
        assert_eq!(view.conversation_id, carol);
        assert_eq!(view.message_count, 0);
    }

    #[tokio::test]
    async fn sent_message_arrives_through_live_feed() {
        let (murmur, _store, _logs) = create_mock_murmur();
        murmur.switch_conversation(alice_bob()).await.unwrap();
        wait_for_view(&murmur, |v| !v.loading).await;

        let mut subscription = murmur.on_batch_update().await;
        assert!(subscription.initial_view.is_some());

        let id = murmur.send_message("  hello bob  ").await.unwrap();

        let update = subscription.updates.recv().await.unwrap();
        assert_eq!(update.trigger, UpdateTrigger::LiveBatch);
        assert_eq!(update.scroll, ScrollAction::ScrollToBottom);
        let message = update.view.messages().find(|m| m.id == id).unwrap();
        assert_eq!(message.text, "  hello bob  ");
        assert_eq!(message.sender_id.as_str(), "alice");
        assert_eq!(message.sender_display_name, "Alice");
    }

    #[tokio::test]
    async fn whitespace_message_is_rejected_without_write() {
        let (murmur, store, _logs) = create_mock_murmur();
        murmur.switch_conversation(alice_bob()).await.unwrap();

        let err = murmur.send_message(" \n\t ").await.unwrap_err();
        assert!(matches!(err, MurmurError::SendValidation));
        assert!(store.documents(&alice_bob().messages_path()).is_empty());
    }

    #[tokio::test]
    async fn send_without_active_conversation_fails() {
        let (murmur, _store, _logs) = create_mock_murmur();
        assert!(matches!(
            murmur.send_message("hi").await,
            Err(MurmurError::NoActiveConversation)
        ));
    }

    #[tokio::test]
    async fn live_append_far_from_bottom_shows_new_messages() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_history(&store, &alice_bob(), 30, 10_000).await;
        murmur.switch_conversation(alice_bob()).await.unwrap();
        wait_for_view(&murmur, |v| !v.loading).await;

        murmur
            .report_viewport(Viewport::new(0.0, 2000.0, 500.0))
            .await
            .unwrap();
        let mut updates = murmur.subscribe_to_conversation(&alice_bob());
        murmur.send_message("ping").await.unwrap();

        let update = updates.recv().await.unwrap();
        assert_eq!(update.scroll, ScrollAction::ShowNewMessages { count: 1 });
        assert_eq!(update.view.unseen_messages, 1);
        assert!(update.view.show_scroll_button);
    }

    #[tokio::test]
    async fn subscription_failure_is_reported_and_recoverable() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_history(&store, &alice_bob(), 5, 10_000).await;
        store.fail_next_subscribe(BackendError::PermissionDenied("rules".to_string()));

        let err = murmur.switch_conversation(alice_bob()).await.unwrap_err();
        assert!(matches!(err, MurmurError::Subscription(_)));
        let view = murmur.current_view().await.unwrap();
        assert!(matches!(view.error, Some(ViewError::Subscription(_))));

        murmur.reconnect_live_feed().await.unwrap();
        let view = wait_for_view(&murmur, |v| v.error.is_none() && v.message_count == 5).await;
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn dropped_live_feed_keeps_loaded_messages() {
        let (murmur, store, _logs) = create_mock_murmur();
        seed_history(&store, &alice_bob(), 5, 10_000).await;
        murmur.switch_conversation(alice_bob()).await.unwrap();
        wait_for_view(&murmur, |v| !v.loading).await;

        store.drop_subscriptions(&alice_bob().messages_path(), "network lost");

        let view = wait_for_view(&murmur, |v| v.error.is_some()).await;
        assert_eq!(view.message_count, 5);
        assert!(matches!(view.error, Some(ViewError::Subscription(_))));
    }

    #[tokio::test]
    async fn close_conversation_clears_state() {
        let (murmur, store, _logs) = create_mock_murmur();
        murmur.switch_conversation(alice_bob()).await.unwrap();
        murmur.close_conversation().await;

        assert!(murmur.active_conversation().await.is_none());
        assert_eq!(store.listener_count(&alice_bob().messages_path()), 0);
        assert!(matches!(
            murmur.load_older().await,
            Err(MurmurError::NoActiveConversation)
        ));
    }
}
