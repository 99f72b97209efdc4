use chrono::FixedOffset;

use crate::murmur::error::Result;
use crate::murmur::message_sync::grouping::group_by_day;
use crate::murmur::message_sync::merge::{MergeSummary, merge};
use crate::murmur::message_sync::pagination::{BeginFetch, PaginationController, PaginationState};
use crate::murmur::message_sync::scroll::{ScrollAction, ScrollPolicy, Viewport};
use crate::murmur::message_sync::types::{ConversationView, Message, SyncConfig, ViewError, ViewUpdate};
use crate::types::ConversationId;

/// Working state of one open conversation.
///
/// The engine owns the working sequence and is the only thing that mutates
/// it. All inputs (live windows, older pages, failures, viewport reports)
/// are applied synchronously; the caller serializes access.
#[derive(Debug)]
pub struct ConversationEngine {
    conversation_id: ConversationId,
    config: SyncConfig,
    offset: FixedOffset,
    messages: Vec<Message>,
    pagination: PaginationController,
    policy: ScrollPolicy,
    viewport: Viewport,
    awaiting_first_batch: bool,
    error: Option<ViewError>,
    unseen: usize,
}

impl ConversationEngine {
    pub fn new(conversation_id: ConversationId, config: SyncConfig) -> Result<Self> {
        let offset = config.utc_offset()?;
        Ok(Self {
            conversation_id,
            offset,
            messages: Vec::new(),
            pagination: PaginationController::new(config.batch_size),
            policy: ScrollPolicy::new(config.near_bottom_threshold),
            viewport: Viewport::default(),
            awaiting_first_batch: true,
            error: None,
            unseen: 0,
            config,
        })
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn pagination_state(&self) -> PaginationState {
        self.pagination.state()
    }

    /// Whether the first live-feed window is still outstanding.
    pub fn is_loading(&self) -> bool {
        self.awaiting_first_batch
    }

    pub fn error(&self) -> Option<&ViewError> {
        self.error.as_ref()
    }

    /// Applies one live-feed window. Returns `None` when nothing visible changed.
    pub fn apply_live_batch(&mut self, batch: Vec<Message>) -> Option<ViewUpdate> {
        let initial = self.awaiting_first_batch;
        if initial {
            self.pagination.observe_initial(&batch);
            self.awaiting_first_batch = false;
        } else {
            self.pagination.observe(&batch);
        }

        let recovered = matches!(self.error, Some(ViewError::Subscription(_)));
        if recovered {
            self.error = None;
        }

        let previous_first = self.messages.first().cloned();
        let summary = self.merge_in(&batch);

        if initial {
            return Some(self.update(self.policy.on_initial_load()));
        }
        if summary.is_unchanged() && !recovered {
            return None;
        }

        let scroll = self
            .policy
            .on_live_batch(previous_first.as_ref(), &summary, &self.viewport);
        match &scroll {
            ScrollAction::ShowNewMessages { count } => self.unseen += count,
            ScrollAction::ScrollToBottom => self.unseen = 0,
            _ => {}
        }
        Some(self.update(scroll))
    }

    pub fn begin_load_older(&mut self) -> BeginFetch {
        let begin = self.pagination.begin();
        if matches!(begin, BeginFetch::Start(_))
            && matches!(self.error, Some(ViewError::PaginationFetch(_)))
        {
            self.error = None;
        }
        if self.config.enable_debug_logging {
            tracing::debug!(
                target: "murmur::message_sync::engine",
                "Load older in {}: {:?}",
                self.conversation_id,
                begin
            );
        }
        begin
    }

    pub fn apply_older_batch(&mut self, batch: Vec<Message>) -> ViewUpdate {
        let state = self.pagination.complete(&batch);
        let previous_first = self.messages.first().cloned();
        let summary = self.merge_in(&batch);

        if self.config.enable_debug_logging {
            tracing::debug!(
                target: "murmur::message_sync::engine",
                "Older page of {} for {} added {}, pagination now {:?}",
                batch.len(),
                self.conversation_id,
                summary.added,
                state
            );
        }

        self.update(self.policy.on_older_page(previous_first.as_ref(), &summary))
    }

    pub fn apply_older_failure(&mut self, reason: String) -> ViewUpdate {
        self.pagination.fail();
        self.error = Some(ViewError::PaginationFetch(reason));
        self.update(ScrollAction::Unchanged)
    }

    /// Records a live-feed failure. The working sequence is kept as is.
    pub fn apply_subscription_error(&mut self, reason: String) -> ViewUpdate {
        self.awaiting_first_batch = false;
        self.error = Some(ViewError::Subscription(reason));
        self.update(ScrollAction::Unchanged)
    }

    /// Prepares for a fresh live feed on the same conversation; the next window
    /// is merged like any other live batch.
    pub fn reattach(&mut self) {
        if self.messages.is_empty() {
            self.awaiting_first_batch = true;
        }
    }

    /// Stores the reported viewport. Returns an update when reaching the bottom
    /// cleared the new-messages affordance or the scroll button flipped.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Option<ViewUpdate> {
        let threshold = self.config.scroll_button_threshold;
        let button_before = self.viewport.shows_scroll_button(threshold);
        self.viewport = viewport;

        let cleared = self.unseen > 0 && viewport.is_near_bottom(self.policy.near_bottom_threshold);
        if cleared {
            self.unseen = 0;
        }

        (cleared || button_before != viewport.shows_scroll_button(threshold))
            .then(|| self.update(ScrollAction::Unchanged))
    }

    pub fn view(&self) -> ConversationView {
        ConversationView {
            conversation_id: self.conversation_id.clone(),
            groups: group_by_day(&self.messages, &self.offset, &self.config.date_label_format),
            message_count: self.messages.len(),
            loading: self.awaiting_first_batch,
            loading_older: self.pagination.is_fetching(),
            has_more: self.pagination.has_more(),
            error: self.error.clone(),
            unseen_messages: self.unseen,
            show_scroll_button: self
                .viewport
                .shows_scroll_button(self.config.scroll_button_threshold),
        }
    }

    pub fn update(&self, scroll: ScrollAction) -> ViewUpdate {
        ViewUpdate {
            view: self.view(),
            scroll,
        }
    }

    fn merge_in(&mut self, batch: &[Message]) -> MergeSummary {
        let merged = merge(&self.messages, batch);
        let summary = MergeSummary::between(&self.messages, &merged);
        self.messages = merged;

        if self.config.enable_debug_logging {
            tracing::debug!(
                target: "murmur::message_sync::engine",
                "Merged {} incoming into {}: {:?}",
                batch.len(),
                self.conversation_id,
                summary
            );
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::murmur::message_sync::merge::is_canonical;
    use crate::types::UserId;
    use chrono::{TimeZone, Utc};

    fn msg(id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: ConversationId::new("a_b"),
            sender_id: UserId::new("a"),
            sender_display_name: "A".to_string(),
            text: id.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    /// Newest-first window of `size` messages ending at `newest`.
    fn window(newest: i64, size: i64) -> Vec<Message> {
        (0..size)
            .map(|i| msg(&format!("m{:04}", newest - i), newest - i))
            .collect()
    }

    fn engine() -> ConversationEngine {
        ConversationEngine::new(ConversationId::new("a_b"), SyncConfig::default()).unwrap()
    }

    #[test]
    fn initial_batch_scrolls_to_bottom() {
        let mut engine = engine();
        assert!(engine.view().loading);

        let update = engine.apply_live_batch(window(1000, 25)).unwrap();

        assert_eq!(update.scroll, ScrollAction::ScrollToBottom);
        assert!(!update.view.loading);
        assert!(update.view.has_more);
        assert_eq!(update.view.message_count, 25);
        assert!(is_canonical(engine.messages()));
    }

    #[test]
    fn short_initial_batch_exhausts_pagination() {
        let mut engine = engine();
        engine.apply_live_batch(window(1000, 3));
        assert_eq!(engine.pagination_state(), PaginationState::Exhausted);
        assert_eq!(engine.begin_load_older(), BeginFetch::Exhausted);
    }

    #[test]
    fn older_page_prepends_and_anchors() {
        let mut engine = engine();
        engine.apply_live_batch(window(1000, 25));
        let first_before = engine.messages()[0].id.clone();

        assert!(matches!(engine.begin_load_older(), BeginFetch::Start(_)));
        assert!(engine.view().loading_older);
        let update = engine.apply_older_batch(window(975, 25));

        assert_eq!(update.view.message_count, 50);
        assert_eq!(
            update.scroll,
            ScrollAction::PreserveAnchor {
                message_id: first_before
            }
        );
        assert!(!update.view.loading_older);
        assert!(is_canonical(engine.messages()));
    }

    #[test]
    fn live_append_near_bottom_scrolls_and_far_shows_affordance() {
        let mut engine = engine();
        engine.apply_live_batch(window(1000, 25));

        engine.set_viewport(Viewport::new(450.0, 1000.0, 400.0));
        let near = engine.apply_live_batch(window(1001, 25)).unwrap();
        assert_eq!(near.scroll, ScrollAction::ScrollToBottom);

        engine.set_viewport(Viewport::new(350.0, 1000.0, 400.0));
        let far = engine.apply_live_batch(window(1002, 25)).unwrap();
        assert_eq!(far.scroll, ScrollAction::ShowNewMessages { count: 1 });
        assert_eq!(far.view.unseen_messages, 1);

        let cleared = engine
            .set_viewport(Viewport::new(600.0, 1000.0, 400.0))
            .unwrap();
        assert_eq!(cleared.view.unseen_messages, 0);
    }

    #[test]
    fn replayed_window_produces_no_update() {
        let mut engine = engine();
        engine.apply_live_batch(window(1000, 25));
        assert!(engine.apply_live_batch(window(1000, 25)).is_none());
        assert_eq!(engine.messages().len(), 25);
    }

    #[test]
    fn messages_leaving_live_window_are_kept() {
        let mut engine = engine();
        engine.apply_live_batch(window(1000, 25));
        engine.apply_live_batch(window(1010, 25));
        assert_eq!(engine.messages().len(), 35);
    }

    #[test]
    fn pagination_failure_keeps_sequence_and_allows_retry() {
        let mut engine = engine();
        engine.apply_live_batch(window(1000, 25));
        let cursor = engine.begin_load_older();

        let update = engine.apply_older_failure("offline".to_string());
        assert_eq!(update.view.message_count, 25);
        assert_eq!(
            update.view.error,
            Some(ViewError::PaginationFetch("offline".to_string()))
        );

        assert_eq!(engine.begin_load_older(), cursor);
        assert!(engine.error().is_none());
    }

    #[test]
    fn subscription_error_keeps_sequence_until_recovered() {
        let mut engine = engine();
        engine.apply_live_batch(window(1000, 25));

        let update = engine.apply_subscription_error("dropped".to_string());
        assert_eq!(update.view.message_count, 25);
        assert!(matches!(update.view.error, Some(ViewError::Subscription(_))));

        engine.reattach();
        let recovered = engine.apply_live_batch(window(1000, 25)).unwrap();
        assert!(recovered.view.error.is_none());
        assert_eq!(recovered.view.message_count, 25);
    }

    #[test]
    fn view_groups_flatten_to_working_sequence() {
        let mut engine = engine();
        engine.apply_live_batch(vec![msg("late", 86_400 + 10), msg("early", 10)]);
        let view = engine.view();

        assert_eq!(view.groups.len(), 2);
        let ids: Vec<_> = view.messages().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }
}
