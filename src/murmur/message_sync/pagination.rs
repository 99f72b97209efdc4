//! Backward pagination over a conversation's history.
//!
//! The controller tracks a low-watermark (the oldest timestamp ever merged) and
//! a three-state machine:
//!
//! ```text
//! Idle --begin--> Fetching --complete(len == batch)--> Idle
//!                     |    --complete(len <  batch)--> Exhausted
//!                     '----fail------------------------> Idle
//! ```
//!
//! `Exhausted` is terminal for the lifetime of the controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::murmur::backend::{BackendError, Direction, DocumentStore, Query};
use crate::murmur::message_sync::types::Message;
use crate::types::ConversationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationState {
    Idle,
    Fetching,
    Exhausted,
}

/// Result of asking the controller to start a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginFetch {
    /// Fetch messages strictly older than this cursor.
    Start(DateTime<Utc>),
    AlreadyFetching,
    Exhausted,
    /// Nothing has been loaded yet, so there is no cursor.
    NoWatermark,
}

#[derive(Debug, Clone)]
pub struct PaginationController {
    state: PaginationState,
    watermark: Option<DateTime<Utc>>,
    batch_size: usize,
}

impl PaginationController {
    pub fn new(batch_size: usize) -> Self {
        Self {
            state: PaginationState::Idle,
            watermark: None,
            batch_size,
        }
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn has_more(&self) -> bool {
        self.state != PaginationState::Exhausted
    }

    pub fn is_fetching(&self) -> bool {
        self.state == PaginationState::Fetching
    }

    /// Lowers the watermark to the oldest timestamp in `batch`. Never raises it.
    pub fn observe(&mut self, batch: &[Message]) {
        if let Some(oldest) = batch.iter().map(|m| m.timestamp).min() {
            self.watermark = Some(match self.watermark {
                Some(current) => current.min(oldest),
                None => oldest,
            });
        }
    }

    /// Records the first live-feed emission. A short first window means the
    /// whole conversation is already loaded.
    pub fn observe_initial(&mut self, batch: &[Message]) {
        self.observe(batch);
        if batch.len() < self.batch_size {
            self.state = PaginationState::Exhausted;
        }
    }

    pub fn begin(&mut self) -> BeginFetch {
        match self.state {
            PaginationState::Fetching => BeginFetch::AlreadyFetching,
            PaginationState::Exhausted => BeginFetch::Exhausted,
            PaginationState::Idle => match self.watermark {
                Some(cursor) => {
                    self.state = PaginationState::Fetching;
                    BeginFetch::Start(cursor)
                }
                None => BeginFetch::NoWatermark,
            },
        }
    }

    /// Finishes a successful fetch.
    pub fn complete(&mut self, batch: &[Message]) -> PaginationState {
        self.observe(batch);
        if self.state == PaginationState::Fetching {
            self.state = if batch.len() < self.batch_size {
                PaginationState::Exhausted
            } else {
                PaginationState::Idle
            };
        }
        self.state
    }

    /// Finishes a failed fetch; the watermark is untouched so a retry resumes
    /// from the same cursor.
    pub fn fail(&mut self) {
        if self.state == PaginationState::Fetching {
            self.state = PaginationState::Idle;
        }
    }
}

/// Fetches up to `batch_size` messages strictly older than `before`, newest first.
pub async fn fetch_older(
    store: &dyn DocumentStore,
    conversation_id: &ConversationId,
    before: DateTime<Utc>,
    batch_size: usize,
) -> Result<Vec<Message>, BackendError> {
    let query = Query::collection(conversation_id.messages_path())
        .order_by("timestamp", Direction::Descending)
        .before(before)
        .limit(batch_size);

    let documents = store.fetch_once(query).await?;
    Ok(documents
        .iter()
        .map(|doc| Message::from_document(conversation_id, doc))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::murmur::backend::{FieldValue, Fields, InMemoryStore, SetMode};
    use crate::types::UserId;
    use chrono::TimeZone;

    fn msg(id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: ConversationId::new("a_b"),
            sender_id: UserId::new("a"),
            sender_display_name: "A".to_string(),
            text: String::new(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn full_batch(start: i64, size: usize) -> Vec<Message> {
        (0..size as i64)
            .map(|i| msg(&format!("m{}", start + i), start + i))
            .collect()
    }

    #[test]
    fn begin_without_watermark_does_nothing() {
        let mut controller = PaginationController::new(25);
        assert_eq!(controller.begin(), BeginFetch::NoWatermark);
        assert_eq!(controller.state(), PaginationState::Idle);
    }

    #[test]
    fn short_initial_window_exhausts() {
        let mut controller = PaginationController::new(25);
        controller.observe_initial(&full_batch(100, 3));
        assert_eq!(controller.state(), PaginationState::Exhausted);
        assert_eq!(controller.begin(), BeginFetch::Exhausted);
    }

    #[test]
    fn full_page_returns_to_idle_and_short_page_exhausts() {
        let mut controller = PaginationController::new(25);
        controller.observe_initial(&full_batch(1000, 25));
        assert_eq!(controller.watermark(), Some(Utc.timestamp_opt(1000, 0).unwrap()));

        assert_eq!(
            controller.begin(),
            BeginFetch::Start(Utc.timestamp_opt(1000, 0).unwrap())
        );
        assert_eq!(controller.begin(), BeginFetch::AlreadyFetching);

        assert_eq!(controller.complete(&full_batch(900, 25)), PaginationState::Idle);
        assert_eq!(controller.watermark(), Some(Utc.timestamp_opt(900, 0).unwrap()));

        assert!(matches!(controller.begin(), BeginFetch::Start(_)));
        assert_eq!(controller.complete(&[]), PaginationState::Exhausted);
        assert_eq!(controller.begin(), BeginFetch::Exhausted);
        assert!(!controller.has_more());
    }

    #[test]
    fn watermark_never_moves_forward() {
        let mut controller = PaginationController::new(25);
        controller.observe(&[msg("old", 10)]);
        controller.observe(&[msg("new", 500)]);
        assert_eq!(controller.watermark(), Some(Utc.timestamp_opt(10, 0).unwrap()));
    }

    #[test]
    fn failure_keeps_cursor_for_retry() {
        let mut controller = PaginationController::new(2);
        controller.observe_initial(&[msg("a", 50), msg("b", 60)]);

        let first = controller.begin();
        controller.fail();
        assert_eq!(controller.state(), PaginationState::Idle);
        assert_eq!(controller.begin(), first);
    }

    #[tokio::test]
    async fn fetch_older_returns_strictly_older_newest_first() {
        let store = InMemoryStore::new();
        let conversation = ConversationId::new("a_b");
        for secs in 1..=5 {
            let mut fields = Fields::new();
            fields.insert(
                "timestamp".to_string(),
                FieldValue::Timestamp(Utc.timestamp_opt(secs, 0).unwrap()),
            );
            store
                .set_document(
                    &conversation.messages_path(),
                    &format!("m{}", secs),
                    fields,
                    SetMode::Overwrite,
                )
                .await
                .unwrap();
        }

        let page = fetch_older(&store, &conversation, Utc.timestamp_opt(4, 0).unwrap(), 2)
            .await
            .unwrap();

        let ids: Vec<_> = page.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m2"]);
        assert_eq!(store.fetch_count(), 1);
    }
}
