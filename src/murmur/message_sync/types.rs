use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::murmur::backend::Document;
use crate::murmur::error::{MurmurError, Result};
use crate::murmur::message_sync::scroll::ScrollAction;
use crate::murmur::timestamps::resolve_or_now;
use crate::types::{ConversationId, UserId};

/// Messages per live-feed emission and per older-page fetch.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Distance from the bottom edge under which live appends auto-scroll.
pub const DEFAULT_NEAR_BOTTOM_THRESHOLD: f64 = 200.0;

/// Extra distance past one viewport height before the jump-to-bottom button shows.
pub const DEFAULT_SCROLL_BUTTON_THRESHOLD: f64 = 50.0;

pub const DEFAULT_DATE_LABEL_FORMAT: &str = "%B %-d, %Y";

/// A chat message. Immutable once created by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Backend document id, the deduplication key
    pub id: String,

    pub conversation_id: ConversationId,

    pub sender_id: UserId,

    /// Display name captured at send time
    pub sender_display_name: String,

    pub text: String,

    /// Server-assigned send time
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Decodes a message document.
    ///
    /// Missing fields fall back to empty values and an unresolvable timestamp
    /// to the current time, so a partially written document is still shown.
    pub fn from_document(conversation_id: &ConversationId, document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            conversation_id: conversation_id.clone(),
            sender_id: UserId::new(document.get_str("sender").unwrap_or_default()),
            sender_display_name: document
                .get_str("senderName")
                .filter(|s| !s.is_empty())
                .unwrap_or("Unknown")
                .to_string(),
            text: document.get_str("text").unwrap_or_default().to_string(),
            timestamp: resolve_or_now(document.get("timestamp"), &document.id),
        }
    }
}

/// Tunables of the synchronization engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub batch_size: usize,
    pub near_bottom_threshold: f64,
    pub scroll_button_threshold: f64,
    /// Offset used to decide which calendar day a message belongs to
    pub utc_offset_seconds: i32,
    pub date_label_format: String,
    /// Whether to log every merge and pagination transition
    pub enable_debug_logging: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            near_bottom_threshold: DEFAULT_NEAR_BOTTOM_THRESHOLD,
            scroll_button_threshold: DEFAULT_SCROLL_BUTTON_THRESHOLD,
            utc_offset_seconds: 0,
            date_label_format: DEFAULT_DATE_LABEL_FORMAT.to_string(),
            enable_debug_logging: false,
        }
    }
}

impl SyncConfig {
    /// Builds a configuration from `MURMUR_*` environment variables (and a `.env`
    /// file, if present), falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| dotenvy::var(name).ok())
    }

    /// Same as [`SyncConfig::from_env`], reading variables through `lookup`.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = var("MURMUR_BATCH_SIZE") {
            config.batch_size = parse_var("MURMUR_BATCH_SIZE", &value)?;
        }
        if let Some(value) = var("MURMUR_NEAR_BOTTOM_THRESHOLD") {
            config.near_bottom_threshold = parse_var("MURMUR_NEAR_BOTTOM_THRESHOLD", &value)?;
        }
        if let Some(value) = var("MURMUR_SCROLL_BUTTON_THRESHOLD") {
            config.scroll_button_threshold = parse_var("MURMUR_SCROLL_BUTTON_THRESHOLD", &value)?;
        }
        if let Some(value) = var("MURMUR_UTC_OFFSET_SECONDS") {
            config.utc_offset_seconds = parse_var("MURMUR_UTC_OFFSET_SECONDS", &value)?;
        }
        if let Some(value) = var("MURMUR_DATE_LABEL_FORMAT") {
            config.date_label_format = value;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(MurmurError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }
        if !self.near_bottom_threshold.is_finite() || self.near_bottom_threshold < 0.0 {
            return Err(MurmurError::Configuration(format!(
                "invalid near-bottom threshold: {}",
                self.near_bottom_threshold
            )));
        }
        if !self.scroll_button_threshold.is_finite() || self.scroll_button_threshold < 0.0 {
            return Err(MurmurError::Configuration(format!(
                "invalid scroll button threshold: {}",
                self.scroll_button_threshold
            )));
        }
        self.utc_offset()?;
        if StrftimeItems::new(&self.date_label_format).any(|item| matches!(item, Item::Error)) {
            return Err(MurmurError::Configuration(format!(
                "invalid date label format: {}",
                self.date_label_format
            )));
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_seconds).ok_or_else(|| {
            MurmurError::Configuration(format!(
                "UTC offset out of range: {}",
                self.utc_offset_seconds
            ))
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MurmurError::Configuration(format!("invalid value for {}: {}", name, value)))
}

/// All messages of one calendar day, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    /// Human readable label, e.g. "January 5, 2024"
    pub label: String,
    pub messages: Vec<Message>,
}

/// Error surfaced to the presentation layer without touching the message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewError {
    /// Live feed could not attach or dropped; shown as a banner.
    Subscription(String),
    /// Older page failed; shown next to the load-more affordance.
    PaginationFetch(String),
}

/// Rendered state of the active conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationView {
    pub conversation_id: ConversationId,
    pub groups: Vec<DayGroup>,
    pub message_count: usize,
    /// True until the first live-feed emission arrives
    pub loading: bool,
    pub loading_older: bool,
    pub has_more: bool,
    pub error: Option<ViewError>,
    /// Live messages that arrived while the viewport was away from the bottom
    pub unseen_messages: usize,
    pub show_scroll_button: bool,
}

impl ConversationView {
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.groups.iter().flat_map(|g| g.messages.iter())
    }
}

/// One published change of the active conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewUpdate {
    pub view: ConversationView,
    pub scroll: ScrollAction,
}
