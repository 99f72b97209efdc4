//! Message synchronization for the active conversation.
//!
//! Two sources feed one working sequence:
//! - a live feed holding the newest [`DEFAULT_BATCH_SIZE`] messages, re-emitted
//!   on every change
//! - backward pagination fetching older pages below the oldest loaded message
//!
//! Both go through the same deduplicating [`merge`], after which the sequence
//! is grouped by calendar day and a scroll action is chosen. The
//! [`ConversationEngine`] owns all of that state for one conversation.

pub mod engine;
pub mod grouping;
pub mod live_feed;
pub mod merge;
pub mod pagination;
pub mod scroll;
pub mod types;

pub use engine::ConversationEngine;
pub use grouping::group_by_day;
pub use live_feed::LiveFeed;
pub use merge::{MergeSummary, compare_messages, merge};
pub use pagination::{BeginFetch, PaginationController, PaginationState, fetch_older};
pub use scroll::{ScrollAction, ScrollPolicy, Viewport};
pub use types::{
    ConversationView, DEFAULT_BATCH_SIZE, DEFAULT_NEAR_BOTTOM_THRESHOLD,
    DEFAULT_SCROLL_BUTTON_THRESHOLD, DayGroup, Message, SyncConfig, ViewError, ViewUpdate,
};
