//! Scroll anchoring decisions after the working sequence changes.

use serde::{Deserialize, Serialize};

use crate::murmur::message_sync::merge::MergeSummary;
use crate::murmur::message_sync::types::Message;

/// Last reported geometry of the scrollable message list, in pixels.
///
/// The default viewport sits at the bottom of an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }

    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.distance_from_bottom() < threshold
    }

    /// Whether the jump-to-bottom button should be visible.
    pub fn shows_scroll_button(&self, threshold: f64) -> bool {
        self.scroll_height - self.scroll_top > self.client_height + threshold
    }
}

/// What the presentation layer should do with its scroll position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScrollAction {
    ScrollToBottom,
    /// Keep this message at the same on-screen position.
    PreserveAnchor { message_id: String },
    /// Stay put and show a "new messages" affordance.
    ShowNewMessages { count: usize },
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPolicy {
    pub near_bottom_threshold: f64,
}

impl ScrollPolicy {
    pub fn new(near_bottom_threshold: f64) -> Self {
        Self {
            near_bottom_threshold,
        }
    }

    pub fn on_initial_load(&self) -> ScrollAction {
        ScrollAction::ScrollToBottom
    }

    /// Older messages never move the reader: anchor at what was the first message.
    pub fn on_older_page(&self, previous_first: Option<&Message>, summary: &MergeSummary) -> ScrollAction {
        match previous_first {
            Some(first) if summary.prepended > 0 => ScrollAction::PreserveAnchor {
                message_id: first.id.clone(),
            },
            _ => ScrollAction::Unchanged,
        }
    }

    pub fn on_live_batch(
        &self,
        previous_first: Option<&Message>,
        summary: &MergeSummary,
        viewport: &Viewport,
    ) -> ScrollAction {
        if summary.appended > 0 {
            if viewport.is_near_bottom(self.near_bottom_threshold) {
                ScrollAction::ScrollToBottom
            } else {
                ScrollAction::ShowNewMessages {
                    count: summary.appended,
                }
            }
        } else {
            self.on_older_page(previous_first, summary)
        }
    }
}
