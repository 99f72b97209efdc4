//! Types pushed to presentation-layer subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::murmur::message_sync::{ConversationView, ScrollAction, ViewUpdate};

/// What caused a view update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateTrigger {
    /// The conversation was opened and its working sequence reset.
    ConversationOpened,

    /// The first live-feed window arrived.
    InitialLoad,

    /// A later live-feed window changed the sequence.
    LiveBatch,

    /// An older page was requested.
    LoadOlderStarted,

    /// An older page was merged.
    OlderPage,

    /// The live feed failed to attach or dropped.
    SubscriptionFailed,

    /// An older page failed to load.
    LoadOlderFailed,

    /// The reported viewport changed the affordances.
    ViewportChanged,
}

/// One update of the active conversation, carrying the complete current view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub trigger: UpdateTrigger,

    pub view: ConversationView,

    /// How the presentation layer should adjust its scroll position.
    pub scroll: ScrollAction,
}

impl BatchUpdate {
    pub fn new(trigger: UpdateTrigger, update: ViewUpdate) -> Self {
        Self {
            trigger,
            view: update.view,
            scroll: update.scroll,
        }
    }
}

/// Result of subscribing to view updates.
///
/// `initial_view` is the state at subscription time (if a conversation is
/// open); everything after it arrives on `updates`.
pub struct ConversationSubscription {
    pub initial_view: Option<ConversationView>,

    pub updates: broadcast::Receiver<BatchUpdate>,
}
