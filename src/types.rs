use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a user as assigned by the hosted authentication service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Deterministic identifier of a two-party conversation.
///
/// Both participants derive the same key locally by sorting their ids, so no
/// lookup is needed to find the shared thread.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the conversation key for a pair of participants, independent of argument order.
    pub fn for_participants(a: &UserId, b: &UserId) -> Self {
        let mut pair = [a.as_str(), b.as_str()];
        pair.sort_unstable();
        Self(pair.join("_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Collection path holding this conversation's messages.
    pub fn messages_path(&self) -> String {
        format!("chats/{}/messages", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
