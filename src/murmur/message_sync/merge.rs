//! Deduplicating merge of message batches into the working sequence.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::murmur::message_sync::types::Message;

/// Canonical display order: timestamp ascending, id as tie-break.
pub fn compare_messages(a: &Message, b: &Message) -> Ordering {
    a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id))
}

/// Unions `existing` with `incoming` and returns the result in canonical order.
///
/// Ids are unique in the result. When an id appears more than once the first
/// occurrence wins, scanning `existing` before `incoming`. The function is
/// pure, so merging the same batch twice yields the same sequence.
pub fn merge(existing: &[Message], incoming: &[Message]) -> Vec<Message> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(existing.len() + incoming.len());
    let mut merged: Vec<Message> = existing
        .iter()
        .chain(incoming)
        .filter(|message| seen.insert(message.id.as_str()))
        .cloned()
        .collect();

    merged.sort_by(compare_messages);
    merged
}

pub fn is_canonical(sequence: &[Message]) -> bool {
    sequence
        .windows(2)
        .all(|pair| compare_messages(&pair[0], &pair[1]) == Ordering::Less)
}

/// Where a merge placed the messages it added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub added: usize,
    /// New messages that now sort before the previous first message
    pub prepended: usize,
    /// New messages that now sort after the previous last message
    pub appended: usize,
}

impl MergeSummary {
    /// Compares a sequence with the result of merging into it.
    ///
    /// `after` must be a merge result of `before`, so it contains every id of
    /// `before` in the same relative order.
    pub fn between(before: &[Message], after: &[Message]) -> Self {
        let added = after.len().saturating_sub(before.len());
        let (Some(first), Some(last)) = (before.first(), before.last()) else {
            return Self {
                added,
                prepended: 0,
                appended: added,
            };
        };

        let prepended = after.iter().take_while(|m| m.id != first.id).count();
        let appended = after
            .iter()
            .rev()
            .take_while(|m| m.id != last.id)
            .count();

        Self {
            added,
            prepended,
            appended,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.added == 0
    }
}
