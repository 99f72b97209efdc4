use chrono::{FixedOffset, NaiveDate};

use crate::murmur::message_sync::types::{DayGroup, Message};

/// Calendar day of `message` at `offset`.
pub fn local_date(message: &Message, offset: &FixedOffset) -> NaiveDate {
    message.timestamp.with_timezone(offset).date_naive()
}

/// Partitions an ordered sequence into consecutive day groups.
///
/// `sequence` must already be in canonical order. With a fixed offset local
/// dates never decrease along the sequence, so each date yields exactly one
/// group and group order follows message order. `label_format` is a strftime
/// pattern and must have been validated.
pub fn group_by_day(sequence: &[Message], offset: &FixedOffset, label_format: &str) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();

    for message in sequence {
        let date = local_date(message, offset);
        match groups.last_mut() {
            Some(group) if group.date == date => group.messages.push(message.clone()),
            _ => groups.push(DayGroup {
                date,
                label: date.format(label_format).to_string(),
                messages: vec![message.clone()],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::murmur::message_sync::merge::merge;
    use crate::murmur::message_sync::types::DEFAULT_DATE_LABEL_FORMAT;
    use crate::types::{ConversationId, UserId};
    use chrono::{TimeZone, Utc};

    fn msg_at(id: &str, y: i32, m: u32, d: u32, h: u32) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: ConversationId::new("a_b"),
            sender_id: UserId::new("a"),
            sender_display_name: "A".to_string(),
            text: String::new(),
            timestamp: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn groups_by_day_with_labels() {
        let sequence = merge(
            &[],
            &[
                msg_at("a", 2024, 1, 5, 9),
                msg_at("b", 2024, 1, 5, 18),
                msg_at("c", 2024, 1, 6, 8),
            ],
        );

        let groups = group_by_day(&sequence, &utc(), DEFAULT_DATE_LABEL_FORMAT);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "January 5, 2024");
        assert_eq!(groups[0].messages.len(), 2);
        assert_eq!(groups[1].label, "January 6, 2024");
        assert_eq!(groups[1].messages[0].id, "c");
    }

    #[test]
    fn offset_moves_messages_across_midnight() {
        let sequence = vec![msg_at("late", 2024, 1, 5, 23), msg_at("early", 2024, 1, 6, 1)];

        let in_utc = group_by_day(&sequence, &utc(), DEFAULT_DATE_LABEL_FORMAT);
        assert_eq!(in_utc.len(), 2);

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let shifted = group_by_day(&sequence, &plus_two, DEFAULT_DATE_LABEL_FORMAT);
        assert_eq!(shifted.len(), 1);
        assert_eq!(shifted[0].label, "January 6, 2024");
    }

    #[test]
    fn flattening_groups_restores_the_sequence() {
        let sequence = merge(
            &[],
            &[
                msg_at("a", 2023, 12, 31, 23),
                msg_at("b", 2024, 1, 1, 0),
                msg_at("c", 2024, 1, 1, 12),
                msg_at("d", 2024, 2, 29, 12),
            ],
        );

        let groups = group_by_day(&sequence, &utc(), DEFAULT_DATE_LABEL_FORMAT);
        let flattened: Vec<_> = groups.into_iter().flat_map(|g| g.messages).collect();

        assert_eq!(flattened, sequence);
    }

    #[test]
    fn empty_sequence_has_no_groups() {
        assert!(group_by_day(&[], &utc(), DEFAULT_DATE_LABEL_FORMAT).is_empty());
    }
}
