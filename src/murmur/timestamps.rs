//! Normalization of backend timestamp encodings.
//!
//! Message timestamps reach the client as native timestamps, as
//! `{seconds, nanoseconds}` maps, or as raw epoch-millisecond / RFC 3339
//! values. Every comparison in the sync engine goes through
//! [`resolve_timestamp`] so that all encodings order consistently.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::murmur::backend::FieldValue;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("Malformed timestamp: {0}")]
    Malformed(String),
}

/// Maps any supported timestamp encoding to a UTC instant.
pub fn resolve_timestamp(value: &FieldValue) -> Result<DateTime<Utc>, TimestampError> {
    match value {
        FieldValue::Timestamp(instant) => Ok(*instant),
        FieldValue::Map(fields) => {
            let seconds = fields
                .get("seconds")
                .or_else(|| fields.get("_seconds"))
                .and_then(FieldValue::as_i64)
                .ok_or_else(|| TimestampError::Malformed("missing seconds".to_string()))?;
            let nanos = fields
                .get("nanoseconds")
                .or_else(|| fields.get("_nanoseconds"))
                .map(|n| {
                    n.as_i64()
                        .ok_or_else(|| TimestampError::Malformed("non-integer nanoseconds".to_string()))
                })
                .transpose()?
                .unwrap_or(0);
            let nanos = u32::try_from(nanos)
                .ok()
                .filter(|n| *n < 1_000_000_000)
                .ok_or_else(|| TimestampError::Malformed(format!("nanoseconds out of range: {}", nanos)))?;
            Utc.timestamp_opt(seconds, nanos)
                .single()
                .ok_or_else(|| TimestampError::Malformed(format!("seconds out of range: {}", seconds)))
        }
        FieldValue::Integer(millis) => Utc
            .timestamp_millis_opt(*millis)
            .single()
            .ok_or_else(|| TimestampError::Malformed(format!("epoch millis out of range: {}", millis))),
        FieldValue::Double(millis) if millis.is_finite() => {
            let floor = millis.floor();
            let whole = floor as i64;
            // Remainder is always non-negative, so negative instants keep their sub-millisecond part
            let nanos = (((millis - floor) * 1_000_000.0).round() as i64).clamp(0, 999_999);
            Utc.timestamp_millis_opt(whole)
                .single()
                .map(|t| t + chrono::Duration::nanoseconds(nanos))
                .ok_or_else(|| TimestampError::Malformed(format!("epoch millis out of range: {}", millis)))
        }
        FieldValue::String(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| TimestampError::Malformed(format!("{}: {}", raw, e))),
        FieldValue::ServerTimestamp => Err(TimestampError::Malformed(
            "server timestamp not yet resolved".to_string(),
        )),
        other => Err(TimestampError::Malformed(format!("{:?}", other))),
    }
}

/// Resolves `value`, falling back to the current time when it is missing or malformed.
///
/// The fallback is logged and never surfaced as an error: a message with a bad
/// clock is still shown rather than dropped.
pub fn resolve_or_now(value: Option<&FieldValue>, document_id: &str) -> DateTime<Utc> {
    let resolved = match value {
        Some(value) => resolve_timestamp(value),
        None => Err(TimestampError::Malformed("missing".to_string())),
    };

    resolved.unwrap_or_else(|e| {
        tracing::warn!(
            target: "murmur::timestamps",
            "Substituting current time for message {}: {}",
            document_id,
            e
        );
        Utc::now()
    })
}
