//! Raw payload → canonical status
//!
//! Normalization is total and pure. Every raw payload yields exactly one
//! [`TracingStatus`]; malformed timestamps become [`Timestamp::Invalid`]
//! instead of failing.

use chrono::DateTime;
use tracing::warn;

use super::{ContactId, MatchedContact, RawTracingStatus, Timestamp, TracingStatus};
use crate::error::ErrorKind;

/// Largest magnitude, in milliseconds, of a representable instant
/// (±100,000,000 days around the epoch).
const MAX_EPOCH_MILLIS: i64 = 8_640_000_000_000_000;

/// Normalize a raw backend payload
///
/// - `lastSyncDate` is decoded as epoch milliseconds; absent stays `None`.
/// - each matched contact's `reportDate` is decoded the same way; an absent
///   report date cannot denote an instant and becomes invalid.
/// - `errors` and `nativeErrors` are paired by position. A shorter side is
///   padded (`ErrorKind::Other` / empty text) so both end up equally long.
pub fn normalize(raw: RawTracingStatus) -> TracingStatus {
    let (errors, native_errors) = pair_errors(raw.errors, raw.native_errors);

    TracingStatus {
        tracing_state: raw.tracing_state,
        number_of_handshakes: raw.number_of_handshakes,
        number_of_contacts: raw.number_of_contacts,
        health_status: raw.health_status,
        last_sync_date: raw.last_sync_date.as_deref().map(parse_epoch_millis),
        errors,
        native_errors,
        matched_contacts: raw
            .matched_contacts
            .into_iter()
            .map(|contact| MatchedContact {
                id: ContactId::new(contact.id),
                report_date: match contact.report_date {
                    Some(text) => parse_epoch_millis(&text),
                    None => Timestamp::Invalid(String::new()),
                },
            })
            .collect(),
    }
}

impl From<RawTracingStatus> for TracingStatus {
    fn from(raw: RawTracingStatus) -> Self {
        normalize(raw)
    }
}

/// Decode an epoch-millisecond string
///
/// Parsing follows JavaScript's `parseInt`: leading whitespace and an
/// optional sign are accepted, and only the leading run of decimal digits
/// counts (`"1589800000000.5"` and `"12abc"` both parse).
pub fn parse_epoch_millis(text: &str) -> Timestamp {
    let invalid = || Timestamp::Invalid(text.to_string());

    let trimmed = text.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = unsigned
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if end == 0 {
        return invalid();
    }

    let Ok(magnitude) = unsigned[..end].parse::<i64>() else {
        return invalid();
    };
    let millis = if negative { -magnitude } else { magnitude };
    if millis.abs() > MAX_EPOCH_MILLIS {
        return invalid();
    }

    match DateTime::from_timestamp_millis(millis) {
        Some(at) => Timestamp::At(at),
        None => invalid(),
    }
}

fn pair_errors(
    mut errors: Vec<ErrorKind>,
    mut native_errors: Vec<String>,
) -> (Vec<ErrorKind>, Vec<String>) {
    if errors.len() != native_errors.len() {
        warn!(
            "Backend reported {} error(s) but {} native error(s); padding the shorter list",
            errors.len(),
            native_errors.len()
        );
        let len = errors.len().max(native_errors.len());
        errors.resize(len, ErrorKind::Other);
        native_errors.resize(len, String::new());
    }
    (errors, native_errors)
}
