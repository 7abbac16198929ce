//! Tracing status model
//!
//! [`TracingStatus`] is the canonical, normalized record handed to
//! consumers. [`RawTracingStatus`] is the payload shape the native backend
//! returns and emits. [`normalize`] turns the latter into the former.
//!
//! A status is a value: it is recomputed on every refresh or event and
//! replaced wholesale, never mutated in place.

pub mod normalize;
pub mod raw;

pub use normalize::normalize;
pub use raw::{RawMatchedContact, RawTracingStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ErrorKind;

/// Whether the SDK is currently exchanging handshakes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingState {
    Started,
    Stopped,
    Error,
}

/// Exposure state of the user
///
/// `Infected` is sticky from the client's point of view: only the backend
/// can revert it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Exposed,
    Infected,
}

/// An instant decoded from a native timestamp
///
/// Decoding never fails: text that does not denote an instant becomes
/// [`Timestamp::Invalid`], which keeps the raw text for diagnostics.
/// Consumers must tolerate invalid-but-present instants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Timestamp {
    /// A valid UTC instant
    At(DateTime<Utc>),
    /// The "invalid date" sentinel
    Invalid(String),
}

impl Timestamp {
    /// The instant, if valid
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::At(at) => Some(*at),
            Timestamp::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Timestamp::At(_))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Timestamp::At(at)
    }
}

// Invalid dates serialize as null, the way an invalid JavaScript Date does.
impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timestamp::At(at) => at.serialize(serializer),
            Timestamp::Invalid(_) => serializer.serialize_none(),
        }
    }
}

/// Opaque identifier of a matched contact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contact later confirmed to have reported an infection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedContact {
    pub id: ContactId,
    pub report_date: Timestamp,
}

/// Canonical tracing status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingStatus {
    pub tracing_state: TracingState,
    pub number_of_handshakes: u64,
    pub number_of_contacts: u64,
    pub health_status: HealthStatus,
    /// `None` means the SDK has never synced
    pub last_sync_date: Option<Timestamp>,
    /// Domain-level errors; always the same length as `native_errors`
    pub errors: Vec<ErrorKind>,
    /// Raw backend error descriptions, paired by position with `errors`
    pub native_errors: Vec<String>,
    pub matched_contacts: Vec<MatchedContact>,
}

impl TracingStatus {
    /// Each error at both levels of detail
    pub fn error_pairs(&self) -> impl Iterator<Item = (ErrorKind, &str)> + '_ {
        self.errors
            .iter()
            .copied()
            .zip(self.native_errors.iter().map(String::as_str))
    }

    /// Check whether the SDK currently reports the given error kind
    pub fn has_error(&self, kind: ErrorKind) -> bool {
        self.errors.contains(&kind)
    }

    pub fn is_exposed(&self) -> bool {
        self.health_status == HealthStatus::Exposed
    }

    /// Valid instant of the last sync, if any
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_date.as_ref().and_then(Timestamp::instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> TracingStatus {
        TracingStatus {
            tracing_state: TracingState::Started,
            number_of_handshakes: 4,
            number_of_contacts: 2,
            health_status: HealthStatus::Exposed,
            last_sync_date: Some(Timestamp::Invalid("soon".to_string())),
            errors: vec![ErrorKind::BluetoothDisabled],
            native_errors: vec!["BLUETOOTH_OFF".to_string()],
            matched_contacts: vec![MatchedContact {
                id: ContactId::new("7"),
                report_date: Timestamp::At(DateTime::from_timestamp_millis(0).unwrap()),
            }],
        }
    }

    #[test]
    fn pairs_errors_by_position() {
        let status = status();
        let pairs: Vec<_> = status.error_pairs().collect();
        assert_eq!(pairs, vec![(ErrorKind::BluetoothDisabled, "BLUETOOTH_OFF")]);
        assert!(status.has_error(ErrorKind::BluetoothDisabled));
        assert!(!status.has_error(ErrorKind::Sync));
    }

    #[test]
    fn invalid_sync_date_has_no_instant() {
        let status = status();
        assert!(status.last_sync_date.is_some());
        assert_eq!(status.last_synced_at(), None);
    }

    #[test]
    fn serializes_with_camel_case_and_null_invalid_dates() {
        let json = serde_json::to_value(status()).unwrap();
        assert_eq!(json["tracingState"], "started");
        assert_eq!(json["healthStatus"], "exposed");
        assert_eq!(json["lastSyncDate"], serde_json::Value::Null);
        assert_eq!(json["matchedContacts"][0]["id"], "7");
        assert_eq!(
            json["matchedContacts"][0]["reportDate"],
            "1970-01-01T00:00:00Z"
        );
    }
}
