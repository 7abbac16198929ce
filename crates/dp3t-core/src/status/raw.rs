//! Raw status payload as produced by the native backend
//!
//! Same shape as [`TracingStatus`](super::TracingStatus), except that
//! `lastSyncDate` and every `matchedContacts[].reportDate` arrive as
//! epoch-millisecond strings and may be missing altogether. Bridges are not
//! consistent about strings versus numbers, so both are accepted for dates
//! and contact ids.

use serde::{Deserialize, Deserializer, Serialize};

use super::{HealthStatus, TracingState};
use crate::error::{ErrorKind, Result};

/// Raw status payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTracingStatus {
    pub tracing_state: TracingState,
    #[serde(default)]
    pub number_of_handshakes: u64,
    #[serde(default)]
    pub number_of_contacts: u64,
    pub health_status: HealthStatus,
    #[serde(default, deserialize_with = "optional_text")]
    pub last_sync_date: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorKind>,
    #[serde(default)]
    pub native_errors: Vec<String>,
    #[serde(default)]
    pub matched_contacts: Vec<RawMatchedContact>,
}

impl RawTracingStatus {
    /// A stopped, healthy status with nothing recorded
    pub fn idle() -> Self {
        Self {
            tracing_state: TracingState::Stopped,
            number_of_handshakes: 0,
            number_of_contacts: 0,
            health_status: HealthStatus::Healthy,
            last_sync_date: None,
            errors: Vec::new(),
            native_errors: Vec::new(),
            matched_contacts: Vec::new(),
        }
    }

    /// Decode a payload received from the native bridge
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }
}

/// Raw matched contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMatchedContact {
    #[serde(deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub report_date: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl TextOrNumber {
    fn into_text(self) -> String {
        match self {
            TextOrNumber::Text(text) => text,
            TextOrNumber::Integer(n) => n.to_string(),
            // Fractional millis are dropped; out-of-range values saturate
            TextOrNumber::Float(n) => (n.trunc() as i64).to_string(),
        }
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    TextOrNumber::deserialize(deserializer).map(TextOrNumber::into_text)
}

fn optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<TextOrNumber>::deserialize(deserializer)?.map(TextOrNumber::into_text))
}
