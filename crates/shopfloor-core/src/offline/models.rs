//! Offline transaction model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use super::payload::{PayloadError, TransactionPayload};

/// How the user chose to settle a conflicting transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    KeepLocal,
    KeepServer,
    Merge,
}

impl ConflictResolution {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepLocal => "keep_local",
            Self::KeepServer => "keep_server",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep_local" | "local" => Ok(Self::KeepLocal),
            "keep_server" | "server" => Ok(Self::KeepServer),
            "merge" => Ok(Self::Merge),
            other => Err(format!(
                "unknown conflict resolution '{other}' (expected keep_local, keep_server or merge)"
            )),
        }
    }
}

/// A queued transaction as reported by the backend
///
/// Only the identifying columns are required. Null flags read as `false`,
/// timestamps without an offset are taken as UTC, and a resolution this
/// build does not know reads as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineTransaction {
    pub id: String,
    /// Serialized payload; decode with [`OfflineTransaction::payload`]
    pub transaction_data: String,
    pub transaction_type: String,
    pub device_id: String,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub synced: bool,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub conflict: bool,
    #[serde(default, deserialize_with = "known_resolution")]
    pub conflict_resolution: Option<ConflictResolution>,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
}

fn optional_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.and_then(|raw| parse_timestamp(&raw)))
}

fn known_resolution<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ConflictResolution>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match raw.parse() {
        Ok(resolution) => Ok(Some(resolution)),
        Err(error) => {
            tracing::debug!("Ignoring conflict resolution: {error}");
            Ok(None)
        }
    }
}

/// RFC 3339, Postgres text output (`2026-03-01 08:00:00.5+00`), or a naive
/// timestamp read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|naive| naive.and_utc())
        })
}

/// Display status derived from the sync/conflict flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Synced,
    Conflict,
    Resolved,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Conflict => "conflict",
            Self::Resolved => "resolved",
        };
        f.pad(label)
    }
}

impl OfflineTransaction {
    /// Decode the typed payload.
    ///
    /// Rows written by other clients may carry types this build does not
    /// know; they still list, but decoding them fails.
    pub fn payload(&self) -> Result<TransactionPayload, PayloadError> {
        TransactionPayload::decode(&self.transaction_type, &self.transaction_data)
    }

    pub const fn status(&self) -> TransactionStatus {
        if self.conflict {
            TransactionStatus::Conflict
        } else if self.synced {
            TransactionStatus::Synced
        } else if self.conflict_resolution.is_some() {
            TransactionStatus::Resolved
        } else {
            TransactionStatus::Pending
        }
    }

    /// A row must never be both conflicted and synced unless a resolution
    /// was recorded.
    pub const fn is_consistent(&self) -> bool {
        !(self.conflict && self.synced && self.conflict_resolution.is_none())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn transaction(synced: bool, conflict: bool) -> OfflineTransaction {
        OfflineTransaction {
            id: "tx-1".to_string(),
            transaction_data: r#"{"message":"hello"}"#.to_string(),
            transaction_type: "test".to_string(),
            device_id: "device-1".to_string(),
            created_at: DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            synced,
            synced_at: None,
            conflict,
            conflict_resolution: None,
        }
    }

    #[test]
    fn deserializes_backend_row_with_defaults() {
        let raw = r#"{
            "id": "9b0c",
            "transaction_data": "{\"message\":\"hi\"}",
            "transaction_type": "test",
            "device_id": "tablet-7",
            "created_at": "2026-03-01T08:00:00.123Z"
        }"#;
        let parsed: OfflineTransaction = serde_json::from_str(raw).unwrap();
        assert!(!parsed.synced);
        assert!(!parsed.conflict);
        assert_eq!(parsed.synced_at, None);
        assert_eq!(parsed.status(), TransactionStatus::Pending);
    }

    #[test]
    fn resolution_uses_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&ConflictResolution::KeepServer).unwrap(),
            "\"keep_server\""
        );
        let parsed: ConflictResolution = serde_json::from_str("\"merge\"").unwrap();
        assert_eq!(parsed, ConflictResolution::Merge);
    }

    #[test]
    fn resolution_parses_short_forms() {
        assert_eq!("local".parse::<ConflictResolution>(), Ok(ConflictResolution::KeepLocal));
        assert_eq!("Keep_Server".parse::<ConflictResolution>(), Ok(ConflictResolution::KeepServer));
        assert!("both".parse::<ConflictResolution>().is_err());
    }

    #[test]
    fn status_prefers_conflict_flag() {
        assert_eq!(transaction(false, true).status(), TransactionStatus::Conflict);
        assert_eq!(transaction(true, false).status(), TransactionStatus::Synced);

        let mut resolved = transaction(false, false);
        resolved.conflict_resolution = Some(ConflictResolution::KeepLocal);
        assert_eq!(resolved.status(), TransactionStatus::Resolved);
    }

    #[test]
    fn conflicted_and_synced_requires_resolution() {
        let mut row = transaction(true, true);
        assert!(!row.is_consistent());
        row.conflict_resolution = Some(ConflictResolution::Merge);
        assert!(row.is_consistent());
        assert!(transaction(false, true).is_consistent());
    }

    #[test]
    fn payload_decodes_from_row() {
        let payload = transaction(false, false).payload().unwrap();
        assert_eq!(
            payload,
            TransactionPayload::Test {
                message: "hello".to_string()
            }
        );
    }

    fn backend_row(overrides: &str) -> String {
        format!(
            r#"{{
                "id": "tx-9",
                "transaction_data": "{{\"message\":\"hi\"}}",
                "transaction_type": "test",
                "device_id": "tablet-7",
                "created_at": "2026-03-01T08:00:00Z"{overrides}
            }}"#
        )
    }

    #[test]
    fn null_flags_read_as_false() {
        let raw = backend_row(r#", "synced": null, "conflict": null, "synced_at": null"#);
        let parsed: OfflineTransaction = serde_json::from_str(&raw).unwrap();
        assert!(!parsed.synced);
        assert!(!parsed.conflict);
        assert_eq!(parsed.status(), TransactionStatus::Pending);
    }

    #[test]
    fn naive_and_postgres_timestamps_are_utc() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        for raw in [
            "2026-03-01T08:00:00.123456",
            "2026-03-01 08:00:00",
            "2026-03-01 08:00:00.123+00",
        ] {
            let parsed = parse_timestamp(raw).unwrap();
            assert_eq!(parsed.timestamp(), expected.timestamp(), "{raw}");
        }
        assert_eq!(parse_timestamp("yesterday"), None);

        let row = backend_row("").replace("2026-03-01T08:00:00Z", "2026-03-01T08:00:00.123456");
        let parsed: OfflineTransaction = serde_json::from_str(&row).unwrap();
        assert_eq!(parsed.created_at.timestamp(), expected.timestamp());
    }

    #[test]
    fn unknown_resolution_is_ignored() {
        let raw = backend_row(r#", "synced": true, "conflict_resolution": "manual""#);
        let parsed: OfflineTransaction = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.conflict_resolution, None);
        assert_eq!(parsed.status(), TransactionStatus::Synced);
    }
}
