use crate::admin::config::{FALLBACK_ERROR_CODE, SUCCESS_CODE};
use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Envelopes
// ============================================================================

/// Raw reply shape returned by every backend endpoint
#[derive(Deserialize, Debug, Clone)]
pub struct BackendEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// The one result shape business code consumes.
///
/// `success` is always `code == 200`, and `result` is `None` whenever the
/// backend omitted `data` or the call failed.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NormalizedResult<T> {
    pub success: bool,
    pub code: i64,
    pub message: String,
    pub result: Option<T>,
}

impl<T> NormalizedResult<T> {
    pub fn new(code: i64, message: impl Into<String>, result: Option<T>) -> Self {
        Self {
            success: code == SUCCESS_CODE,
            code,
            message: message.into(),
            result,
        }
    }

    /// Failed result; a 200 here is replaced by the fallback error code
    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        let code = if code == SUCCESS_CODE { FALLBACK_ERROR_CODE } else { code };
        Self::new(code, message, None)
    }

    /// Payload on success, `None` otherwise
    pub fn ok(self) -> Option<T> {
        if self.success {
            self.result
        } else {
            None
        }
    }
}

// ============================================================================
// Apps
// ============================================================================

/// Entry of `/api/app/getlist`
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AppSummary {
    #[serde(rename = "ID", deserialize_with = "deserialize_id")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
}

/// Reply of `/api/app/getinfo`
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AppDetail {
    #[serde(rename = "ID", deserialize_with = "deserialize_id")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notice: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub creat_time: i64,
    #[serde(default)]
    pub user_count: Option<u64>,
}

// ============================================================================
// Credentials
// ============================================================================

/// Kind of per-app user credential
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum CredentialKind {
    #[serde(rename = "Cardkey", alias = "CardKey", alias = "cardkey")]
    CardKey,
    #[serde(rename = "Serial", alias = "serial")]
    Serial,
}

impl CredentialKind {
    /// Value sent as `usertype`
    pub fn as_wire(&self) -> &'static str {
        match self {
            CredentialKind::CardKey => "Cardkey",
            CredentialKind::Serial => "Serial",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialKind::CardKey => "card key",
            CredentialKind::Serial => "serial",
        })
    }
}

/// Credential status as stored by the backend
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum CredentialStatus {
    #[serde(rename = "Active")]
    Active,
    #[serde(rename = "InActive", alias = "Inactive")]
    Inactive,
    #[serde(rename = "Freeze", alias = "Frozen")]
    Frozen,
    /// Any status this client does not know; never sent back
    #[serde(other)]
    Unknown,
}

impl CredentialStatus {
    pub fn as_wire(&self) -> &'static str {
        match self {
            CredentialStatus::Active => "Active",
            CredentialStatus::Inactive => "InActive",
            CredentialStatus::Frozen => "Freeze",
            CredentialStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Inactive => "inactive",
            CredentialStatus::Frozen => "frozen",
            CredentialStatus::Unknown => "unknown",
        })
    }
}

impl FromStr for CredentialStatus {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(CredentialStatus::Active),
            "inactive" => Ok(CredentialStatus::Inactive),
            "freeze" | "frozen" => Ok(CredentialStatus::Frozen),
            other => Err(ConsoleError::Validation(format!(
                "Unknown status '{}' (expected active, inactive or frozen)",
                other
            ))),
        }
    }
}

/// One credential as listed by `/api/user/getlist`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "WireCredential")]
pub struct Credential {
    pub id: u64,
    pub kind: CredentialKind,
    /// Card key or serial, depending on `kind`
    pub key: String,
    pub description: String,
    pub status: CredentialStatus,
    /// Granted time in seconds
    pub time_interval: u64,
    /// Expiry in epoch seconds, 0 = no expiry
    pub end_time: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireCredential {
    #[serde(rename = "ID", deserialize_with = "deserialize_id")]
    id: u64,
    #[serde(alias = "UserType")]
    usertype: CredentialKind,
    #[serde(default)]
    cardkey: String,
    #[serde(default)]
    serial: String,
    #[serde(default)]
    description: String,
    status: CredentialStatus,
    #[serde(default)]
    time_interval: u64,
    #[serde(default, alias = "EndTime")]
    endtime: i64,
}

impl From<WireCredential> for Credential {
    fn from(wire: WireCredential) -> Self {
        let key = match wire.usertype {
            CredentialKind::CardKey if !wire.cardkey.is_empty() => wire.cardkey,
            CredentialKind::Serial if !wire.serial.is_empty() => wire.serial,
            // older rows sometimes carry the key in the other column
            _ if !wire.cardkey.is_empty() => wire.cardkey,
            _ => wire.serial,
        };

        Credential {
            id: wire.id,
            kind: wire.usertype,
            key,
            description: wire.description,
            status: wire.status,
            time_interval: wire.time_interval,
            end_time: wire.endtime,
        }
    }
}

impl Credential {
    /// Case-insensitive substring match against key, description and kind
    pub fn matches(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        [
            self.key.as_str(),
            self.description.as_str(),
            self.kind.as_wire(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Reply of `/api/user/getinfo`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialDetail {
    #[serde(rename = "ID", deserialize_with = "deserialize_id")]
    pub id: u64,
    #[serde(rename = "CreatorID", default)]
    pub creator_id: u64,
    #[serde(alias = "Usertype")]
    pub user_type: CredentialKind,
    #[serde(default)]
    pub cardkey: String,
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub description: String,
    pub status: CredentialStatus,
    #[serde(default)]
    pub creat_time: i64,
    #[serde(default)]
    pub time_interval: u64,
    #[serde(default)]
    pub active_time: i64,
    #[serde(default)]
    pub end_time: i64,
    #[serde(default)]
    pub login_time: i64,
    #[serde(default)]
    pub login_ip: String,
}

// ============================================================================
// Display helpers
// ============================================================================

/// Render a duration in seconds as `1d 2h 3m`, dropping leading zero units
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0d 0h 0m".to_string();
    }

    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 || (days > 0 && minutes > 0) {
        parts.push(format!("{}h", hours));
    }
    parts.push(format!("{}m", minutes));
    parts.join(" ")
}

/// Render an epoch-seconds timestamp; 0 means "none"
pub fn format_timestamp(seconds: i64) -> String {
    if seconds == 0 {
        return "none".to_string();
    }
    match DateTime::from_timestamp(seconds, 0) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("invalid ({})", seconds),
    }
}

/// Backend IDs arrive as numbers or as numeric strings
fn deserialize_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n),
        RawId::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error types for console operations
#[derive(thiserror::Error, Debug)]
pub enum ConsoleError {
    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not logged in")]
    NotLoggedIn,
}
