use serde::{Deserialize, Deserializer};

use crate::error::Error;

/// A transaction row as returned by the explorer `GetTxs` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    /// Transaction hash (hex).
    pub hash: String,
    /// Height of the block the transaction landed in.
    pub block_number: u64,
    /// Explorer-formatted block time, e.g. `"2024-12-27 17:03:37.467 +0000 UTC"`.
    #[serde(default)]
    pub block_timestamp: String,
    /// JSON-encoded array of [`TxLog`] entries.
    #[serde(default, deserialize_with = "embedded_json")]
    pub logs: String,
    /// JSON-encoded array of transaction messages.
    #[serde(default, deserialize_with = "embedded_json")]
    pub messages: String,
}

impl RawTransaction {
    /// Decode the log blob. An empty blob means the transaction emitted no logs.
    pub fn decode_logs(&self) -> Result<Vec<TxLog>, Error> {
        if self.logs.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.logs).map_err(|e| Error::Parse {
            reason: format!("logs of tx {}: {e}", self.hash),
        })
    }

    /// Decode the message blob into opaque JSON messages.
    pub fn decode_messages(&self) -> Result<Vec<serde_json::Value>, Error> {
        if self.messages.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.messages).map_err(|e| Error::Parse {
            reason: format!("messages of tx {}: {e}", self.hash),
        })
    }
}

/// Exports either keep `logs`/`messages` as the encoded string the explorer
/// returns or inline the array; both end up as the encoded string.
fn embedded_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

/// One entry of a transaction's log array, scoped to a single message.
#[derive(Debug, Clone, Deserialize)]
pub struct TxLog {
    #[serde(default)]
    pub msg_index: Option<serde_json::Value>,
    #[serde(default)]
    pub events: Vec<LogEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

/// Flat key/value pair attached to a log event. Values of typed events are
/// themselves JSON-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub index: bool,
}
