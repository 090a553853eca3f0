//! Typed views over the flat attribute lists of exchange log events.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::Error;
use crate::extract::DecodeOutcome;
use crate::types::EventAttribute;

/// Treat an explicit JSON `null` the same as a missing field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderInfo {
    #[serde(default, deserialize_with = "nullable")]
    pub subaccount_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub fee_recipient: String,
    #[serde(default, deserialize_with = "nullable")]
    pub price: String,
    #[serde(default, deserialize_with = "nullable")]
    pub quantity: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cid: String,
}

/// A derivative limit order as carried by new-order and cancel events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderDescriptor {
    #[serde(default, deserialize_with = "nullable")]
    pub order_info: OrderInfo,
    #[serde(default, deserialize_with = "nullable")]
    pub order_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub margin: String,
    /// Often omitted on nested descriptors; see [`OrderDescriptor::with_market_fallback`].
    #[serde(default, deserialize_with = "nullable")]
    pub market_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub trigger_price: String,
    #[serde(default, deserialize_with = "nullable")]
    pub order_hash: String,
    #[serde(default, deserialize_with = "nullable")]
    pub fillable: String,
}

impl OrderDescriptor {
    /// Backfill the market id from the enclosing event when the descriptor has none.
    pub fn with_market_fallback(mut self, event_market_id: &str) -> Self {
        if self.market_id.is_empty() {
            self.market_id = event_market_id.to_string();
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PositionDelta {
    #[serde(default, deserialize_with = "nullable")]
    pub is_long: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub execution_quantity: String,
    #[serde(default, deserialize_with = "nullable")]
    pub execution_margin: String,
    #[serde(default, deserialize_with = "nullable")]
    pub execution_price: String,
}

/// One fill inside a batch execution event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TradeDescriptor {
    #[serde(default, deserialize_with = "nullable")]
    pub subaccount_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub order_hash: String,
    #[serde(default, deserialize_with = "nullable")]
    pub fee: String,
    #[serde(default, deserialize_with = "nullable")]
    pub payout: String,
    #[serde(default, deserialize_with = "nullable")]
    pub pnl: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cid: String,
    #[serde(default, deserialize_with = "nullable", alias = "fee_recipient")]
    pub fee_recipient_address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub position_delta: PositionDelta,
}

pub fn first_attribute<'a>(attrs: &'a [EventAttribute], key: &str) -> Option<&'a EventAttribute> {
    attrs.iter().find(|a| a.key == key)
}

pub fn all_attributes<'a>(
    attrs: &'a [EventAttribute],
    key: &'a str,
) -> impl Iterator<Item = &'a EventAttribute> + 'a {
    attrs.iter().filter(move |a| a.key == key)
}

/// First value for `key` with JSON string quoting removed.
pub fn scalar(attrs: &[EventAttribute], key: &str) -> Option<String> {
    first_attribute(attrs, key).map(|a| unquote(&a.value))
}

/// `true` only when the first value for `key` is the literal `true`.
pub fn flag(attrs: &[EventAttribute], key: &str) -> bool {
    first_attribute(attrs, key).is_some_and(|a| a.value == "true")
}

/// Typed events encode scalars as JSON strings (`"\"0xabc\""`); legacy events don't.
pub fn unquote(value: &str) -> String {
    match serde_json::from_str::<String>(value) {
        Ok(s) => s,
        Err(_) => value.trim_matches('"').to_string(),
    }
}

/// Decode a single JSON-encoded attribute value.
pub fn decode_value<T: DeserializeOwned>(raw: &str) -> Result<T, Error> {
    serde_json::from_str(raw).map_err(|e| Error::Parse {
        reason: format!("attribute value: {e}"),
    })
}

/// Decode a JSON-encoded array element by element.
///
/// The array itself must parse; each element then decodes independently so
/// one malformed descriptor does not drop its siblings.
pub fn decode_list<T: DeserializeOwned>(raw: &str) -> Result<Vec<DecodeOutcome<T>>, Error> {
    let elements: Vec<serde_json::Value> = serde_json::from_str(raw).map_err(|e| Error::Parse {
        reason: format!("attribute list: {e}"),
    })?;

    Ok(elements
        .into_iter()
        .map(|element| match serde_json::from_value::<T>(element) {
            Ok(v) => DecodeOutcome::Decoded(v),
            Err(e) => DecodeOutcome::Skipped {
                reason: e.to_string(),
            },
        })
        .collect())
}
