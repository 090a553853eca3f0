use std::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::correlation::OrderHashIndex;
use crate::error::Error;
use crate::extract::attributes::{OrderInfo, nullable};
use crate::record::{CanonicalRecord, OrderAction, OrderDetails, OrderRef};
use crate::types::RawTransaction;

/// Authorization wrappers nested deeper than this are dropped.
pub const MAX_MESSAGE_DEPTH: usize = 16;

/// Message kinds the extractor understands. Anything else is [`MessageKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::AsRefStr)]
pub enum MessageKind {
    #[strum(serialize = "/cosmos.authz.v1beta1.MsgExec")]
    AuthzExec,
    #[strum(serialize = "/injective.exchange.v1beta1.MsgBatchUpdateOrders")]
    BatchUpdateOrders,
    #[strum(serialize = "/injective.exchange.v1beta1.MsgCreateDerivativeLimitOrder")]
    CreateDerivativeLimitOrder,
    #[strum(serialize = "/injective.exchange.v1beta1.MsgCreateDerivativeMarketOrder")]
    CreateDerivativeMarketOrder,
    #[strum(serialize = "/injective.exchange.v1beta1.MsgCancelDerivativeOrder")]
    CancelDerivativeOrder,
    Unknown,
}

/// The message's type tag: legacy `type` when present, otherwise `@type`.
pub fn message_type(msg: &serde_json::Value) -> Option<&str> {
    let tag = |key: &str| msg.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty());
    tag("type").or_else(|| tag("@type"))
}

pub fn classify_message(msg: &serde_json::Value) -> MessageKind {
    message_type(msg)
        .and_then(|t| MessageKind::from_str(t).ok())
        .unwrap_or(MessageKind::Unknown)
}

/// Legacy messages nest their fields under `value`; current ones are flat.
fn message_body(msg: &serde_json::Value) -> &serde_json::Value {
    match msg.get("value") {
        Some(body) if body.is_object() => body,
        _ => msg,
    }
}

fn decode_body<T: DeserializeOwned>(msg: &serde_json::Value, kind: MessageKind) -> Result<T, Error> {
    T::deserialize(message_body(msg)).map_err(|e| Error::Parse {
        reason: format!("{}: {e}", kind.as_ref()),
    })
}

#[derive(Deserialize)]
struct AuthzExecBody {
    #[serde(default, deserialize_with = "nullable")]
    msgs: Vec<serde_json::Value>,
}

/// An order as submitted in a create or batch-update message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DerivativeOrderParams {
    #[serde(default, deserialize_with = "nullable")]
    pub market_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub order_info: OrderInfo,
    #[serde(default, deserialize_with = "nullable")]
    pub order_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub margin: String,
    #[serde(default, deserialize_with = "nullable")]
    pub trigger_price: String,
}

/// A cancellation target. `order_hash` is optional; `cid` identifies the order otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderCancelTarget {
    #[serde(default, deserialize_with = "nullable")]
    pub market_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub subaccount_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub order_hash: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cid: String,
}

#[derive(Deserialize)]
struct BatchUpdateOrdersBody {
    #[serde(default, deserialize_with = "nullable")]
    derivative_orders_to_create: Vec<DerivativeOrderParams>,
    #[serde(default, deserialize_with = "nullable")]
    derivative_orders_to_cancel: Vec<OrderCancelTarget>,
}

#[derive(Deserialize)]
struct CreateDerivativeOrderBody {
    #[serde(default)]
    order: Option<DerivativeOrderParams>,
    #[serde(flatten)]
    flat: DerivativeOrderParams,
}

/// Replace every authorization wrapper with the messages it carries, at any depth.
pub fn flatten_messages(messages: Vec<serde_json::Value>) -> Vec<serde_json::Value> {
    let mut flat = Vec::with_capacity(messages.len());
    for msg in messages {
        flatten_into(msg, 0, &mut flat);
    }
    flat
}

fn flatten_into(msg: serde_json::Value, depth: usize, out: &mut Vec<serde_json::Value>) {
    if classify_message(&msg) != MessageKind::AuthzExec {
        out.push(msg);
        return;
    }
    if depth >= MAX_MESSAGE_DEPTH {
        warn!(depth, "dropping authorization wrapper nested too deeply");
        return;
    }
    match decode_body::<AuthzExecBody>(&msg, MessageKind::AuthzExec) {
        Ok(body) => {
            for inner in body.msgs {
                flatten_into(inner, depth + 1, out);
            }
        }
        Err(e) => warn!(reason = %e, "skipping malformed authorization wrapper"),
    }
}

/// Extract records from a transaction's messages. A message that fails to
/// decode is logged and skipped; its siblings still produce records.
pub fn extract_message_records(
    tx: &RawTransaction,
    messages: Vec<serde_json::Value>,
    index: &OrderHashIndex,
) -> Vec<CanonicalRecord> {
    let mut records = Vec::new();
    for msg in flatten_messages(messages) {
        match extract_message(tx, &msg, index) {
            Ok(extracted) => records.extend(extracted),
            Err(e) => warn!(
                tx_hash = %tx.hash,
                msg_type = message_type(&msg).unwrap_or_default(),
                reason = %e,
                "skipping malformed message"
            ),
        }
    }
    records
}

/// Extract the records of one message.
pub fn extract_message(
    tx: &RawTransaction,
    msg: &serde_json::Value,
    index: &OrderHashIndex,
) -> Result<Vec<CanonicalRecord>, Error> {
    let kind = classify_message(msg);
    match kind {
        MessageKind::AuthzExec => Ok(extract_message_records(tx, vec![msg.clone()], index)),
        MessageKind::BatchUpdateOrders => {
            let body: BatchUpdateOrdersBody = decode_body(msg, kind)?;
            let created = body
                .derivative_orders_to_create
                .into_iter()
                .map(|params| place_order_record(tx, params, index));
            let cancelled = body
                .derivative_orders_to_cancel
                .into_iter()
                .map(|params| cancel_order_record(tx, params, index));
            Ok(created.chain(cancelled).collect())
        }
        MessageKind::CreateDerivativeLimitOrder | MessageKind::CreateDerivativeMarketOrder => {
            let body: CreateDerivativeOrderBody = decode_body(msg, kind)?;
            let params = body.order.unwrap_or(body.flat);
            Ok(vec![place_order_record(tx, params, index)])
        }
        MessageKind::CancelDerivativeOrder => {
            let params: OrderCancelTarget = decode_body(msg, kind)?;
            Ok(vec![cancel_order_record(tx, params, index)])
        }
        MessageKind::Unknown => {
            debug!(tx_hash = %tx.hash, msg_type = message_type(msg).unwrap_or_default(), "ignoring message");
            Ok(Vec::new())
        }
    }
}

fn place_order_record(
    tx: &RawTransaction,
    params: DerivativeOrderParams,
    index: &OrderHashIndex,
) -> CanonicalRecord {
    let DerivativeOrderParams {
        market_id,
        order_info,
        order_type,
        margin,
        ..
    } = params;
    let order_hash = index.resolve_or_empty(&order_info.subaccount_id, &order_info.cid);
    CanonicalRecord::order(
        tx,
        OrderAction::PlaceOrder,
        OrderRef {
            market_id,
            subaccount_id: order_info.subaccount_id,
            order_hash,
        },
        OrderDetails {
            price: order_info.price,
            quantity: order_info.quantity,
            margin,
            order_type,
        },
    )
}

fn cancel_order_record(
    tx: &RawTransaction,
    params: OrderCancelTarget,
    index: &OrderHashIndex,
) -> CanonicalRecord {
    let OrderCancelTarget {
        market_id,
        subaccount_id,
        order_hash,
        cid,
    } = params;
    let order_hash = if order_hash.is_empty() {
        index.resolve_or_empty(&subaccount_id, &cid)
    } else {
        order_hash
    };
    CanonicalRecord::order(
        tx,
        OrderAction::CancelOrder,
        OrderRef {
            market_id,
            subaccount_id,
            order_hash,
        },
        OrderDetails::default(),
    )
}
