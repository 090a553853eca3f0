use std::str::FromStr;

use tracing::{debug, warn};

use crate::extract::attributes::{
    self, OrderDescriptor, TradeDescriptor, all_attributes, first_attribute,
};
use crate::extract::{MarketFilter, collect_decoded};
use crate::record::{CanonicalRecord, ExecutionDetails, OrderAction, OrderDetails, OrderRef};
use crate::types::{EventAttribute, LogEvent, RawTransaction, TxLog};

pub const EXCHANGE_EVENT_PREFIX: &str = "injective.exchange.v1beta1.";

/// Exchange events the extractor turns into records.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
    strum_macros::VariantNames,
)]
pub enum ExchangeEvent {
    #[strum(serialize = "injective.exchange.v1beta1.EventCancelDerivativeOrder")]
    CancelDerivativeOrder,
    #[strum(serialize = "injective.exchange.v1beta1.EventNewDerivativeOrders")]
    NewDerivativeOrders,
    #[strum(serialize = "injective.exchange.v1beta1.EventBatchDerivativeExecution")]
    BatchDerivativeExecution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    Known(ExchangeEvent),
    /// Exchange event we know about and have no use for.
    Benign,
    /// Exchange event nobody told us about; reported as schema drift.
    Unrecognized,
    /// Not an exchange event at all.
    Foreign,
}

pub fn classify_event(event_type: &str) -> EventClass {
    let Some(name) = event_type.strip_prefix(EXCHANGE_EVENT_PREFIX) else {
        return EventClass::Foreign;
    };
    if let Ok(known) = ExchangeEvent::from_str(event_type) {
        return EventClass::Known(known);
    }
    if name.contains("Spot")
        || name.contains("Fail")
        || name == "EventPerpetualMarketFundingUpdate"
        || name == "EventSubaccountWithdraw"
    {
        return EventClass::Benign;
    }
    EventClass::Unrecognized
}

/// Extract every record carried by a transaction's log events.
pub fn extract_log_records(
    tx: &RawTransaction,
    logs: &[TxLog],
    filter: &MarketFilter,
) -> Vec<CanonicalRecord> {
    let mut records = Vec::new();
    for event in logs.iter().flat_map(|l| l.events.iter()) {
        records.extend(extract_event(tx, event, filter));
    }
    records
}

/// Extract the records of a single log event.
pub fn extract_event(
    tx: &RawTransaction,
    event: &LogEvent,
    filter: &MarketFilter,
) -> Vec<CanonicalRecord> {
    match classify_event(&event.event_type) {
        EventClass::Known(ExchangeEvent::CancelDerivativeOrder) => {
            cancel_event(tx, &event.attributes, filter)
        }
        EventClass::Known(ExchangeEvent::NewDerivativeOrders) => {
            new_orders_event(tx, &event.attributes, filter)
        }
        EventClass::Known(ExchangeEvent::BatchDerivativeExecution) => {
            batch_execution_event(tx, &event.attributes, filter)
        }
        EventClass::Unrecognized => {
            warn!(
                tx_hash = %tx.hash,
                event_type = %event.event_type,
                attributes = event.attributes.len(),
                "unrecognized exchange event"
            );
            Vec::new()
        }
        EventClass::Benign | EventClass::Foreign => Vec::new(),
    }
}

fn top_level_market(attrs: &[EventAttribute]) -> String {
    attributes::scalar(attrs, "market_id").unwrap_or_default()
}

fn order_record(
    tx: &RawTransaction,
    action: OrderAction,
    order: OrderDescriptor,
) -> CanonicalRecord {
    let OrderDescriptor {
        order_info,
        order_type,
        margin,
        market_id,
        order_hash,
        ..
    } = order;
    CanonicalRecord::order(
        tx,
        action,
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

fn cancel_event(
    tx: &RawTransaction,
    attrs: &[EventAttribute],
    filter: &MarketFilter,
) -> Vec<CanonicalRecord> {
    let market_id = top_level_market(attrs);
    if !filter.accepts(&market_id) {
        return Vec::new();
    }

    let Some(raw) = first_attribute(attrs, "limit_order") else {
        debug!(tx_hash = %tx.hash, "cancel event without limit_order");
        return Vec::new();
    };
    match attributes::decode_value::<OrderDescriptor>(&raw.value) {
        Ok(order) => vec![order_record(
            tx,
            OrderAction::EventCancel,
            order.with_market_fallback(&market_id),
        )],
        Err(e) => {
            warn!(tx_hash = %tx.hash, reason = %e, "skipping malformed cancelled order");
            Vec::new()
        }
    }
}

fn new_orders_event(
    tx: &RawTransaction,
    attrs: &[EventAttribute],
    filter: &MarketFilter,
) -> Vec<CanonicalRecord> {
    let market_id = top_level_market(attrs);
    if !filter.accepts(&market_id) {
        return Vec::new();
    }

    let mut records = Vec::new();
    for side in ["buy_orders", "sell_orders"] {
        for attr in all_attributes(attrs, side) {
            let outcomes = match attributes::decode_list::<OrderDescriptor>(&attr.value) {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    warn!(tx_hash = %tx.hash, side, reason = %e, "skipping malformed order list");
                    continue;
                }
            };
            records.extend(collect_decoded(outcomes, side).into_iter().map(|order| {
                order_record(
                    tx,
                    OrderAction::EventNew,
                    order.with_market_fallback(&market_id),
                )
            }));
        }
    }
    records
}

fn batch_execution_event(
    tx: &RawTransaction,
    attrs: &[EventAttribute],
    filter: &MarketFilter,
) -> Vec<CanonicalRecord> {
    let market_id = top_level_market(attrs);
    if !filter.accepts(&market_id) {
        return Vec::new();
    }

    let is_buy = attributes::flag(attrs, "is_buy");
    let is_liquidation = attributes::flag(attrs, "is_liquidation");
    if let Some(execution_type) = attributes::scalar(attrs, "executionType") {
        debug!(tx_hash = %tx.hash, %execution_type, "batch execution");
    }

    let trades_raw = first_attribute(attrs, "trades").map_or("", |a| a.value.as_str());
    if trades_raw.trim().is_empty() {
        return Vec::new();
    }

    let outcomes = match attributes::decode_list::<TradeDescriptor>(trades_raw) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            warn!(tx_hash = %tx.hash, reason = %e, "skipping batch execution with malformed trades");
            return Vec::new();
        }
    };

    collect_decoded(outcomes, "trades")
        .into_iter()
        .map(|trade| {
            let TradeDescriptor {
                subaccount_id,
                order_hash,
                fee,
                payout,
                pnl,
                position_delta,
                ..
            } = trade;
            CanonicalRecord::execution(
                tx,
                OrderRef {
                    market_id: market_id.clone(),
                    subaccount_id,
                    order_hash,
                },
                ExecutionDetails {
                    exec_price: position_delta.execution_price,
                    exec_quantity: position_delta.execution_quantity,
                    exec_fee: fee,
                    is_buy,
                    is_liquidation,
                    pnl,
                    payout,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Action, RecordDetails};
    use strum::VariantNames;

    const MARKET: &str = "0x4ca0f92fc28be0c9761326016b5a1a2177dd6375558365116b5bdda9abc229ce";

    fn tx() -> RawTransaction {
        RawTransaction {
            hash: "0xtx".to_string(),
            block_number: 100,
            block_timestamp: "2024-12-27 17:03:37.467 +0000 UTC".to_string(),
            ..RawTransaction::default()
        }
    }

    fn attr(key: &str, value: impl Into<String>) -> EventAttribute {
        EventAttribute {
            key: key.to_string(),
            value: value.into(),
            index: false,
        }
    }

    fn event(event_type: &str, attributes: Vec<EventAttribute>) -> LogEvent {
        LogEvent {
            event_type: event_type.to_string(),
            attributes,
        }
    }

    fn order_json(subaccount: &str, cid: &str, hash: &str) -> serde_json::Value {
        serde_json::json!({
            "order_info": {
                "subaccount_id": subaccount,
                "fee_recipient": "inj1fee",
                "price": "27000.000000000000000000",
                "quantity": "0.010000000000000000",
                "cid": cid
            },
            "order_type": "BUY",
            "margin": "270.000000000000000000",
            "trigger_price": "0.000000000000000000",
            "order_hash": hash,
            "fillable": "0.010000000000000000"
        })
    }

    fn market_attr() -> EventAttribute {
        attr("market_id", format!("\"{MARKET}\""))
    }

    #[test]
    fn classify_known_benign_unknown_and_foreign() {
        for name in ExchangeEvent::VARIANTS {
            assert!(matches!(classify_event(name), EventClass::Known(_)), "{name}");
        }
        let benign = [
            "injective.exchange.v1beta1.EventNewSpotOrders",
            "injective.exchange.v1beta1.EventBatchSpotExecution",
            "injective.exchange.v1beta1.EventOrderFail",
            "injective.exchange.v1beta1.EventPerpetualMarketFundingUpdate",
            "injective.exchange.v1beta1.EventSubaccountWithdraw",
        ];
        for name in benign {
            assert_eq!(classify_event(name), EventClass::Benign, "{name}");
        }
        assert_eq!(
            classify_event("injective.exchange.v1beta1.EventSubaccountDeposit"),
            EventClass::Unrecognized
        );
        assert_eq!(classify_event("coin_spent"), EventClass::Foreign);
        assert_eq!(classify_event("message"), EventClass::Foreign);
    }

    #[test]
    fn cancel_event_emits_one_record_with_backfilled_market() {
        let ev = event(
            ExchangeEvent::CancelDerivativeOrder.as_ref(),
            vec![
                market_attr(),
                attr("limit_order", order_json("0xsub", "c1", "0xhash").to_string()),
                attr("cancel_type", "\"REGULAR\""),
            ],
        );

        let records = extract_event(&tx(), &ev, &MarketFilter::any());
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.action, Action::EventCancel);
        assert_eq!(rec.market_id, MARKET);
        assert_eq!(rec.order_hash, "0xhash");
        assert_eq!(rec.subaccount_id, "0xsub");
        let RecordDetails::Order(details) = &rec.details else {
            unreachable!("cancel events carry order details");
        };
        assert_eq!(details.order_type, "BUY");
        assert_eq!(details.margin, "270.000000000000000000");
    }

    #[test]
    fn market_filter_discards_whole_event() {
        let ev = event(
            ExchangeEvent::CancelDerivativeOrder.as_ref(),
            vec![
                market_attr(),
                attr("limit_order", order_json("0xsub", "c1", "0xhash").to_string()),
            ],
        );
        assert!(extract_event(&tx(), &ev, &MarketFilter::new("0xother")).is_empty());
        assert_eq!(extract_event(&tx(), &ev, &MarketFilter::new(MARKET)).len(), 1);
    }

    #[test]
    fn new_orders_event_covers_both_sides() {
        let buys = serde_json::json!([
            order_json("0xa", "c1", "0x1"),
            order_json("0xa", "c2", "0x2")
        ]);
        let sells = serde_json::json!([order_json("0xb", "c3", "0x3")]);
        let ev = event(
            ExchangeEvent::NewDerivativeOrders.as_ref(),
            vec![
                market_attr(),
                attr("buy_orders", buys.to_string()),
                attr("sell_orders", sells.to_string()),
            ],
        );

        let records = extract_event(&tx(), &ev, &MarketFilter::any());
        let hashes: Vec<&str> = records.iter().map(|r| r.order_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x1", "0x2", "0x3"]);
        assert!(records.iter().all(|r| r.action == Action::EventNew));
        assert!(records.iter().all(|r| r.market_id == MARKET));
    }

    #[test]
    fn malformed_middle_order_keeps_siblings() {
        let buys = serde_json::json!([
            order_json("0xa", "c1", "0x1"),
            {"order_info": "not an object"},
            order_json("0xa", "c3", "0x3")
        ]);
        let ev = event(
            ExchangeEvent::NewDerivativeOrders.as_ref(),
            vec![market_attr(), attr("buy_orders", buys.to_string())],
        );

        let records = extract_event(&tx(), &ev, &MarketFilter::any());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].order_hash, "0x1");
        assert_eq!(records[1].order_hash, "0x3");
    }

    #[test]
    fn unparseable_order_list_only_drops_that_side() {
        let ev = event(
            ExchangeEvent::NewDerivativeOrders.as_ref(),
            vec![
                market_attr(),
                attr("buy_orders", "[{broken"),
                attr(
                    "sell_orders",
                    serde_json::json!([order_json("0xb", "c9", "0x9")]).to_string(),
                ),
            ],
        );
        let records = extract_event(&tx(), &ev, &MarketFilter::any());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].order_hash, "0x9");
    }

    fn trade_json(subaccount: &str, hash: &str, price: &str) -> serde_json::Value {
        serde_json::json!({
            "subaccount_id": subaccount,
            "order_hash": hash,
            "fee": "1.250000",
            "payout": "0.000000",
            "pnl": "12.500000",
            "cid": "",
            "fee_recipient_address": "inj1fee",
            "position_delta": {
                "is_long": true,
                "execution_quantity": "0.500000",
                "execution_margin": "100.000000",
                "execution_price": price
            }
        })
    }

    #[test]
    fn batch_execution_flags_apply_to_every_trade() {
        let trades = serde_json::json!([
            trade_json("0xa", "0x1", "27000.100000"),
            trade_json("0xb", "0x2", "27000.200000")
        ]);
        let ev = event(
            ExchangeEvent::BatchDerivativeExecution.as_ref(),
            vec![
                market_attr(),
                attr("is_buy", "true"),
                attr("is_liquidation", "false"),
                attr("executionType", "\"LimitMatchNewOrder\""),
                attr("trades", trades.to_string()),
            ],
        );

        let records = extract_event(&tx(), &ev, &MarketFilter::any());
        assert_eq!(records.len(), 2);
        for rec in &records {
            assert_eq!(rec.action, Action::Execution);
            let RecordDetails::Execution(exec) = &rec.details else {
                unreachable!("executions carry execution details");
            };
            assert!(exec.is_buy);
            assert!(!exec.is_liquidation);
            assert_eq!(exec.exec_fee, "1.250000");
        }
        assert_ne!(records[0].details, records[1].details);
        assert_eq!(records[0].subaccount_id, "0xa");
        assert_eq!(records[1].order_hash, "0x2");
    }

    #[test]
    fn batch_execution_without_trades_emits_nothing() {
        let missing = event(
            ExchangeEvent::BatchDerivativeExecution.as_ref(),
            vec![market_attr(), attr("is_buy", "true")],
        );
        assert!(extract_event(&tx(), &missing, &MarketFilter::any()).is_empty());

        let empty = event(
            ExchangeEvent::BatchDerivativeExecution.as_ref(),
            vec![market_attr(), attr("trades", "[]")],
        );
        assert!(extract_event(&tx(), &empty, &MarketFilter::any()).is_empty());

        let broken = event(
            ExchangeEvent::BatchDerivativeExecution.as_ref(),
            vec![market_attr(), attr("trades", "[{\"fee\":")],
        );
        assert!(extract_event(&tx(), &broken, &MarketFilter::any()).is_empty());
    }

    #[test]
    fn foreign_and_unknown_events_are_ignored() {
        let logs = vec![TxLog {
            msg_index: None,
            events: vec![
                event("coin_received", vec![attr("amount", "1inj")]),
                event(
                    "injective.exchange.v1beta1.EventSomethingNew",
                    vec![market_attr()],
                ),
            ],
        }];
        assert!(extract_log_records(&tx(), &logs, &MarketFilter::any()).is_empty());
    }

    #[test]
    fn extract_log_records_walks_every_log_entry() {
        let cancel = event(
            ExchangeEvent::CancelDerivativeOrder.as_ref(),
            vec![
                market_attr(),
                attr("limit_order", order_json("0xsub", "c1", "0xc").to_string()),
            ],
        );
        let new_orders = event(
            ExchangeEvent::NewDerivativeOrders.as_ref(),
            vec![
                market_attr(),
                attr(
                    "buy_orders",
                    serde_json::json!([order_json("0xsub", "c2", "0xn")]).to_string(),
                ),
            ],
        );
        let logs = vec![
            TxLog {
                msg_index: Some(serde_json::json!("0")),
                events: vec![cancel],
            },
            TxLog {
                msg_index: Some(serde_json::json!("1")),
                events: vec![new_orders],
            },
        ];

        let records = extract_log_records(&tx(), &logs, &MarketFilter::any());
        let actions: Vec<Action> = records.iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![Action::EventCancel, Action::EventNew]);
        assert_eq!(records[1].block_timestamp, "2024-12-27 17:03:37.467 +0000 UTC");
    }
}
