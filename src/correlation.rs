use std::collections::HashMap;

use crate::extract::DecodeOutcome;
use crate::extract::attributes::{self, OrderDescriptor, all_attributes};
use crate::extract::logs::{EventClass, ExchangeEvent, classify_event};
use crate::types::TxLog;

/// Run-scoped `(subaccount id, client order id) → order hash` index.
///
/// Order-creation messages carry no chain-assigned hash; the hash only shows
/// up in the new-order log event. Feeding every new-order event through
/// [`OrderHashIndex::observe_logs`] before resolving messages joins the two.
/// Later observations overwrite earlier ones. Nothing is ever evicted.
#[derive(Debug, Default)]
pub struct OrderHashIndex {
    hashes: HashMap<(String, String), String>,
}

impl OrderHashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hash. Orders without a client order id can't be joined and are ignored.
    pub fn observe(&mut self, subaccount_id: &str, cid: &str, order_hash: &str) -> bool {
        if cid.is_empty() || order_hash.is_empty() {
            return false;
        }
        self.hashes.insert(
            (subaccount_id.to_string(), cid.to_string()),
            order_hash.to_string(),
        );
        true
    }

    pub fn resolve(&self, subaccount_id: &str, cid: &str) -> Option<&str> {
        self.hashes
            .get(&(subaccount_id.to_string(), cid.to_string()))
            .map(String::as_str)
    }

    /// Resolve, falling back to an empty hash on a miss.
    pub fn resolve_or_empty(&self, subaccount_id: &str, cid: &str) -> String {
        self.resolve(subaccount_id, cid)
            .unwrap_or_default()
            .to_string()
    }

    /// Fold every order of every new-order event into the index, regardless
    /// of market. Returns how many entries were written.
    ///
    /// Malformed lists and elements are skipped silently here; the log
    /// extractor reports them.
    pub fn observe_logs(&mut self, logs: &[TxLog]) -> usize {
        let mut observed = 0;
        let new_order_events = logs.iter().flat_map(|l| l.events.iter()).filter(|e| {
            classify_event(&e.event_type) == EventClass::Known(ExchangeEvent::NewDerivativeOrders)
        });
        for event in new_order_events {
            for side in ["buy_orders", "sell_orders"] {
                for attr in all_attributes(&event.attributes, side) {
                    let Ok(outcomes) = attributes::decode_list::<OrderDescriptor>(&attr.value)
                    else {
                        continue;
                    };
                    for order in outcomes.into_iter().filter_map(DecodeOutcome::decoded) {
                        if self.observe(
                            &order.order_info.subaccount_id,
                            &order.order_info.cid,
                            &order.order_hash,
                        ) {
                            observed += 1;
                        }
                    }
                }
            }
        }
        observed
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventAttribute, LogEvent};

    fn new_orders_log(orders: &serde_json::Value) -> TxLog {
        TxLog {
            msg_index: None,
            events: vec![LogEvent {
                event_type: ExchangeEvent::NewDerivativeOrders.as_ref().to_string(),
                attributes: vec![
                    EventAttribute {
                        key: "market_id".to_string(),
                        value: "\"0xm\"".to_string(),
                        index: false,
                    },
                    EventAttribute {
                        key: "buy_orders".to_string(),
                        value: orders.to_string(),
                        index: false,
                    },
                ],
            }],
        }
    }

    #[test]
    fn observe_and_resolve() {
        let mut index = OrderHashIndex::new();
        assert!(index.is_empty());
        assert!(index.observe("0xsub", "cid-1", "0xh1"));
        assert_eq!(index.resolve("0xsub", "cid-1"), Some("0xh1"));
        assert_eq!(index.resolve("0xsub", "cid-2"), None);
        assert_eq!(index.resolve("0xother", "cid-1"), None);
        assert_eq!(index.resolve_or_empty("0xsub", "cid-2"), "");
    }

    #[test]
    fn last_write_wins() {
        let mut index = OrderHashIndex::new();
        index.observe("0xsub", "cid-1", "0xold");
        index.observe("0xsub", "cid-1", "0xnew");
        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve("0xsub", "cid-1"), Some("0xnew"));
    }

    #[test]
    fn empty_cid_or_hash_is_not_indexed() {
        let mut index = OrderHashIndex::new();
        assert!(!index.observe("0xsub", "", "0xh"));
        assert!(!index.observe("0xsub", "cid", ""));
        assert!(index.is_empty());
    }

    #[test]
    fn observe_logs_reads_new_order_events() {
        let orders = serde_json::json!([
            {"order_info": {"subaccount_id": "0xa", "cid": "c1"}, "order_hash": "0x1"},
            {"order_info": {"subaccount_id": "0xa", "cid": ""}, "order_hash": "0x2"},
            "garbage",
            {"order_info": {"subaccount_id": "0xb", "cid": "c3"}, "order_hash": "0x3"}
        ]);
        let mut index = OrderHashIndex::new();
        assert_eq!(index.observe_logs(&[new_orders_log(&orders)]), 2);
        assert_eq!(index.resolve("0xa", "c1"), Some("0x1"));
        assert_eq!(index.resolve("0xb", "c3"), Some("0x3"));
    }

    #[test]
    fn unparseable_side_does_not_block_the_other() {
        let mut log = new_orders_log(&serde_json::json!([
            {"order_info": {"subaccount_id": "0xa", "cid": "c1"}, "order_hash": "0x1"}
        ]));
        log.events[0].attributes.push(EventAttribute {
            key: "sell_orders".to_string(),
            value: "{not a list".to_string(),
            index: false,
        });
        let mut index = OrderHashIndex::new();
        assert_eq!(index.observe_logs(&[log]), 1);
        assert_eq!(index.resolve("0xa", "c1"), Some("0x1"));
    }
}
