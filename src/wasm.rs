use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::ScanConfig;
use crate::extract::logs::{EventClass, classify_event};
use crate::pipeline::{ScanSummary, Scanner};
use crate::record::normalize::{self, OrderRow, TradeRow};
use crate::sink::RowBuffer;
use crate::types::RawTransaction;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Extracted<'a> {
    orders: &'a [OrderRow],
    trades: &'a [TradeRow],
    summary: ScanSummary,
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

fn error_result(msg: &str) -> JsValue {
    to_js(&serde_json::json!({"error": msg}))
}

/// Run a batch of transactions (JSON array, chain order) through a fresh
/// scanner and return `{ orders, trades, summary }`.
#[wasm_bindgen]
pub fn extract_transactions(transactions_json: &str, market_id: &str, include_messages: bool) -> JsValue {
    let transactions: Vec<RawTransaction> = match serde_json::from_str(transactions_json) {
        Ok(txs) => txs,
        Err(e) => return error_result(&format!("Invalid transactions JSON: {e}")),
    };

    let config = ScanConfig {
        market_id: market_id.to_string(),
        end_block: u64::MAX,
        include_messages,
        ..ScanConfig::default()
    };
    let mut scanner = match Scanner::new(config) {
        Ok(scanner) => scanner,
        Err(e) => return error_result(&e.to_string()),
    };

    let mut sink = RowBuffer::default();
    let mut summary = ScanSummary::default();
    for tx in &transactions {
        if let Err(e) = scanner.process_transaction(tx, &mut sink, &mut summary) {
            return error_result(&e.to_string());
        }
    }

    to_js(&Extracted {
        orders: &sink.orders,
        trades: &sink.trades,
        summary,
    })
}

/// Trim trailing fractional zeros from a decimal string.
#[wasm_bindgen]
pub fn trim_decimal(value: &str) -> String {
    normalize::trim_decimal(value)
}

/// `"known"`, `"benign"`, `"unrecognized"` or `"foreign"`.
#[wasm_bindgen]
pub fn classify_event_type(event_type: &str) -> String {
    match classify_event(event_type) {
        EventClass::Known(_) => "known",
        EventClass::Benign => "benign",
        EventClass::Unrecognized => "unrecognized",
        EventClass::Foreign => "foreign",
    }
    .to_string()
}
