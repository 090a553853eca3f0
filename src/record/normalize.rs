use serde::Serialize;

use crate::record::{CanonicalRecord, ExecutionDetails, OrderDetails, RecordDetails};

pub const ORDER_HEADER: [&str; 8] = [
    "OrderHash",
    "Block",
    "Action",
    "Price",
    "Quantity",
    "OrderType",
    "SubaccountID",
    "MarketID",
];

pub const TRADE_HEADER: [&str; 12] = [
    "OrderHash",
    "Block",
    "Action",
    "ExecPrice",
    "ExecQuantity",
    "ExecFee",
    "IsBuy",
    "IsLiquidation",
    "Pnl",
    "Payout",
    "SubaccountID",
    "MarketID",
];

/// Row for order-shaped actions. Field order matches [`ORDER_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderRow {
    pub order_hash: String,
    pub block: u64,
    pub action: String,
    pub price: String,
    pub quantity: String,
    pub order_type: String,
    #[serde(rename = "SubaccountID")]
    pub subaccount_id: String,
    #[serde(rename = "MarketID")]
    pub market_id: String,
}

/// Row for executions. Field order matches [`TRADE_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TradeRow {
    pub order_hash: String,
    pub block: u64,
    pub action: String,
    pub exec_price: String,
    pub exec_quantity: String,
    pub exec_fee: String,
    pub is_buy: bool,
    pub is_liquidation: bool,
    pub pnl: String,
    pub payout: String,
    #[serde(rename = "SubaccountID")]
    pub subaccount_id: String,
    #[serde(rename = "MarketID")]
    pub market_id: String,
}

impl OrderRow {
    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.order_hash.clone(),
            self.block.to_string(),
            self.action.clone(),
            self.price.clone(),
            self.quantity.clone(),
            self.order_type.clone(),
            self.subaccount_id.clone(),
            self.market_id.clone(),
        ]
    }
}

impl TradeRow {
    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.order_hash.clone(),
            self.block.to_string(),
            self.action.clone(),
            self.exec_price.clone(),
            self.exec_quantity.clone(),
            self.exec_fee.clone(),
            self.is_buy.to_string(),
            self.is_liquidation.to_string(),
            self.pnl.clone(),
            self.payout.clone(),
            self.subaccount_id.clone(),
            self.market_id.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputRow {
    Order(OrderRow),
    Trade(TradeRow),
}

/// Map a record onto its row shape, trimming numeric strings on the way.
pub fn normalize(record: &CanonicalRecord) -> OutputRow {
    match &record.details {
        RecordDetails::Order(OrderDetails {
            price,
            quantity,
            order_type,
            ..
        }) => OutputRow::Order(OrderRow {
            order_hash: record.order_hash.clone(),
            block: record.block,
            action: record.action.to_string(),
            price: trim_decimal(price),
            quantity: trim_decimal(quantity),
            order_type: order_type.clone(),
            subaccount_id: record.subaccount_id.clone(),
            market_id: record.market_id.clone(),
        }),
        RecordDetails::Execution(ExecutionDetails {
            exec_price,
            exec_quantity,
            exec_fee,
            is_buy,
            is_liquidation,
            pnl,
            payout,
        }) => OutputRow::Trade(TradeRow {
            order_hash: record.order_hash.clone(),
            block: record.block,
            action: record.action.to_string(),
            exec_price: trim_decimal(exec_price),
            exec_quantity: trim_decimal(exec_quantity),
            exec_fee: trim_decimal(exec_fee),
            is_buy: *is_buy,
            is_liquidation: *is_liquidation,
            pnl: trim_decimal(pnl),
            payout: trim_decimal(payout),
            subaccount_id: record.subaccount_id.clone(),
            market_id: record.market_id.clone(),
        }),
    }
}

/// Strip trailing fractional zeros and a bare trailing point from a plain
/// decimal string (`"1.50000"` → `"1.5"`, `"2.00"` → `"2"`).
///
/// Anything that is not `[sign]digits[.digits]` is returned unchanged.
pub fn trim_decimal(s: &str) -> String {
    let Some((int_part, frac_part)) = s.split_once('.') else {
        return s.to_string();
    };
    if !is_plain_decimal(int_part, frac_part) {
        return s.to_string();
    }

    let frac = frac_part.trim_end_matches('0');
    if !frac.is_empty() {
        return format!("{int_part}.{frac}");
    }
    if int_part.chars().any(|c| c.is_ascii_digit()) {
        int_part.to_string()
    } else {
        format!("{int_part}0")
    }
}

fn is_plain_decimal(int_part: &str, frac_part: &str) -> bool {
    let digits = int_part
        .strip_prefix('-')
        .or_else(|| int_part.strip_prefix('+'))
        .unwrap_or(int_part);
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    all_digits(digits) && all_digits(frac_part) && !(digits.is_empty() && frac_part.is_empty())
}
