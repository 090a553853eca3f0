pub mod normalize;

use crate::types::RawTransaction;

/// What a canonical record describes. The string form is the `Action`
/// column of the output rows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
    strum_macros::VariantNames,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Order observed in a new-orders log event.
    EventNew,
    /// Order observed in a cancel log event.
    EventCancel,
    /// Cancellation requested by a transaction message.
    CancelOrder,
    /// Order submitted by a transaction message.
    PlaceOrder,
    /// Fill reported by a batch execution log event.
    Execution,
}

/// Which output sink a record is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Order,
    Trade,
}

impl Action {
    pub fn row_kind(self) -> RowKind {
        match self {
            Self::EventNew | Self::EventCancel | Self::PlaceOrder | Self::CancelOrder => {
                RowKind::Order
            }
            Self::Execution => RowKind::Trade,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDetails {
    pub price: String,
    pub quantity: String,
    pub margin: String,
    pub order_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionDetails {
    pub exec_price: String,
    pub exec_quantity: String,
    pub exec_fee: String,
    pub is_buy: bool,
    pub is_liquidation: bool,
    pub pnl: String,
    pub payout: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDetails {
    Order(OrderDetails),
    Execution(ExecutionDetails),
}

/// The unified output of both extraction paths.
///
/// Order actions always carry [`RecordDetails::Order`] and `EXECUTION`
/// always carries [`RecordDetails::Execution`]; the constructors below are
/// the only way the crate builds records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub tx_hash: String,
    pub block: u64,
    pub block_timestamp: String,
    pub action: Action,
    pub market_id: String,
    pub subaccount_id: String,
    pub order_hash: String,
    pub details: RecordDetails,
}

/// Identity fields shared by every record kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderRef {
    pub market_id: String,
    pub subaccount_id: String,
    pub order_hash: String,
}

/// Order-shaped actions. `EXECUTION` is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    EventNew,
    EventCancel,
    CancelOrder,
    PlaceOrder,
}

impl From<OrderAction> for Action {
    fn from(action: OrderAction) -> Self {
        match action {
            OrderAction::EventNew => Self::EventNew,
            OrderAction::EventCancel => Self::EventCancel,
            OrderAction::CancelOrder => Self::CancelOrder,
            OrderAction::PlaceOrder => Self::PlaceOrder,
        }
    }
}

impl CanonicalRecord {
    pub fn order(
        tx: &RawTransaction,
        action: OrderAction,
        order_ref: OrderRef,
        details: OrderDetails,
    ) -> Self {
        Self::build(tx, action.into(), order_ref, RecordDetails::Order(details))
    }

    pub fn execution(tx: &RawTransaction, order_ref: OrderRef, details: ExecutionDetails) -> Self {
        Self::build(
            tx,
            Action::Execution,
            order_ref,
            RecordDetails::Execution(details),
        )
    }

    fn build(
        tx: &RawTransaction,
        action: Action,
        order_ref: OrderRef,
        details: RecordDetails,
    ) -> Self {
        let OrderRef {
            market_id,
            subaccount_id,
            order_hash,
        } = order_ref;
        Self {
            tx_hash: tx.hash.clone(),
            block: tx.block_number,
            block_timestamp: tx.block_timestamp.clone(),
            action,
            market_id,
            subaccount_id,
            order_hash,
            details,
        }
    }
}
