#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::dbg_macro,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::panic,
    )
)]

pub mod config;
pub mod correlation;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod source;
pub mod types;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::ScanConfig;
pub use correlation::OrderHashIndex;
pub use error::Error;
pub use extract::MarketFilter;
pub use extract::logs::{EventClass, ExchangeEvent, classify_event, extract_log_records};
pub use extract::messages::{MessageKind, classify_message, extract_message_records, flatten_messages};
pub use pipeline::{ScanSummary, Scanner};
pub use record::normalize::{OrderRow, OutputRow, TradeRow, normalize, trim_decimal};
pub use record::{Action, CanonicalRecord, RecordDetails};
pub use sink::{CsvSink, RecordSink, RowBuffer};
pub use source::{FetchError, FileSource, PageRequest, RetryPolicy, TransactionSource};
pub use types::RawTransaction;
