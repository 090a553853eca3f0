//! Per-transaction extraction and the chunked range scan that drives it.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::correlation::OrderHashIndex;
use crate::error::Error;
use crate::extract::MarketFilter;
use crate::extract::logs::extract_log_records;
use crate::extract::messages::extract_message_records;
use crate::record::CanonicalRecord;
use crate::record::normalize::{OutputRow, normalize};
use crate::sink::RecordSink;
use crate::source::{PageRequest, TransactionSource, fetch_with_retry};
use crate::types::RawTransaction;

/// Running counts of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub transactions: usize,
    pub skipped_transactions: usize,
    pub order_rows: usize,
    pub trade_rows: usize,
    pub failed_chunks: usize,
}

impl ScanSummary {
    fn count(&mut self, row: &OutputRow) {
        match row {
            OutputRow::Order(_) => self.order_rows += 1,
            OutputRow::Trade(_) => self.trade_rows += 1,
        }
    }
}

/// Sequential extractor. Owns the order-hash index, so transactions must be
/// fed in chain order for message records to resolve their hashes.
#[derive(Debug)]
pub struct Scanner {
    config: ScanConfig,
    filter: MarketFilter,
    index: OrderHashIndex,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self, Error> {
        config.validate()?;
        let filter = MarketFilter::new(&config.market_id);
        Ok(Self {
            config,
            filter,
            index: OrderHashIndex::new(),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn index(&self) -> &OrderHashIndex {
        &self.index
    }

    /// Extract the records of one transaction: log records first, then
    /// message records.
    ///
    /// Fails without touching the index when the log blob does not decode. A
    /// message blob that does not decode only costs the message records.
    pub fn extract_transaction(&mut self, tx: &RawTransaction) -> Result<Vec<CanonicalRecord>, Error> {
        let logs = tx.decode_logs()?;
        let mut records = extract_log_records(tx, &logs, &self.filter);
        if !self.config.include_messages {
            return Ok(records);
        }

        self.index.observe_logs(&logs);
        let messages = match tx.decode_messages() {
            Ok(messages) => messages,
            Err(e) => {
                warn!(tx_hash = %tx.hash, reason = %e, "skipping undecodable messages");
                return Ok(records);
            }
        };
        records.extend(
            extract_message_records(tx, messages, &self.index)
                .into_iter()
                .filter(|r| self.filter.accepts(&r.market_id)),
        );
        Ok(records)
    }

    /// Extract, normalize and write one transaction, then flush the sink.
    /// Undecodable transactions are counted as skipped; only sink errors fail.
    pub fn process_transaction<S>(
        &mut self,
        tx: &RawTransaction,
        sink: &mut S,
        summary: &mut ScanSummary,
    ) -> Result<(), Error>
    where
        S: RecordSink + ?Sized,
    {
        summary.transactions += 1;
        let records = match self.extract_transaction(tx) {
            Ok(records) => records,
            Err(e) => {
                warn!(tx_hash = %tx.hash, block = tx.block_number, reason = %e, "skipping transaction");
                summary.skipped_transactions += 1;
                return Ok(());
            }
        };

        for record in &records {
            let row = normalize(record);
            sink.write_row(&row)?;
            summary.count(&row);
        }
        sink.flush()
    }

    /// Scan the configured block range chunk by chunk, page by page.
    ///
    /// A page shorter than the page size ends its chunk. A fetch that still
    /// fails after retries abandons the chunk and the scan moves on.
    pub fn run<T, S, F>(&mut self, source: &mut T, sink: &mut S, sleep: F) -> Result<ScanSummary, Error>
    where
        T: TransactionSource + ?Sized,
        S: RecordSink + ?Sized,
        F: Fn(Duration),
    {
        let mut summary = ScanSummary::default();
        let chunks: Vec<(u64, u64)> = self.config.chunks().collect();
        info!(
            start_block = self.config.start_block,
            end_block = self.config.end_block,
            market_id = self.filter.market_id().unwrap_or("*"),
            chunks = chunks.len(),
            "starting scan"
        );

        for (from_block, to_block) in chunks {
            let mut skip = 0;
            loop {
                let request = PageRequest {
                    from_block,
                    to_block,
                    skip,
                    limit: self.config.page_size,
                };
                let page = match fetch_with_retry(source, &request, &self.config.retry, &sleep) {
                    Ok(page) => page,
                    Err(error) => {
                        warn!(from_block, to_block, skip, %error, "abandoning chunk");
                        summary.failed_chunks += 1;
                        break;
                    }
                };

                let fetched = page.len();
                for tx in &page {
                    self.process_transaction(tx, sink, &mut summary)?;
                }
                if fetched < self.config.page_size {
                    break;
                }
                skip += fetched;
            }
            info!(
                from_block,
                to_block,
                transactions = summary.transactions,
                orders = summary.order_rows,
                trades = summary.trade_rows,
                "chunk done"
            );
        }

        sink.flush()?;
        info!(
            transactions = summary.transactions,
            skipped = summary.skipped_transactions,
            orders = summary.order_rows,
            trades = summary.trade_rows,
            failed_chunks = summary.failed_chunks,
            "scan complete"
        );
        Ok(summary)
    }
}
