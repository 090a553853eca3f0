//! Output sinks for normalized rows.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::record::normalize::{ORDER_HEADER, OrderRow, OutputRow, TRADE_HEADER, TradeRow};

/// Destination for normalized rows, one stream per row kind.
pub trait RecordSink {
    fn write_order(&mut self, row: &OrderRow) -> Result<(), Error>;
    fn write_trade(&mut self, row: &TradeRow) -> Result<(), Error>;
    fn flush(&mut self) -> Result<(), Error>;

    /// Route a row to the stream matching its kind.
    fn write_row(&mut self, row: &OutputRow) -> Result<(), Error> {
        match row {
            OutputRow::Order(order) => self.write_order(order),
            OutputRow::Trade(trade) => self.write_trade(trade),
        }
    }
}

/// Two CSV streams with fixed headers, written as soon as the sink exists.
pub struct CsvSink<W: Write> {
    orders: csv::Writer<W>,
    trades: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn from_writers(orders: W, trades: W) -> Result<Self, Error> {
        let mut orders = csv::Writer::from_writer(orders);
        let mut trades = csv::Writer::from_writer(trades);
        orders.write_record(ORDER_HEADER)?;
        trades.write_record(TRADE_HEADER)?;
        Ok(Self { orders, trades })
    }

    /// Flush and hand back the underlying writers.
    pub fn into_writers(self) -> Result<(W, W), Error> {
        let orders = self.orders.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        let trades = self.trades.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        Ok((orders, trades))
    }
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) both output files, creating parent directories.
    pub fn create(orders_path: &Path, trades_path: &Path) -> Result<Self, Error> {
        Self::from_writers(open_output(orders_path)?, open_output(trades_path)?)
    }
}

fn open_output(path: &Path) -> Result<BufWriter<File>, Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_order(&mut self, row: &OrderRow) -> Result<(), Error> {
        self.orders.write_record(row.to_fields())?;
        Ok(())
    }

    fn write_trade(&mut self, row: &TradeRow) -> Result<(), Error> {
        self.trades.write_record(row.to_fields())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.orders.flush()?;
        self.trades.flush()?;
        Ok(())
    }
}

/// In-memory sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBuffer {
    pub orders: Vec<OrderRow>,
    pub trades: Vec<TradeRow>,
    pub flushes: usize,
}

impl RecordSink for RowBuffer {
    fn write_order(&mut self, row: &OrderRow) -> Result<(), Error> {
        self.orders.push(row.clone());
        Ok(())
    }

    fn write_trade(&mut self, row: &TradeRow) -> Result<(), Error> {
        self.trades.push(row.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.flushes += 1;
        Ok(())
    }
}
