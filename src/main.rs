//! Scan a JSON export of exchange transactions into order and trade CSVs.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use exchange_scanner::config::{DEFAULT_CHUNK_SIZE, DEFAULT_PAGE_SIZE};
use exchange_scanner::{CsvSink, Error, FileSource, ScanConfig, ScanSummary, Scanner};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "exchange-scanner")]
#[command(about = "Extract derivative orders and trades from exchange transactions")]
struct Cli {
    /// JSON array of explorer transactions.
    #[arg(long)]
    input: PathBuf,

    /// First block to scan.
    #[arg(long)]
    start: u64,

    /// Last block to scan (inclusive).
    #[arg(long)]
    end: u64,

    /// Only keep records for this market id. Empty keeps every market.
    #[arg(long, default_value = "")]
    market: String,

    #[arg(long, default_value = "data/orders.csv")]
    orders_out: PathBuf,

    #[arg(long, default_value = "data/trades.csv")]
    trades_out: PathBuf,

    /// Also derive records from transaction messages.
    #[arg(long)]
    with_messages: bool,

    /// Blocks per chunk.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Transactions per page.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            market_id: self.market.clone(),
            start_block: self.start,
            end_block: self.end,
            chunk_size: self.chunk_size,
            page_size: self.page_size,
            include_messages: self.with_messages,
            ..ScanConfig::default()
        }
    }
}

fn run(cli: &Cli) -> Result<ScanSummary, Error> {
    let mut scanner = Scanner::new(cli.scan_config())?;
    let mut source = FileSource::from_path(&cli.input)?;
    info!(path = %cli.input.display(), transactions = source.len(), "loaded transactions");
    let mut sink = CsvSink::create(&cli.orders_out, &cli.trades_out)?;
    scanner.run(&mut source, &mut sink, std::thread::sleep)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(summary) => {
            info!(
                orders = summary.order_rows,
                trades = summary.trade_rows,
                orders_out = %cli.orders_out.display(),
                trades_out = %cli.trades_out.display(),
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "scan failed");
            ExitCode::FAILURE
        }
    }
}
