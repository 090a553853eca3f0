use crate::error::Error;
use crate::source::RetryPolicy;

pub const DEFAULT_CHUNK_SIZE: u64 = 100;
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Parameters of one range scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Empty scans every market.
    pub market_id: String,
    pub start_block: u64,
    /// Inclusive.
    pub end_block: u64,
    /// Blocks per chunk.
    pub chunk_size: u64,
    /// Transactions per page.
    pub page_size: usize,
    /// Also derive records from transaction messages.
    pub include_messages: bool,
    pub retry: RetryPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            market_id: String::new(),
            start_block: 0,
            end_block: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            include_messages: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.start_block > self.end_block {
            return Err(Error::Config {
                reason: format!(
                    "start block {} is after end block {}",
                    self.start_block, self.end_block
                ),
            });
        }
        if self.chunk_size == 0 {
            return Err(Error::Config {
                reason: "chunk size must be positive".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(Error::Config {
                reason: "page size must be positive".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                reason: "retry attempts must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Inclusive `(from, to)` block chunks covering the scan range.
    pub fn chunks(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let step = self.chunk_size.max(1);
        let mut next = Some(self.start_block);
        std::iter::from_fn(move || {
            let from = next.filter(|from| *from <= self.end_block)?;
            let to = from.saturating_add(step - 1).min(self.end_block);
            next = to.checked_add(1);
            Some((from, to))
        })
    }
}
