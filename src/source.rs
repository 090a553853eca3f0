//! Where raw transactions come from, and how page fetches are retried.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Error;
use crate::types::RawTransaction;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// One page of an inclusive block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub from_block: u64,
    pub to_block: u64,
    pub skip: usize,
    pub limit: usize,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying: the upstream was briefly unreachable.
    #[error("transient fetch failure: {reason}")]
    Transient { reason: String },
    #[error("fetch failed: {reason}")]
    Permanent { reason: String },
}

impl FetchError {
    /// Classify an upstream error message. Unavailability and refused
    /// connections are transient; everything else is permanent.
    pub fn from_message(message: impl Into<String>) -> Self {
        let reason = message.into();
        let lowered = reason.to_ascii_lowercase();
        if lowered.contains("unavailable") || lowered.contains("connection refused") {
            Self::Transient { reason }
        } else {
            Self::Permanent { reason }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Paginated access to transactions by block range.
pub trait TransactionSource {
    fn fetch_page(&mut self, request: &PageRequest) -> Result<Vec<RawTransaction>, FetchError>;
}

/// Bounded exponential backoff: `min(base_delay * 2^attempt, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Fetch one page, retrying transient failures under `policy`. `sleep` is
/// called between attempts.
pub fn fetch_with_retry<S, F>(
    source: &mut S,
    request: &PageRequest,
    policy: &RetryPolicy,
    sleep: F,
) -> Result<Vec<RawTransaction>, FetchError>
where
    S: TransactionSource + ?Sized,
    F: Fn(Duration),
{
    let mut attempt = 0u32;
    loop {
        match source.fetch_page(request) {
            Ok(page) => {
                if attempt > 0 {
                    debug!(attempt, "page fetched after retry");
                }
                return Ok(page);
            }
            Err(error) if error.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    %error,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis(),
                    "retryable fetch error, backing off"
                );
                sleep(delay);
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Transactions loaded from a JSON export, served in block order.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    transactions: Vec<RawTransaction>,
}

impl FileSource {
    /// Load a JSON array of transactions.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);
        let transactions: Vec<RawTransaction> =
            serde_json::from_reader(reader).map_err(|e| Error::Parse {
                reason: format!("{}: {e}", path.display()),
            })?;
        Ok(Self::from_transactions(transactions))
    }

    pub fn from_transactions(mut transactions: Vec<RawTransaction>) -> Self {
        transactions.sort_by_key(|tx| tx.block_number);
        Self { transactions }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionSource for FileSource {
    fn fetch_page(&mut self, request: &PageRequest) -> Result<Vec<RawTransaction>, FetchError> {
        Ok(self
            .transactions
            .iter()
            .filter(|tx| (request.from_block..=request.to_block).contains(&tx.block_number))
            .skip(request.skip)
            .take(request.limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::Write;

    use super::*;

    fn tx(hash: &str, block: u64) -> RawTransaction {
        RawTransaction {
            hash: hash.to_string(),
            block_number: block,
            ..RawTransaction::default()
        }
    }

    struct Scripted {
        responses: VecDeque<Result<Vec<RawTransaction>, FetchError>>,
        calls: usize,
    }

    impl TransactionSource for Scripted {
        fn fetch_page(&mut self, _: &PageRequest) -> Result<Vec<RawTransaction>, FetchError> {
            self.calls += 1;
            self.responses.pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    const REQUEST: PageRequest = PageRequest {
        from_block: 0,
        to_block: 10,
        skip: 0,
        limit: 10,
    };

    fn unavailable() -> FetchError {
        FetchError::from_message("rpc error: code = Unavailable desc = connection reset")
    }

    #[test]
    fn classifies_upstream_messages() {
        assert!(unavailable().is_transient());
        assert!(FetchError::from_message("dial tcp: connection refused").is_transient());
        assert!(!FetchError::from_message("invalid block range").is_transient());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let mut source = Scripted {
            responses: VecDeque::from([Err(unavailable()), Ok(vec![tx("0x1", 1)])]),
            calls: 0,
        };
        let slept = RefCell::new(Vec::new());
        let page = fetch_with_retry(&mut source, &REQUEST, &RetryPolicy::default(), |d| {
            slept.borrow_mut().push(d);
        })
        .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(source.calls, 2);
        assert_eq!(slept.into_inner(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn retries_stop_at_max_attempts() {
        let mut source = Scripted {
            responses: VecDeque::from([Err(unavailable()), Err(unavailable()), Err(unavailable())]),
            calls: 0,
        };
        let err = fetch_with_retry(&mut source, &REQUEST, &RetryPolicy::default(), |_| {})
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(source.calls, 3);
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let mut source = Scripted {
            responses: VecDeque::from([Err(FetchError::from_message("bad request"))]),
            calls: 0,
        };
        let err = fetch_with_retry(&mut source, &REQUEST, &RetryPolicy::default(), |_| {})
            .unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(source.calls, 1);
    }

    #[test]
    fn file_source_pages_in_block_order() {
        let mut source = FileSource::from_transactions(vec![
            tx("0xc", 30),
            tx("0xa", 10),
            tx("0xb", 20),
            tx("0xd", 40),
        ]);
        let hashes = |page: Vec<RawTransaction>| -> Vec<String> {
            page.into_iter().map(|t| t.hash).collect()
        };

        let request = PageRequest {
            from_block: 10,
            to_block: 30,
            skip: 0,
            limit: 2,
        };
        assert_eq!(hashes(source.fetch_page(&request).unwrap()), vec!["0xa", "0xb"]);
        let next = PageRequest { skip: 2, ..request };
        assert_eq!(hashes(source.fetch_page(&next).unwrap()), vec!["0xc"]);
        let past = PageRequest { skip: 4, ..request };
        assert!(source.fetch_page(&past).unwrap().is_empty());
    }

    #[test]
    fn file_source_reads_json_export() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"hash":"0x2","block_number":2,"logs":[]}},{{"hash":"0x1","block_number":1}}]"#
        )
        .unwrap();
        let source = FileSource::from_path(file.path()).unwrap();
        assert_eq!(source.len(), 2);

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "{{").unwrap();
        assert!(matches!(
            FileSource::from_path(broken.path()),
            Err(Error::Parse { .. })
        ));
    }
}
