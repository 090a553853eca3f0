pub mod attributes;
pub mod logs;
pub mod messages;

/// Result of decoding one element of a nested JSON list. Malformed elements
/// are expected in the wild and are skipped, not propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome<T> {
    Decoded(T),
    Skipped { reason: String },
}

impl<T> DecodeOutcome<T> {
    pub fn decoded(self) -> Option<T> {
        match self {
            Self::Decoded(v) => Some(v),
            Self::Skipped { .. } => None,
        }
    }
}

/// Keep decoded values, logging every skipped element with `context`.
pub fn collect_decoded<T>(outcomes: Vec<DecodeOutcome<T>>, context: &str) -> Vec<T> {
    outcomes
        .into_iter()
        .enumerate()
        .filter_map(|(position, outcome)| match outcome {
            DecodeOutcome::Decoded(v) => Some(v),
            DecodeOutcome::Skipped { reason } => {
                tracing::warn!(context, position, %reason, "skipping malformed element");
                None
            }
        })
        .collect()
}

/// Per-scan market selection. An empty id accepts every market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketFilter(Option<String>);

impl MarketFilter {
    pub fn new(market_id: &str) -> Self {
        if market_id.is_empty() {
            Self(None)
        } else {
            Self(Some(market_id.to_string()))
        }
    }

    pub fn any() -> Self {
        Self(None)
    }

    pub fn accepts(&self, market_id: &str) -> bool {
        self.0.as_deref().is_none_or(|wanted| wanted == market_id)
    }

    pub fn market_id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}
