//! Metrics for the onchain allowlist.

use std::time::Duration;

use vise::{Buckets, Counter, EncodeLabelSet, EncodeLabelValue, Family, Gauge, Histogram, Metrics};

use crate::AllowlistError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue, EncodeLabelSet)]
#[metrics(label = "outcome", rename_all = "snake_case")]
pub(crate) enum UpdateOutcome {
    Success,
    Error,
    Timeout,
    Cancelled,
}

impl UpdateOutcome {
    pub fn new(result: &Result<(), AllowlistError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(AllowlistError::Timeout(_)) => Self::Timeout,
            Err(AllowlistError::Cancelled) => Self::Cancelled,
            Err(_) => Self::Error,
        }
    }
}

#[derive(Debug, Metrics)]
#[metrics(prefix = "onchain_allowlist")]
pub(crate) struct AllowlistMetrics {
    /// Number of addresses in the currently served snapshot.
    pub size: Gauge<usize>,
    /// Block the currently served snapshot was read at.
    pub last_synced_block: Gauge<u64>,
    /// Number of refreshes grouped by their outcome.
    pub updates: Family<UpdateOutcome, Counter>,
    #[metrics(buckets = Buckets::LATENCIES)]
    pub update_latency: Histogram<Duration>,
    /// Number of `allow` checks that let the sender through.
    pub allowed_senders: Counter,
    /// Number of `allow` checks that rejected the sender.
    pub denied_senders: Counter,
    pub consecutive_failures: Gauge<u64>,
}

#[vise::register]
pub(crate) static METRICS: vise::Global<AllowlistMetrics> = vise::Global::new();
