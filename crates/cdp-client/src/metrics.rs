//! Per-session command accounting.
//!
//! Each session owns one [`SessionMetrics`] next to its page state; counters
//! are keyed by how a command ended rather than a flat success/failure pair,
//! and latency is kept as a running total plus worst case — enough for the
//! performance tooling without a histogram.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Terminal state of one command round-trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The browser answered with a result.
    Answered,
    /// The browser answered with a protocol error.
    Refused,
    /// The per-command deadline expired first.
    TimedOut,
    /// The socket went away while the command was outstanding.
    Disconnected,
}

#[derive(Default)]
pub struct SessionMetrics {
    answered: AtomicU64,
    refused: AtomicU64,
    timed_out: AtomicU64,
    disconnected: AtomicU64,
    answered_latency_total_us: AtomicU64,
    answered_latency_max_us: AtomicU64,
}

/// Point-in-time view handed to callers; mean latency is derived here so the
/// hot path never divides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    pub commands: u64,
    pub answered: u64,
    pub refused: u64,
    pub timed_out: u64,
    pub disconnected: u64,
    pub mean_latency_us: u64,
    pub max_latency_us: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished command. Latency only feeds the mean/max for
    /// answered commands; a timeout's duration says nothing about the
    /// browser.
    pub fn record(&self, outcome: CommandOutcome, elapsed: Duration) {
        match outcome {
            CommandOutcome::Answered => {
                self.answered.fetch_add(1, Ordering::Relaxed);
                let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
                self.answered_latency_total_us
                    .fetch_add(micros, Ordering::Relaxed);
                self.answered_latency_max_us
                    .fetch_max(micros, Ordering::Relaxed);
            }
            CommandOutcome::Refused => {
                self.refused.fetch_add(1, Ordering::Relaxed);
            }
            CommandOutcome::TimedOut => {
                self.timed_out.fetch_add(1, Ordering::Relaxed);
            }
            CommandOutcome::Disconnected => {
                self.disconnected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn report(&self) -> MetricsReport {
        let answered = self.answered.load(Ordering::Relaxed);
        let refused = self.refused.load(Ordering::Relaxed);
        let timed_out = self.timed_out.load(Ordering::Relaxed);
        let disconnected = self.disconnected.load(Ordering::Relaxed);
        let total_us = self.answered_latency_total_us.load(Ordering::Relaxed);
        MetricsReport {
            commands: answered + refused + timed_out + disconnected,
            answered,
            refused,
            timed_out,
            disconnected,
            mean_latency_us: if answered == 0 { 0 } else { total_us / answered },
            max_latency_us: self.answered_latency_max_us.load(Ordering::Relaxed),
        }
    }
}
