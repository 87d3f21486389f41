//! Per-peer clock offset/RTT estimation from `(t0, t1, t2)` round-trip
//! samples, smoothed by median over a bounded ring, and collapsed across
//! peers into a single consensus offset.

use std::collections::{HashMap, VecDeque};

use crate::config::ClockSyncConfig;

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

#[derive(Debug, Default)]
struct PeerClock {
    rtts: VecDeque<f64>,
    offsets: VecDeque<f64>,
}

/// Tracks clock-sync samples for every peer and derives a consensus
/// offset to apply to locally-stamped ticks.
#[derive(Debug)]
pub struct ClockSyncEstimator {
    config: ClockSyncConfig,
    peers: HashMap<u8, PeerClock>,
}

impl ClockSyncEstimator {
    /// Create an estimator tracking up to `config.max_samples` samples per
    /// peer.
    #[must_use]
    pub fn new(config: ClockSyncConfig) -> Self {
        Self {
            config,
            peers: HashMap::new(),
        }
    }

    /// Record one `(t0 local-send, t1 remote-receive, t2 local-receive)`
    /// sample exchange with `peer`.
    pub fn record_sample(&mut self, peer: u8, t0: f64, t1: f64, t2: f64) {
        let rtt = t2 - t0;
        let offset = t1 - (t0 + rtt / 2.0);
        let clock = self.peers.entry(peer).or_default();
        clock.rtts.push_back(rtt);
        clock.offsets.push_back(offset);
        while clock.rtts.len() > self.config.max_samples.max(1) {
            clock.rtts.pop_front();
            clock.offsets.pop_front();
        }
    }

    /// Median RTT over the retained ring for `peer`.
    #[must_use]
    pub fn smoothed_rtt(&self, peer: u8) -> Option<f64> {
        let clock = self.peers.get(&peer)?;
        if clock.rtts.is_empty() {
            return None;
        }
        Some(median(clock.rtts.iter().copied().collect()))
    }

    /// Median offset over the retained ring for `peer`.
    #[must_use]
    pub fn smoothed_offset(&self, peer: u8) -> Option<f64> {
        let clock = self.peers.get(&peer)?;
        if clock.offsets.is_empty() {
            return None;
        }
        Some(median(clock.offsets.iter().copied().collect()))
    }

    /// The arithmetic mean of every tracked peer's smoothed offset. For a
    /// single authoritative server peer this collapses to that peer's own
    /// offset.
    #[must_use]
    pub fn consensus_offset(&self) -> Option<f64> {
        let offsets: Vec<f64> = self.peers.keys().filter_map(|&peer| self.smoothed_offset(peer)).collect();
        if offsets.is_empty() {
            return None;
        }
        Some(offsets.iter().sum::<f64>() / offsets.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothed_rtt_and_offset_match_reference_samples() {
        let mut estimator = ClockSyncEstimator::new(ClockSyncConfig::default());
        let samples = [
            (100.0, 200.0, 110.0),
            (200.0, 300.0, 210.0),
            (300.0, 1000.0, 400.0),
            (400.0, 500.0, 410.0),
            (500.0, 600.0, 510.0),
        ];
        for &(t0, t1, t2) in &samples {
            estimator.record_sample(0, t0, t1, t2);
        }
        assert_eq!(estimator.smoothed_rtt(0), Some(10.0));
        assert_eq!(estimator.smoothed_offset(0), Some(95.0));
    }

    #[test]
    fn test_consensus_offset_averages_tracked_peers() {
        let mut estimator = ClockSyncEstimator::new(ClockSyncConfig::default());
        // Force single-sample rings so the recorded offset is the median.
        estimator.record_sample(0, 0.0, 100.0, 0.0);
        estimator.record_sample(1, 0.0, -50.0, 0.0);
        assert_eq!(estimator.smoothed_offset(0), Some(100.0));
        assert_eq!(estimator.smoothed_offset(1), Some(-50.0));
        assert_eq!(estimator.consensus_offset(), Some(25.0));
    }

    #[test]
    fn test_ring_evicts_oldest_sample_beyond_max() {
        let mut estimator = ClockSyncEstimator::new(ClockSyncConfig::new().with_max_samples(2));
        estimator.record_sample(0, 0.0, 1000.0, 0.0);
        estimator.record_sample(0, 0.0, 10.0, 0.0);
        estimator.record_sample(0, 0.0, 20.0, 0.0);
        // The 1000.0 offset sample should have been evicted.
        assert_eq!(estimator.smoothed_offset(0), Some(15.0));
    }
}
