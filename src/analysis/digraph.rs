//! Two-character transition latency analysis

use super::{Reading, StreamConsumer};
use crate::config::EngineConfig;
use crate::stream::KeystrokeEvent;
use crate::utils::Welford;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Latency profile of one character pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DigraphStat {
    pub pair: [char; 2],
    pub sample_count: u64,
    pub mean_latency_ms: f64,
    pub variance: f64,
    /// (mean − global mean) / global mean; positive is slower than usual
    pub relative_slowness: f64,
}

/// Online per-digraph latency tracker.
///
/// Only transitions between two consecutive correct keystrokes on adjacent
/// text positions are measured; anything involving a miss or a jump back is
/// not rhythm data.
#[derive(Debug, Clone)]
pub struct DigraphAnalyzer {
    pairs: HashMap<(char, char), Welford>,
    global: Welford,
    previous: Option<KeystrokeEvent>,
    max_latency_ms: f64,
    min_samples: u64,
}

impl DigraphAnalyzer {
    pub fn new(max_latency_ms: u64, min_samples: u64) -> Self {
        Self {
            pairs: HashMap::new(),
            global: Welford::default(),
            previous: None,
            max_latency_ms: max_latency_ms as f64,
            min_samples,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.analysis.max_digraph_latency_ms,
            config.analysis.min_digraph_samples,
        )
    }

    /// Mean latency across every measured transition
    pub fn global_mean_latency_ms(&self) -> Option<f64> {
        (self.global.count() > 0).then(|| self.global.mean())
    }

    pub fn sample_count(&self) -> u64 {
        self.global.count()
    }

    /// Stats for a single pair
    pub fn stat(&self, first: char, second: char) -> Option<DigraphStat> {
        self.pairs
            .get(&(first, second))
            .map(|w| self.describe((first, second), w))
    }

    fn describe(&self, (first, second): (char, char), w: &Welford) -> DigraphStat {
        let global = self.global.mean();
        let relative_slowness = if global > 0.0 {
            (w.mean() - global) / global
        } else {
            0.0
        };
        DigraphStat {
            pair: [first, second],
            sample_count: w.count(),
            mean_latency_ms: w.mean(),
            variance: w.variance(),
            relative_slowness,
        }
    }

    /// Every observed digraph, slowest first
    pub fn ranking(&self) -> Vec<DigraphStat> {
        let mut all: Vec<DigraphStat> = self
            .pairs
            .iter()
            .map(|(&pair, w)| self.describe(pair, w))
            .collect();
        all.sort_by(|a, b| {
            b.relative_slowness
                .partial_cmp(&a.relative_slowness)
                .unwrap_or(Ordering::Equal)
                .then(a.pair.cmp(&b.pair))
        });
        all
    }

    /// Up to `limit` digraphs with enough samples that are slower than
    /// `threshold` relative to the global mean
    pub fn slowest(&self, limit: usize, threshold: f64) -> Vec<DigraphStat> {
        self.ranking()
            .into_iter()
            .filter(|d| d.sample_count >= self.min_samples && d.relative_slowness > threshold)
            .take(limit)
            .collect()
    }
}

impl Default for DigraphAnalyzer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl StreamConsumer for DigraphAnalyzer {
    fn name(&self) -> &'static str {
        "Digraphs"
    }

    fn description(&self) -> &'static str {
        "Measures latency between consecutive correct keystrokes"
    }

    fn process_event(&mut self, event: &KeystrokeEvent) {
        if let Some(prev) = self.previous {
            if prev.correct && event.correct && prev.text_position + 1 == event.text_position {
                let latency_ms =
                    event.timestamp.saturating_sub(prev.timestamp).as_micros() as f64 / 1000.0;
                if latency_ms > 0.0 && latency_ms < self.max_latency_ms {
                    let pair = (prev.expected_char, event.expected_char);
                    let stats = self.pairs.entry(pair).or_insert_with(|| {
                        log::debug!("new digraph {}{}", pair.0, pair.1);
                        Welford::default()
                    });
                    stats.push(latency_ms);
                    self.global.push(latency_ms);
                }
            }
        }
        self.previous = Some(*event);
    }

    fn get_results(&self) -> Vec<Reading> {
        let mut results = vec![Reading::info("Digraphs", format!("{}", self.pairs.len()))];

        if let Some(mean) = self.global_mean_latency_ms() {
            results.push(Reading::info("Avg Transition", format!("{:.0} ms", mean)));
        }

        if let Some(slowest) = self
            .ranking()
            .into_iter()
            .find(|d| d.sample_count >= self.min_samples)
        {
            results.push(Reading::warning(
                "Slowest Digraph",
                format!(
                    "{}{}: {:.0} ms ({:+.0}%)",
                    slowest.pair[0],
                    slowest.pair[1],
                    slowest.mean_latency_ms,
                    slowest.relative_slowness * 100.0
                ),
            ));
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_helpers::{event, feed, timed_run, typed_run};

    #[test]
    fn measures_consecutive_correct_pairs() {
        let mut d = DigraphAnalyzer::default();
        feed(&mut d, &typed_run("abc", "abc", 100));

        assert_eq!(d.sample_count(), 2);
        let ab = d.stat('a', 'b').unwrap();
        assert_eq!(ab.sample_count, 1);
        assert!((ab.mean_latency_ms - 100.0).abs() < 1e-9);
        assert_eq!(ab.relative_slowness, 0.0);
    }

    #[test]
    fn misses_break_the_chain() {
        let mut d = DigraphAnalyzer::default();
        feed(&mut d, &typed_run("abcd", "abxd", 100));
        // only "ab" survives: "bc" and "cd" both touch the miss
        assert_eq!(d.sample_count(), 1);
        assert!(d.stat('b', 'c').is_none());
        assert!(d.stat('c', 'd').is_none());
    }

    #[test]
    fn backtracking_is_not_measured() {
        let mut d = DigraphAnalyzer::default();
        d.process_event(&event(0, 0, 'a', 'a', 0));
        d.process_event(&event(1, 100, 'b', 'b', 1));
        // the input layer moved back to position 1
        d.process_event(&event(2, 400, 'b', 'b', 1));
        assert_eq!(d.sample_count(), 1);
    }

    #[test]
    fn pauses_are_ignored() {
        let mut d = DigraphAnalyzer::default();
        feed(&mut d, &timed_run("abc", "abc", &[0, 100, 5000]));
        assert_eq!(d.sample_count(), 1);
        assert!(d.stat('b', 'c').is_none());
    }

    #[test]
    fn welford_accumulates_repeats() {
        let mut d = DigraphAnalyzer::default();
        // "th" twice: 100ms then 200ms
        feed(&mut d, &timed_run("th th", "th th", &[0, 100, 300, 400, 600]));
        let th = d.stat('t', 'h').unwrap();
        assert_eq!(th.sample_count, 2);
        assert!((th.mean_latency_ms - 150.0).abs() < 1e-9);
        assert!((th.variance - 2500.0).abs() < 1e-9);
    }

    #[test]
    fn slowest_applies_threshold_and_min_samples() {
        let mut d = DigraphAnalyzer::new(2000, 2);
        // "ab" at 100ms x3, "bc" at 200ms x2, "ca" at 100ms x2, "xy" at 400ms once
        let target = "abcabcab";
        feed(&mut d, &timed_run(target, target, &[0, 100, 300, 400, 500, 700, 800, 900]));
        d.process_event(&event(8, 1000, 'x', 'x', 8));
        d.process_event(&event(9, 1400, 'y', 'y', 9));

        let global = d.global_mean_latency_ms().unwrap();
        let slow = d.slowest(3, 0.08);
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].pair, ['b', 'c']);
        assert!((slow[0].relative_slowness - (200.0 - global) / global).abs() < 1e-9);

        // single-sample digraphs still appear in the full ranking
        assert_eq!(d.ranking()[0].pair, ['x', 'y']);
    }

    #[test]
    fn slowest_respects_limit() {
        let mut d = DigraphAnalyzer::new(2000, 1);
        feed(
            &mut d,
            &timed_run("abcdef", "abcdef", &[0, 100, 400, 500, 900, 1000]),
        );
        let slow = d.slowest(1, 0.0);
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].pair, ['d', 'e']);
    }
}
