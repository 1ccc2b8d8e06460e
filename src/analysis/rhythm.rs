//! Inter-keystroke interval statistics over the whole session

use super::{Reading, ReadingStatus, StreamConsumer};
use crate::stream::KeystrokeEvent;
use crate::utils::MinMaxExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Summary of every gap between consecutive keystrokes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub samples: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub std_ms: f64,
}

/// Tracks keystroke spacing with exact integer microsecond sums
#[derive(Debug, Clone, Default)]
pub struct RhythmTracker {
    last_timestamp: Option<Duration>,
    samples: u64,
    sum_us: u128,
    sum_sq_us: u128,
    min_us: Option<u64>,
    max_us: Option<u64>,
}

impl RhythmTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    /// Mean interval in milliseconds
    pub fn avg_ms(&self) -> Option<f64> {
        if self.samples == 0 {
            return None;
        }
        Some(self.sum_us as f64 / self.samples as f64 / 1000.0)
    }

    /// Population standard deviation in milliseconds
    pub fn std_dev_ms(&self) -> Option<f64> {
        if self.samples < 2 {
            return None;
        }
        let n = self.samples as u128;
        // n·Σx² ≥ (Σx)² always holds for integers
        let spread = (n * self.sum_sq_us).saturating_sub(self.sum_us * self.sum_us);
        Some((spread as f64).sqrt() / n as f64 / 1000.0)
    }

    pub fn stats(&self) -> Option<IntervalStats> {
        Some(IntervalStats {
            samples: self.samples,
            avg_ms: self.avg_ms()?,
            min_ms: self.min_us? as f64 / 1000.0,
            max_ms: self.max_us? as f64 / 1000.0,
            std_ms: self.std_dev_ms().unwrap_or(0.0),
        })
    }

    /// Rough label for how steady the typing is
    pub fn steadiness(&self) -> &'static str {
        match (self.avg_ms(), self.std_dev_ms()) {
            (None, _) => "Not measured",
            (Some(_), None) => "Too few samples",
            (Some(avg), Some(_)) if avg == 0.0 => "Burst",
            (Some(avg), Some(std)) if std / avg < 0.25 => "Metronomic",
            (Some(avg), Some(std)) if std / avg < 0.5 => "Steady",
            (Some(avg), Some(std)) if std / avg < 1.0 => "Uneven",
            (Some(_), Some(_)) => "Erratic",
        }
    }
}

impl StreamConsumer for RhythmTracker {
    fn name(&self) -> &'static str {
        "Rhythm"
    }

    fn description(&self) -> &'static str {
        "Tracks spacing between consecutive keystrokes"
    }

    fn process_event(&mut self, event: &KeystrokeEvent) {
        if let Some(last) = self.last_timestamp {
            let gap_us = event.timestamp.saturating_sub(last).as_micros() as u64;
            self.samples += 1;
            self.sum_us += gap_us as u128;
            self.sum_sq_us += gap_us as u128 * gap_us as u128;
            self.min_us.update_min(gap_us);
            self.max_us.update_max(gap_us);
        }
        self.last_timestamp = Some(event.timestamp);
    }

    fn get_results(&self) -> Vec<Reading> {
        let mut results = vec![Reading::info("Intervals", format!("{}", self.samples))];

        if let Some(stats) = self.stats() {
            results.push(Reading::info("Avg Interval", format!("{:.1} ms", stats.avg_ms)));
            results.push(Reading::info(
                "Min/Max",
                format!("{:.1} / {:.1} ms", stats.min_ms, stats.max_ms),
            ));
            if self.samples >= 2 {
                results.push(Reading::info("Std Dev", format!("{:.1} ms", stats.std_ms)));
            }
        }

        let status = match self.steadiness() {
            "Metronomic" | "Steady" => ReadingStatus::Ok,
            "Uneven" | "Erratic" => ReadingStatus::Warning,
            _ => ReadingStatus::Info,
        };
        results.push(Reading::new("Rhythm", self.steadiness(), status));
        results
    }
}
