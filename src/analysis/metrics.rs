//! Live speed, accuracy, consistency and combo metrics
//!
//! WPM and consistency are computed over a trailing time window that slides
//! forward with each event. Window contents are kept in deques with running
//! sums, so each event costs amortized O(1): one push plus the evictions it
//! causes. Interval sums are kept as integer microseconds so repeated
//! push/evict cycles never accumulate floating point drift.

use super::{Reading, ReadingStatus, StreamConsumer};
use crate::config::EngineConfig;
use crate::stream::KeystrokeEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Characters per word in WPM calculations
pub const WORD_LENGTH: f64 = 5.0;

/// Windowed WPM reads 0 until this much of the session has elapsed
pub const MIN_WPM_SPAN: Duration = Duration::from_millis(500);

/// Metric values taken right after one event was processed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Sequence of the event this snapshot belongs to
    pub sequence: u64,
    /// Net words per minute over the trailing window
    pub wpm: f64,
    /// Correct keystrokes / total keystrokes for the whole session, in percent
    pub accuracy: f64,
    /// 0 (erratic) to 10 (perfectly even) inter-keystroke rhythm
    pub consistency: f64,
    /// Consecutive correct keystrokes since the last error
    pub combo: u32,
}

/// Incremental calculator for [`MetricsSnapshot`]s
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    window: Duration,
    milestones: Vec<u32>,
    /// (timestamp, correct) for events inside the window
    window_events: VecDeque<(Duration, bool)>,
    correct_in_window: u64,
    /// (timestamp of the later event, interval in microseconds)
    window_intervals: VecDeque<(Duration, u64)>,
    interval_sum: u128,
    interval_sum_sq: u128,
    total: u64,
    correct: u64,
    combo: u32,
    max_combo: u32,
    milestones_reached: Vec<u32>,
    last_timestamp: Option<Duration>,
    latest: Option<MetricsSnapshot>,
}

impl MetricsCalculator {
    pub fn new(window: Duration, milestones: Vec<u32>) -> Self {
        Self {
            window,
            milestones,
            window_events: VecDeque::with_capacity(512),
            correct_in_window: 0,
            window_intervals: VecDeque::with_capacity(512),
            interval_sum: 0,
            interval_sum_sq: 0,
            total: 0,
            correct: 0,
            combo: 0,
            max_combo: 0,
            milestones_reached: Vec::new(),
            last_timestamp: None,
            latest: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.window(), config.combo.milestones.clone())
    }

    /// Snapshot for the most recent event
    pub fn latest(&self) -> Option<MetricsSnapshot> {
        self.latest
    }

    pub fn total_keystrokes(&self) -> u64 {
        self.total
    }

    pub fn correct_keystrokes(&self) -> u64 {
        self.correct
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    /// Combo milestones in the order they were reached
    pub fn milestones_reached(&self) -> &[u32] {
        &self.milestones_reached
    }

    /// Session accuracy in percent, `None` before the first event
    pub fn accuracy(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.correct as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0))
    }

    fn evict(&mut self, now: Duration) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while let Some(&(ts, correct)) = self.window_events.front() {
            if ts >= cutoff {
                break;
            }
            if correct {
                self.correct_in_window -= 1;
            }
            self.window_events.pop_front();
        }
        while let Some(&(ts, micros)) = self.window_intervals.front() {
            if ts >= cutoff {
                break;
            }
            let m = micros as u128;
            self.interval_sum -= m;
            self.interval_sum_sq -= m * m;
            self.window_intervals.pop_front();
        }
    }

    fn windowed_wpm(&self, now: Duration) -> f64 {
        let span = now.min(self.window);
        if span < MIN_WPM_SPAN {
            return 0.0;
        }
        (self.correct_in_window as f64 / WORD_LENGTH) / (span.as_secs_f64() / 60.0)
    }

    /// 10 × (1 − min(1, σ/μ)) of the windowed intervals.
    ///
    /// With n samples, σ/μ = sqrt(n·Σx² − (Σx)²) / Σx, which keeps the whole
    /// computation in exact integer arithmetic until the final square root.
    fn windowed_consistency(&self) -> f64 {
        let n = self.window_intervals.len() as u128;
        if n < 2 || self.interval_sum == 0 {
            return 10.0;
        }
        let spread = (n * self.interval_sum_sq).saturating_sub(self.interval_sum * self.interval_sum);
        let cv = (spread as f64).sqrt() / self.interval_sum as f64;
        (10.0 * (1.0 - cv.min(1.0))).clamp(0.0, 10.0)
    }

    fn update_combo(&mut self, correct: bool) {
        if !correct {
            if self.combo > 0 {
                log::debug!("combo of {} broken", self.combo);
            }
            self.combo = 0;
            return;
        }
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        if self.milestones.contains(&self.combo) {
            log::debug!("combo milestone {} reached", self.combo);
            self.milestones_reached.push(self.combo);
        }
    }
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl StreamConsumer for MetricsCalculator {
    fn name(&self) -> &'static str {
        "Metrics"
    }

    fn description(&self) -> &'static str {
        "Windowed WPM, session accuracy, rhythm consistency and combo"
    }

    fn process_event(&mut self, event: &KeystrokeEvent) {
        let now = event.timestamp;

        self.total += 1;
        if event.correct {
            self.correct += 1;
        }
        self.update_combo(event.correct);

        if let Some(previous) = self.last_timestamp {
            let micros = now.saturating_sub(previous).as_micros() as u64;
            let m = micros as u128;
            self.window_intervals.push_back((now, micros));
            self.interval_sum += m;
            self.interval_sum_sq += m * m;
        }
        self.last_timestamp = Some(now);

        self.window_events.push_back((now, event.correct));
        if event.correct {
            self.correct_in_window += 1;
        }
        self.evict(now);

        self.latest = Some(MetricsSnapshot {
            sequence: event.sequence,
            wpm: self.windowed_wpm(now),
            accuracy: self.accuracy().unwrap_or(0.0),
            consistency: self.windowed_consistency(),
            combo: self.combo,
        });
    }

    fn get_results(&self) -> Vec<Reading> {
        let Some(snapshot) = self.latest else {
            return vec![Reading::info("Keystrokes", "0")];
        };

        let accuracy_status = if snapshot.accuracy >= 95.0 {
            ReadingStatus::Ok
        } else {
            ReadingStatus::Warning
        };

        vec![
            Reading::info("Keystrokes", format!("{}", self.total)),
            Reading::info("WPM", format!("{:.1}", snapshot.wpm)),
            Reading::new("Accuracy", format!("{:.1}%", snapshot.accuracy), accuracy_status),
            Reading::info("Consistency", format!("{:.1}/10", snapshot.consistency)),
            Reading::info("Combo", format!("{}", snapshot.combo)),
            Reading::ok("Best Combo", format!("{}", self.max_combo)),
        ]
    }
}
