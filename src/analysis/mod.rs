//! Stream consumers that derive telemetry from keystroke events

mod digraph;
mod errors;
mod ghost;
mod metrics;
mod rhythm;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use digraph::{DigraphAnalyzer, DigraphStat};
pub use errors::{
    ErrorAnalyzer, ErrorKind, ErrorRecord, MistakeEntry, MistakeKind, ProblemKey, RankedMistake,
};
pub use ghost::{GhostDelta, GhostSample, GhostSynchronizer, GhostTrack};
pub use metrics::{MetricsCalculator, MetricsSnapshot, WORD_LENGTH};
pub use rhythm::{IntervalStats, RhythmTracker};

use crate::stream::KeystrokeEvent;
use serde::{Deserialize, Serialize};

/// Common trait for everything subscribed to the keystroke stream.
///
/// Each consumer sees every accepted event exactly once, in order, and owns
/// its own accumulated state. Output depends only on the events, so feeding a
/// recording back through a fresh consumer reproduces the live result.
pub trait StreamConsumer {
    /// Name of the consumer
    fn name(&self) -> &'static str;

    /// Short description
    fn description(&self) -> &'static str;

    /// Process a keystroke event
    fn process_event(&mut self, event: &KeystrokeEvent);

    /// Current findings as display lines
    fn get_results(&self) -> Vec<Reading>;
}

/// A single display line produced by a consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub label: String,
    pub value: String,
    pub status: ReadingStatus,
}

impl Reading {
    pub fn new(label: impl Into<String>, value: impl Into<String>, status: ReadingStatus) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            status,
        }
    }

    pub fn ok(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, ReadingStatus::Ok)
    }

    pub fn warning(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, ReadingStatus::Warning)
    }

    pub fn info(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, ReadingStatus::Info)
    }
}

/// Status of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Ok,
    Warning,
    Info,
}
