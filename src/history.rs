//! Cross-session averages and bests

use crate::recorder::{BestRun, SessionRecording};
use serde::{Deserialize, Serialize};

/// Aggregates over every finished session, kept by the persistence layer
/// and handed to new sessions for comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalHistory {
    /// Number of non-empty sessions folded in
    pub sessions: u32,
    pub avg_wpm: f64,
    pub best_wpm: f64,
    pub avg_accuracy: f64,
    pub best_accuracy: f64,
    /// The run current ghosts are measured against
    pub personal_best: Option<BestRun>,
}

impl PersonalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_sessions(&self) -> bool {
        self.sessions > 0
    }

    /// Run a new session must beat to become the personal best.
    ///
    /// Histories written before `personal_best` was tracked fall back to the
    /// separate best WPM and accuracy.
    pub fn best_run(&self) -> Option<BestRun> {
        self.personal_best.or_else(|| {
            self.has_sessions().then_some(BestRun {
                wpm: self.best_wpm,
                accuracy: self.best_accuracy,
            })
        })
    }

    /// Fold a finished recording into the running averages.
    ///
    /// Empty recordings carry no measurements and are skipped.
    pub fn record(&mut self, recording: &SessionRecording) {
        let Some(run) = recording.as_best_run() else {
            log::debug!("skipping empty recording in history");
            return;
        };

        self.sessions += 1;
        let n = self.sessions as f64;
        self.avg_wpm += (run.wpm - self.avg_wpm) / n;
        self.avg_accuracy += (run.accuracy - self.avg_accuracy) / n;
        self.best_wpm = self.best_wpm.max(run.wpm);
        self.best_accuracy = self.best_accuracy.max(run.accuracy);

        let improves = match &self.personal_best {
            Some(best) => run.beats(best),
            None => true,
        };
        if improves {
            self.personal_best = Some(run);
        }
    }
}
