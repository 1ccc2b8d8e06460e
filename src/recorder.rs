//! Session recording, personal-best promotion and replay

use crate::analysis::{GhostTrack, MetricsSnapshot, WORD_LENGTH};
use crate::error::{ConfigRejection, ContractViolation, Result};
use crate::stream::KeystrokeEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One event together with the metrics taken right after it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedKeystroke {
    pub event: KeystrokeEvent,
    pub snapshot: MetricsSnapshot,
}

/// Headline numbers of a run, used to decide personal bests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestRun {
    pub wpm: f64,
    pub accuracy: f64,
}

impl BestRun {
    /// Higher WPM wins; equal WPM falls back to accuracy
    pub fn beats(&self, other: &BestRun) -> bool {
        self.wpm > other.wpm || (self.wpm == other.wpm && self.accuracy > other.accuracy)
    }
}

/// Finished, immutable record of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecording {
    /// Wall-clock start, metadata only
    pub started_at: DateTime<Utc>,
    pub target_text: String,
    /// Timestamp of the last event
    pub duration: Duration,
    pub entries: Vec<RecordedKeystroke>,
    /// Whether this run beat the previous best when it was finalized
    pub personal_best: bool,
}

impl SessionRecording {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &KeystrokeEvent> + '_ {
        self.entries.iter().map(|e| &e.event)
    }

    pub fn correct_count(&self) -> usize {
        self.entries.iter().filter(|e| e.event.correct).count()
    }

    /// Correct characters per minute of session, in words
    pub fn net_wpm(&self) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.correct_count() as f64 / WORD_LENGTH) / (self.duration.as_secs_f64() / 60.0)
    }

    /// Session accuracy in percent, `None` for an empty recording
    pub fn accuracy(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.correct_count() as f64 / self.len() as f64 * 100.0)
    }

    pub fn final_snapshot(&self) -> Option<MetricsSnapshot> {
        self.entries.last().map(|e| e.snapshot)
    }

    /// Headline numbers, `None` for an empty recording
    pub fn as_best_run(&self) -> Option<BestRun> {
        Some(BestRun {
            wpm: self.net_wpm(),
            accuracy: self.accuracy()?,
        })
    }

    /// Ghost for future sessions, if this run was a new personal best
    pub fn promote_to_ghost(&self) -> Option<GhostTrack> {
        self.personal_best.then(|| GhostTrack::from_events(self.events()))
    }

    /// Replay the recording with waits divided by `speed`
    pub fn replay(&self, speed: f64) -> Result<Replay<'_>> {
        if !speed.is_finite() || speed <= 0.0 {
            log::warn!("rejected replay speed {}", speed);
            return Err(ConfigRejection::InvalidSpeed(speed).into());
        }
        Ok(Replay {
            entries: &self.entries,
            speed,
            index: 0,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Collects (event, snapshot) pairs while a session is live
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    started_at: DateTime<Utc>,
    target_text: String,
    entries: Vec<RecordedKeystroke>,
    finalized: Option<Arc<SessionRecording>>,
}

impl SessionRecorder {
    pub fn new(target_text: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            target_text: target_text.into(),
            entries: Vec::with_capacity(1024),
            finalized: None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.finalized {
            Some(recording) => recording.len(),
            None => self.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    /// Everything recorded so far
    pub fn entries(&self) -> &[RecordedKeystroke] {
        match &self.finalized {
            Some(recording) => &recording.entries,
            None => &self.entries,
        }
    }

    /// The finished recording, once [`finalize`](Self::finalize) has run
    pub fn recording(&self) -> Option<Arc<SessionRecording>> {
        self.finalized.clone()
    }

    /// Append one pair; the snapshot must belong to the event
    pub fn record(&mut self, event: KeystrokeEvent, snapshot: MetricsSnapshot) -> Result<()> {
        if self.finalized.is_some() {
            return Err(ContractViolation::SessionEnded.into());
        }
        if event.sequence != snapshot.sequence {
            let violation = ContractViolation::SnapshotMismatch {
                event: event.sequence,
                snapshot: snapshot.sequence,
            };
            log::error!("{}", violation);
            return Err(violation.into());
        }
        self.entries.push(RecordedKeystroke { event, snapshot });
        Ok(())
    }

    /// Close the recording and decide personal-best promotion against
    /// `previous_best`. Later calls return the same recording.
    pub fn finalize(&mut self, previous_best: Option<BestRun>) -> Arc<SessionRecording> {
        if let Some(recording) = &self.finalized {
            return Arc::clone(recording);
        }

        let entries = std::mem::take(&mut self.entries);
        let duration = entries.last().map(|e| e.event.timestamp).unwrap_or_default();
        let mut recording = SessionRecording {
            started_at: self.started_at,
            target_text: std::mem::take(&mut self.target_text),
            duration,
            entries,
            personal_best: false,
        };

        recording.personal_best = match (recording.as_best_run(), previous_best) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(run), Some(best)) => run.beats(&best),
        };

        log::info!(
            "session recorded: {} keystrokes over {:.1}s, {:.1} wpm",
            recording.len(),
            recording.duration.as_secs_f64(),
            recording.net_wpm()
        );
        if recording.personal_best {
            log::info!("new personal best at {:.1} wpm", recording.net_wpm());
        }

        let recording = Arc::new(recording);
        self.finalized = Some(Arc::clone(&recording));
        recording
    }
}

/// One replayed keystroke and how long to wait before showing it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayStep {
    pub event: KeystrokeEvent,
    pub snapshot: MetricsSnapshot,
    /// Original gap to the previous event (from session start for the
    /// first one), divided by the replay speed
    pub wait: Duration,
}

/// Lazy, restartable walk over a recording
#[derive(Debug, Clone)]
pub struct Replay<'a> {
    entries: &'a [RecordedKeystroke],
    speed: f64,
    index: usize,
}

impl Replay<'_> {
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Go back to the first event
    pub fn restart(&mut self) {
        self.index = 0;
    }

    fn scaled(&self, gap: Duration) -> Duration {
        // float → int casts saturate, so absurdly slow speeds cap out
        Duration::from_nanos((gap.as_nanos() as f64 / self.speed).round() as u64)
    }
}

impl Iterator for Replay<'_> {
    type Item = ReplayStep;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.get(self.index)?;
        let previous = match self.index.checked_sub(1) {
            Some(i) => self.entries[i].event.timestamp,
            None => Duration::ZERO,
        };
        self.index += 1;
        Some(ReplayStep {
            event: entry.event,
            snapshot: entry.snapshot,
            wait: self.scaled(entry.event.timestamp.saturating_sub(previous)),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Replay<'_> {}
