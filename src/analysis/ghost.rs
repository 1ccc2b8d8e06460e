//! Race against a previously recorded best run

use super::{Reading, ReadingStatus, StreamConsumer};
use crate::stream::KeystrokeEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// When the ghost reached a text position, relative to its first keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostSample {
    pub text_position: usize,
    pub timestamp: Duration,
}

/// Read-only position → time map of a prior best session.
///
/// Samples are sorted by position with one entry per position: the last time
/// the ghost typed it, since earlier attempts at a position were corrected
/// away. Times are shifted so the ghost's first keystroke is at zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<GhostSample>", into = "Vec<GhostSample>")]
pub struct GhostTrack {
    samples: Vec<GhostSample>,
}

impl GhostTrack {
    /// Build a track from samples in the order they were typed
    pub fn new(samples: impl IntoIterator<Item = GhostSample>) -> Self {
        let mut origin: Option<Duration> = None;
        let mut by_position = BTreeMap::new();
        for sample in samples {
            origin = Some(origin.map_or(sample.timestamp, |o| o.min(sample.timestamp)));
            by_position.insert(sample.text_position, sample.timestamp);
        }
        let origin = origin.unwrap_or_default();
        Self {
            samples: by_position
                .into_iter()
                .map(|(text_position, timestamp)| GhostSample {
                    text_position,
                    timestamp: timestamp.saturating_sub(origin),
                })
                .collect(),
        }
    }

    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a KeystrokeEvent>) -> Self {
        Self::new(events.into_iter().map(|e| GhostSample {
            text_position: e.text_position,
            timestamp: e.timestamp,
        }))
    }

    pub fn samples(&self) -> &[GhostSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Furthest text position the ghost ever reached
    pub fn furthest_position(&self) -> Option<usize> {
        self.samples.last().map(|s| s.text_position)
    }

    /// Ghost time in milliseconds at `position`, `None` past its furthest
    /// position
    pub fn time_at(&self, position: usize) -> Option<f64> {
        let mut cursor = 0;
        self.time_at_from(position, &mut cursor)
    }

    /// Same as [`time_at`](Self::time_at), starting the search at `cursor`
    /// and leaving it on the bracketing sample for the next lookup.
    pub fn time_at_from(&self, position: usize, cursor: &mut usize) -> Option<f64> {
        let idx = self.bracket(position, cursor);
        let hi = self.samples.get(idx)?;
        let hi_ms = millis(hi.timestamp);
        if hi.text_position == position {
            return Some(hi_ms);
        }

        // below the first sample the ghost is assumed to start at position 0, time 0
        let (lo_pos, lo_ms) = match idx.checked_sub(1) {
            Some(i) => (self.samples[i].text_position, millis(self.samples[i].timestamp)),
            None => (0, 0.0),
        };
        let span = (hi.text_position - lo_pos) as f64;
        let fraction = (position - lo_pos) as f64 / span;
        Some(lo_ms + (hi_ms - lo_ms) * fraction)
    }

    /// Index of the first sample at or after `position`
    fn bracket(&self, position: usize, cursor: &mut usize) -> usize {
        let n = self.samples.len();
        let fits = |i: usize| {
            (i == 0 || self.samples[i - 1].text_position < position)
                && (i == n || self.samples[i].text_position >= position)
        };
        let c = (*cursor).min(n);
        let idx = if fits(c) {
            c
        } else if c < n && fits(c + 1) {
            c + 1
        } else {
            self.samples.partition_point(|s| s.text_position < position)
        };
        *cursor = idx;
        idx
    }
}

impl From<Vec<GhostSample>> for GhostTrack {
    fn from(samples: Vec<GhostSample>) -> Self {
        Self::new(samples)
    }
}

impl From<GhostTrack> for Vec<GhostSample> {
    fn from(track: GhostTrack) -> Self {
        track.samples
    }
}

fn millis(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

/// Live position relative to the ghost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GhostDelta {
    /// No ghost was supplied for this session
    NoGhost,
    /// Ghost time at the live position minus live elapsed time; positive
    /// means the player is ahead
    Relative { lead_ms: f64 },
    /// The player reached a position the ghost never did
    UnboundedAhead,
}

impl GhostDelta {
    pub fn is_ahead(&self) -> bool {
        match self {
            GhostDelta::NoGhost => false,
            GhostDelta::Relative { lead_ms } => *lead_ms > 0.0,
            GhostDelta::UnboundedAhead => true,
        }
    }
}

/// Tracks lead/lag against a [`GhostTrack`] as live events arrive
#[derive(Debug, Clone, Default)]
pub struct GhostSynchronizer {
    track: Option<Arc<GhostTrack>>,
    cursor: usize,
    live_origin: Option<Duration>,
    delta: Option<GhostDelta>,
}

impl GhostSynchronizer {
    /// An empty track is treated the same as no ghost
    pub fn new(track: Option<Arc<GhostTrack>>) -> Self {
        Self {
            track: track.filter(|t| !t.is_empty()),
            ..Self::default()
        }
    }

    pub fn has_ghost(&self) -> bool {
        self.track.is_some()
    }

    /// Delta after the latest event, `None` before the first one
    pub fn current(&self) -> Option<GhostDelta> {
        self.delta
    }
}

impl StreamConsumer for GhostSynchronizer {
    fn name(&self) -> &'static str {
        "Ghost"
    }

    fn description(&self) -> &'static str {
        "Lead or lag against the personal best run"
    }

    fn process_event(&mut self, event: &KeystrokeEvent) {
        let origin = *self.live_origin.get_or_insert(event.timestamp);

        let Some(track) = &self.track else {
            self.delta = Some(GhostDelta::NoGhost);
            return;
        };

        let elapsed_ms = millis(event.timestamp.saturating_sub(origin));
        let delta = match track.time_at_from(event.text_position, &mut self.cursor) {
            Some(ghost_ms) => GhostDelta::Relative {
                lead_ms: ghost_ms - elapsed_ms,
            },
            None => GhostDelta::UnboundedAhead,
        };
        if delta == GhostDelta::UnboundedAhead && self.delta != Some(GhostDelta::UnboundedAhead) {
            log::debug!("passed the ghost's furthest position at {}", event.text_position);
        }
        self.delta = Some(delta);
    }

    fn get_results(&self) -> Vec<Reading> {
        let value = match self.delta {
            None if self.has_ghost() => return vec![Reading::info("Ghost", "Waiting")],
            None | Some(GhostDelta::NoGhost) => return vec![Reading::info("Ghost", "None loaded")],
            Some(GhostDelta::UnboundedAhead) => {
                return vec![Reading::ok("Ghost", "New territory")];
            }
            Some(GhostDelta::Relative { lead_ms }) => lead_ms,
        };

        let (text, status) = if value > 0.0 {
            (format!("Ahead by {:.2}s", value / 1000.0), ReadingStatus::Ok)
        } else if value < 0.0 {
            (format!("Behind by {:.2}s", -value / 1000.0), ReadingStatus::Warning)
        } else {
            ("Tied".to_string(), ReadingStatus::Info)
        };
        vec![Reading::new("Ghost", text, status)]
    }
}
