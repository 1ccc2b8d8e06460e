//! Ordering contract for the live keystroke stream

use super::KeystrokeEvent;
use crate::error::{ContractViolation, EngineError};
use std::time::Duration;

/// Gatekeeper for the single-writer keystroke stream.
///
/// The stream keeps no history: it only remembers enough to enforce that
/// every appended event carries the next sequence number and a timestamp no
/// earlier than its predecessor. Retaining events is the recorder's job.
#[derive(Debug, Clone, Default)]
pub struct EventStream {
    next_sequence: u64,
    last_timestamp: Option<Duration>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next event must carry
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Timestamp of the most recent event
    pub fn last_timestamp(&self) -> Option<Duration> {
        self.last_timestamp
    }

    /// Number of events accepted so far
    pub fn len(&self) -> u64 {
        self.next_sequence
    }

    pub fn is_empty(&self) -> bool {
        self.next_sequence == 0
    }

    /// Accept `event` if it continues the stream's total order.
    pub fn append(&mut self, event: KeystrokeEvent) -> Result<KeystrokeEvent, EngineError> {
        if event.sequence != self.next_sequence {
            let violation = ContractViolation::SequenceGap {
                expected: self.next_sequence,
                got: event.sequence,
            };
            log::error!("{}", violation);
            return Err(violation.into());
        }
        if let Some(previous) = self.last_timestamp {
            if event.timestamp < previous {
                let violation = ContractViolation::TimestampRegressed {
                    previous,
                    got: event.timestamp,
                };
                log::error!("{}", violation);
                return Err(violation.into());
            }
        }
        event.check_consistency()?;

        self.next_sequence += 1;
        self.last_timestamp = Some(event.timestamp);
        Ok(event)
    }
}
