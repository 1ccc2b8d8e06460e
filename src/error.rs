//! Error taxonomy for the telemetry engine
//!
//! Three recoverability classes are distinguished at the type level:
//!
//! - [`ContractViolation`]: programmer error (out-of-order events, querying an
//!   empty session). Callers should treat these as internal bugs.
//! - [`InputRejection`]: a malformed keystroke payload. The stream is left
//!   untouched and the caller may retry.
//! - [`ConfigRejection`]: a bad replay speed or threshold value, rejected at
//!   the call that introduced it.
//!
//! Missing optional data (no ghost, no history) is not an error; it shows up
//! as `GhostDelta::NoGhost` or an omitted report section.

use std::time::Duration;
use thiserror::Error;

/// Top-level error returned by engine operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputRejection),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigRejection),
}

impl EngineError {
    /// True for errors the presentation layer should surface as internal bugs
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::ContractViolation(_))
    }
}

/// Broken ordering or lifecycle guarantees
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    #[error("sequence {got} appended, expected {expected}")]
    SequenceGap { expected: u64, got: u64 },
    #[error("timestamp {got:?} precedes previous event at {previous:?}")]
    TimestampRegressed { previous: Duration, got: Duration },
    #[error("snapshot {snapshot} does not belong to event {event}")]
    SnapshotMismatch { event: u64, snapshot: u64 },
    #[error("session has no events yet")]
    NoEvents,
    #[error("session has already ended")]
    SessionEnded,
    #[error("report requested while the session is still in progress")]
    ReportNotReady,
}

/// Reasons a keystroke payload is rejected at the boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputRejection {
    #[error("typed character is empty")]
    EmptyTyped,
    #[error("typed input {0:?} is more than one character")]
    MultiCharTyped(String),
    #[error("expected character is empty")]
    EmptyExpected,
    #[error("expected input {0:?} is more than one character")]
    MultiCharExpected(String),
    #[error("text position {position} is outside the target text (length {len})")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("expected {expected:?} at position {position}, but the target text has {target:?}")]
    ExpectedMismatch {
        position: usize,
        expected: char,
        target: char,
    },
    #[error("event {sequence} carries a correctness flag that disagrees with its characters")]
    InconsistentCorrectness { sequence: u64 },
}

/// Reasons a configuration value is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigRejection {
    #[error("replay speed must be a finite number greater than zero, got {0}")]
    InvalidSpeed(f64),
    #[error("metrics window must be at least one second")]
    EmptyWindow,
    #[error("report bucket length must be at least one second")]
    EmptyBucket,
    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },
    #[error("{name} = {value} is outside {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
