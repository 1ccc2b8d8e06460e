//! Typing Telemetry - live keystroke analysis for typing practice
//!
//! Ingests a timestamped stream of keystrokes, derives speed, accuracy,
//! rhythm, error-pattern and ghost-race metrics as each key arrives, and folds
//! the finished session into a reproducible report.

pub mod analysis;
pub mod config;
pub mod error;
pub mod history;
pub mod recommend;
pub mod recorder;
pub mod report;
pub mod session;
pub mod stream;
pub mod utils;

pub use analysis::{GhostDelta, GhostTrack, MetricsSnapshot};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use history::PersonalHistory;
pub use recorder::{Replay, ReplayStep, SessionRecording};
pub use report::ReportSummary;
pub use session::Session;
pub use stream::KeystrokeEvent;
