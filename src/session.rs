//! Live typing session: the single entry point for keystrokes

use crate::analysis::{
    DigraphAnalyzer, ErrorAnalyzer, GhostDelta, GhostSynchronizer, GhostTrack, MetricsCalculator,
    MetricsSnapshot, RhythmTracker, StreamConsumer,
};
use crate::config::EngineConfig;
use crate::error::{ContractViolation, EngineError, InputRejection, Result};
use crate::history::PersonalHistory;
use crate::recorder::{RecordedKeystroke, SessionRecorder, SessionRecording};
use crate::report::{ConsumerReadings, ReportGenerator, ReportInputs, ReportSummary};
use crate::stream::{parse_char, EventStream, KeystrokeEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// One typing exercise over a fixed target text.
///
/// Every accepted keystroke goes through the ordering check of the
/// [`EventStream`], then to each analyzer in turn, then into the recorder
/// together with the metrics snapshot it produced.
pub struct Session {
    target: Vec<char>,
    stream: EventStream,
    metrics: MetricsCalculator,
    errors: ErrorAnalyzer,
    digraphs: DigraphAnalyzer,
    rhythm: RhythmTracker,
    ghost: GhostSynchronizer,
    recorder: SessionRecorder,
    history: Option<PersonalHistory>,
    report: ReportGenerator,
    furthest_position: Option<usize>,
}

impl Session {
    /// Start a session; the configuration is validated before anything else
    pub fn new(target_text: &str, config: EngineConfig) -> Result<Self> {
        if let Err(reason) = config.validate() {
            log::warn!("rejected configuration: {}", reason);
            return Err(reason.into());
        }
        log::debug!("session started on {} characters", target_text.chars().count());

        Ok(Self {
            target: target_text.chars().collect(),
            stream: EventStream::new(),
            metrics: MetricsCalculator::from_config(&config),
            errors: ErrorAnalyzer::new(),
            digraphs: DigraphAnalyzer::from_config(&config),
            rhythm: RhythmTracker::new(),
            ghost: GhostSynchronizer::new(None),
            recorder: SessionRecorder::new(target_text, Utc::now()),
            history: None,
            report: ReportGenerator::new(config),
            furthest_position: None,
        })
    }

    /// Race against `ghost`. Ignored once keystrokes have arrived.
    pub fn with_ghost(mut self, ghost: Arc<GhostTrack>) -> Self {
        if self.before_first_keystroke("ghost") {
            self.ghost = GhostSynchronizer::new(Some(ghost));
        }
        self
    }

    /// Compare against earlier sessions in the report
    pub fn with_history(mut self, history: PersonalHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Override the wall-clock start stored with the recording. Ignored once
    /// keystrokes have arrived.
    pub fn with_start_time(mut self, started_at: DateTime<Utc>) -> Self {
        if self.before_first_keystroke("start time") {
            let target: String = self.target.iter().collect();
            self.recorder = SessionRecorder::new(target, started_at);
        }
        self
    }

    fn before_first_keystroke(&self, what: &str) -> bool {
        if self.stream.is_empty() {
            return true;
        }
        log::warn!("{} ignored: session already has keystrokes", what);
        false
    }

    /// Drive a fresh session with the events of `recording`.
    ///
    /// The result is left open so the caller can inspect it or end it; its
    /// recorded snapshots match the original ones when the configuration is
    /// the same.
    pub fn replay_recording(
        recording: &SessionRecording,
        config: EngineConfig,
        ghost: Option<Arc<GhostTrack>>,
    ) -> Result<Self> {
        let mut session =
            Session::new(&recording.target_text, config)?.with_start_time(recording.started_at);
        if let Some(ghost) = ghost {
            session = session.with_ghost(ghost);
        }
        for entry in &recording.entries {
            session.ingest(entry.event)?;
        }
        log::debug!("re-analysed {} recorded keystrokes", recording.len());
        Ok(session)
    }

    /// Validate a raw keystroke payload and feed it through the engine.
    ///
    /// Deletions are not keystrokes: the input layer moves `text_position`
    /// back and the next keystroke re-types that position.
    pub fn submit_keystroke(
        &mut self,
        expected: &str,
        typed: &str,
        timestamp: Duration,
        text_position: usize,
    ) -> Result<KeystrokeEvent> {
        self.ensure_open()?;
        let expected = parse_char(expected, InputRejection::EmptyExpected, InputRejection::MultiCharExpected)
            .map_err(reject)?;
        let typed =
            parse_char(typed, InputRejection::EmptyTyped, InputRejection::MultiCharTyped).map_err(reject)?;

        let event = KeystrokeEvent::new(
            self.stream.next_sequence(),
            timestamp,
            expected,
            typed,
            text_position,
        );
        self.ingest(event)
    }

    /// Feed an already built event, e.g. from a recording
    pub fn ingest(&mut self, event: KeystrokeEvent) -> Result<KeystrokeEvent> {
        self.ensure_open()?;
        self.check_target(&event).map_err(reject)?;
        let event = self.stream.append(event)?;

        self.metrics.process_event(&event);
        self.errors.process_event(&event);
        self.digraphs.process_event(&event);
        self.rhythm.process_event(&event);
        self.ghost.process_event(&event);

        let snapshot = self.metrics.latest().ok_or(ContractViolation::NoEvents)?;
        self.recorder.record(event, snapshot)?;
        self.furthest_position = Some(
            self.furthest_position
                .map_or(event.text_position, |p| p.max(event.text_position)),
        );

        log::trace!(
            "#{} {:?} at {}: {:?} for {:?} ({:.1} wpm, combo {})",
            event.sequence,
            event.timestamp,
            event.text_position,
            event.typed_char,
            event.expected_char,
            snapshot.wpm,
            snapshot.combo
        );
        Ok(event)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.recorder.is_finalized() {
            log::error!("keystroke after session end");
            return Err(ContractViolation::SessionEnded.into());
        }
        Ok(())
    }

    fn check_target(&self, event: &KeystrokeEvent) -> std::result::Result<(), InputRejection> {
        let target = self.target.get(event.text_position).copied().ok_or(
            InputRejection::PositionOutOfRange {
                position: event.text_position,
                len: self.target.len(),
            },
        )?;
        if target != event.expected_char {
            return Err(InputRejection::ExpectedMismatch {
                position: event.text_position,
                expected: event.expected_char,
                target,
            });
        }
        Ok(())
    }

    /// Metrics after the latest keystroke
    pub fn current_metrics(&self) -> Result<MetricsSnapshot> {
        self.metrics.latest().ok_or_else(no_events)
    }

    /// Lead or lag against the ghost after the latest keystroke
    pub fn current_ghost_delta(&self) -> Result<GhostDelta> {
        self.ghost.current().ok_or_else(no_events)
    }

    /// Number of accepted keystrokes
    pub fn len(&self) -> u64 {
        self.stream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Every (event, snapshot) pair recorded so far
    pub fn entries(&self) -> &[RecordedKeystroke] {
        self.recorder.entries()
    }

    pub fn target_len(&self) -> usize {
        self.target.len()
    }

    /// Percent of the target text reached
    pub fn progress(&self) -> f64 {
        match self.furthest_position {
            Some(p) if !self.target.is_empty() => (p + 1) as f64 / self.target.len() as f64 * 100.0,
            _ => 0.0,
        }
    }

    /// True once the last character of the target has been typed
    pub fn is_complete(&self) -> bool {
        !self.target.is_empty() && self.furthest_position == Some(self.target.len() - 1)
    }

    pub fn is_ended(&self) -> bool {
        self.recorder.is_finalized()
    }

    /// Readings of every analyzer, for live display
    pub fn readings(&self) -> Vec<ConsumerReadings> {
        let consumers: [&dyn StreamConsumer; 5] = [
            &self.metrics,
            &self.errors,
            &self.digraphs,
            &self.rhythm,
            &self.ghost,
        ];
        consumers.into_iter().map(ConsumerReadings::of).collect()
    }

    /// Close the session, possibly early, and build the report.
    ///
    /// Later calls return the same recording.
    pub fn end_session(&mut self) -> Arc<SessionRecording> {
        if let Some(recording) = self.recorder.recording() {
            return recording;
        }

        let previous_best = self.history.as_ref().and_then(PersonalHistory::best_run);
        let progress_percent = self.progress();
        let readings = self.readings();
        let recording = self.recorder.finalize(previous_best);
        log::info!(
            "session ended at {:.0}% of the text{}",
            progress_percent,
            if self.is_complete() { "" } else { " (early)" }
        );

        self.report.generate(ReportInputs {
            recording: &recording,
            metrics: &self.metrics,
            errors: &self.errors,
            digraphs: &self.digraphs,
            rhythm: &self.rhythm,
            ghost: &self.ghost,
            history: self.history.as_ref(),
            progress_percent,
            readings,
        });
        recording
    }

    /// The final report, available once the session has ended
    pub fn report(&self) -> Result<Arc<ReportSummary>> {
        self.report.summary()
    }
}

fn reject(reason: InputRejection) -> EngineError {
    log::warn!("rejected keystroke: {}", reason);
    reason.into()
}

fn no_events() -> EngineError {
    let violation = ContractViolation::NoEvents;
    log::error!("{}", violation);
    violation.into()
}
