//! Final session report and export functionality

use crate::analysis::{
    DigraphAnalyzer, DigraphStat, ErrorAnalyzer, GhostDelta, GhostSynchronizer, IntervalStats,
    MetricsCalculator, MistakeEntry, ProblemKey, RankedMistake, Reading, RhythmTracker,
    StreamConsumer, WORD_LENGTH,
};
use crate::config::EngineConfig;
use crate::error::{ContractViolation, Result};
use crate::history::PersonalHistory;
use crate::recommend::{self, Recommendation, RuleInputs};
use crate::recorder::SessionRecording;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Complete, immutable summary of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Headline numbers
    pub metrics: FinalMetrics,
    /// Inter-keystroke spacing, absent with fewer than two keystrokes
    pub intervals: Option<IntervalStats>,
    /// Every (typed, expected) mistake with its count
    pub mistakes: Vec<MistakeEntry>,
    /// Most frequent mistakes, transpositions counted per swapped pair
    pub ranked_mistakes: Vec<RankedMistake>,
    /// Expected characters missed most often
    pub problem_keys: Vec<ProblemKey>,
    /// Digraphs slower than the configured threshold, slowest first
    pub slow_digraphs: Vec<DigraphStat>,
    /// Lead or lag against the ghost after the last keystroke
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ghost: Option<GhostDelta>,
    /// Comparison with earlier sessions, omitted without history
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    /// WPM per fixed-width slice of the session
    pub wpm_timeline: Vec<WpmBucket>,
    /// Combo milestones in the order they were reached
    pub combo_milestones: Vec<u32>,
    pub recommendations: Vec<Recommendation>,
    /// Whether the session became the new ghost
    pub personal_best: bool,
    /// Display lines from every stream consumer
    pub readings: Vec<ConsumerReadings>,
}

/// Report metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Application version
    pub version: String,
    pub started_at: DateTime<Utc>,
    /// Session duration in seconds
    pub duration_secs: f64,
    pub keystrokes: usize,
    pub target_length: usize,
    /// Percent of the target text reached
    pub progress_percent: f64,
}

/// Final session metrics; all zero for a session without keystrokes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalMetrics {
    /// Correct characters / 5 per minute of session
    pub net_wpm: f64,
    pub accuracy: f64,
    /// Consistency over the trailing window at the last keystroke
    pub consistency: f64,
    pub max_combo: u32,
    pub final_combo: u32,
    pub correct: u64,
    pub total: u64,
    pub errors: u64,
}

/// Difference to the personal history; positive is better
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub sessions: u32,
    pub wpm_vs_average: f64,
    pub accuracy_vs_average: f64,
    pub wpm_vs_best: f64,
}

/// WPM inside one slice of the session timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WpmBucket {
    pub start_secs: f64,
    pub end_secs: f64,
    pub wpm: f64,
}

/// Readings of a single consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerReadings {
    pub consumer: String,
    pub readings: Vec<Reading>,
}

impl ConsumerReadings {
    pub fn of(consumer: &dyn StreamConsumer) -> Self {
        Self {
            consumer: consumer.name().to_string(),
            readings: consumer.get_results(),
        }
    }
}

impl ReportSummary {
    /// Export report to JSON file
    pub fn export_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Export report to JSON string
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Analyzer state handed over when the session ends
pub struct ReportInputs<'a> {
    pub recording: &'a SessionRecording,
    pub metrics: &'a MetricsCalculator,
    pub errors: &'a ErrorAnalyzer,
    pub digraphs: &'a DigraphAnalyzer,
    pub rhythm: &'a RhythmTracker,
    pub ghost: &'a GhostSynchronizer,
    pub history: Option<&'a PersonalHistory>,
    pub progress_percent: f64,
    /// Readings of every consumer, in display order
    pub readings: Vec<ConsumerReadings>,
}

#[derive(Debug, Clone)]
enum ReportState {
    Accumulating,
    Final(Arc<ReportSummary>),
}

/// Builds the [`ReportSummary`] exactly once per session
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    config: EngineConfig,
    state: ReportState,
}

impl ReportGenerator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: ReportState::Accumulating,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self.state, ReportState::Final(_))
    }

    /// The finished summary, or `ReportNotReady` while accumulating
    pub fn summary(&self) -> Result<Arc<ReportSummary>> {
        match &self.state {
            ReportState::Final(summary) => Ok(Arc::clone(summary)),
            ReportState::Accumulating => Err(ContractViolation::ReportNotReady.into()),
        }
    }

    /// Move to `Final`. Once final, the stored summary is returned and
    /// `inputs` are ignored.
    pub fn generate(&mut self, inputs: ReportInputs<'_>) -> Arc<ReportSummary> {
        if let ReportState::Final(summary) = &self.state {
            return Arc::clone(summary);
        }
        let summary = Arc::new(self.build(inputs));
        log::info!(
            "report generated: {:.1} wpm, {:.1}% accuracy, {} recommendation(s)",
            summary.metrics.net_wpm,
            summary.metrics.accuracy,
            summary.recommendations.len()
        );
        self.state = ReportState::Final(Arc::clone(&summary));
        summary
    }

    fn build(&self, inputs: ReportInputs<'_>) -> ReportSummary {
        let recording = inputs.recording;
        let analysis = &self.config.analysis;

        let metrics = final_metrics(recording, inputs.metrics);
        let slow_digraphs = inputs
            .digraphs
            .slowest(analysis.top_digraphs, analysis.slowness_threshold);
        let problem_keys = inputs.errors.problem_keys(analysis.top_problem_keys);
        let history = inputs.history.filter(|h| h.has_sessions());

        let recommendations = recommend::evaluate(
            &RuleInputs {
                metrics: &metrics,
                slow_digraphs: &slow_digraphs,
                transpositions: inputs.errors.transposition_count(),
                problem_keys: &problem_keys,
                history,
            },
            &self.config.recommendations,
        );

        let comparison = history
            .filter(|_| metrics.total > 0)
            .map(|h| Comparison {
                sessions: h.sessions,
                wpm_vs_average: metrics.net_wpm - h.avg_wpm,
                accuracy_vs_average: metrics.accuracy - h.avg_accuracy,
                wpm_vs_best: metrics.net_wpm - h.best_wpm,
            });

        ReportSummary {
            metadata: ReportMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                started_at: recording.started_at,
                duration_secs: recording.duration.as_secs_f64(),
                keystrokes: recording.len(),
                target_length: recording.target_text.chars().count(),
                progress_percent: inputs.progress_percent,
            },
            metrics,
            intervals: inputs.rhythm.stats(),
            mistakes: inputs.errors.mistake_table(),
            ranked_mistakes: inputs.errors.ranked_mistakes(analysis.top_mistakes),
            problem_keys,
            slow_digraphs,
            ghost: inputs.ghost.current(),
            comparison,
            wpm_timeline: wpm_timeline(recording, self.config.wpm_bucket()),
            combo_milestones: inputs.metrics.milestones_reached().to_vec(),
            recommendations,
            personal_best: recording.personal_best,
            readings: inputs.readings,
        }
    }
}

fn final_metrics(recording: &SessionRecording, metrics: &MetricsCalculator) -> FinalMetrics {
    let Some(last) = recording.final_snapshot() else {
        return FinalMetrics::default();
    };
    let total = recording.len() as u64;
    let correct = recording.correct_count() as u64;
    FinalMetrics {
        net_wpm: recording.net_wpm(),
        accuracy: recording.accuracy().unwrap_or(0.0),
        consistency: last.consistency,
        max_combo: metrics.max_combo(),
        final_combo: last.combo,
        correct,
        total,
        errors: total - correct,
    }
}

/// Split the session into `bucket`-wide slices and compute WPM in each.
///
/// The last slice may be shorter than `bucket`; its WPM is scaled by the
/// time it actually covers.
pub fn wpm_timeline(recording: &SessionRecording, bucket: Duration) -> Vec<WpmBucket> {
    if recording.is_empty() || bucket.is_zero() {
        return Vec::new();
    }
    let bucket_us = bucket.as_micros();
    let count = recording.duration.as_micros().div_ceil(bucket_us).max(1) as usize;

    let mut correct = vec![0u64; count];
    for event in recording.events().filter(|e| e.correct) {
        let index = ((event.timestamp.as_micros() / bucket_us) as usize).min(count - 1);
        correct[index] += 1;
    }

    correct
        .iter()
        .enumerate()
        .map(|(i, &chars)| {
            let start = bucket * i as u32;
            let end = (start + bucket).min(recording.duration);
            let span = end.saturating_sub(start);
            let wpm = if span.is_zero() {
                0.0
            } else {
                (chars as f64 / WORD_LENGTH) / (span.as_secs_f64() / 60.0)
            };
            WpmBucket {
                start_secs: start.as_secs_f64(),
                end_secs: end.as_secs_f64(),
                wpm,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_helpers::typed_run;
    use crate::recorder::SessionRecorder;
    use crate::stream::KeystrokeEvent;

    struct Fixture {
        metrics: MetricsCalculator,
        errors: ErrorAnalyzer,
        digraphs: DigraphAnalyzer,
        rhythm: RhythmTracker,
        ghost: GhostSynchronizer,
        recorder: SessionRecorder,
    }

    impl Fixture {
        fn new(target: &str) -> Self {
            Self {
                metrics: MetricsCalculator::default(),
                errors: ErrorAnalyzer::new(),
                digraphs: DigraphAnalyzer::default(),
                rhythm: RhythmTracker::new(),
                ghost: GhostSynchronizer::new(None),
                recorder: SessionRecorder::new(target, Utc::now()),
            }
        }

        fn feed(&mut self, events: &[KeystrokeEvent]) {
            for e in events {
                self.metrics.process_event(e);
                self.errors.process_event(e);
                self.digraphs.process_event(e);
                self.rhythm.process_event(e);
                self.ghost.process_event(e);
                self.recorder.record(*e, self.metrics.latest().unwrap()).unwrap();
            }
        }

        fn generate(&mut self, generator: &mut ReportGenerator) -> Arc<ReportSummary> {
            let recording = self.recorder.finalize(None);
            generator.generate(ReportInputs {
                recording: &recording,
                metrics: &self.metrics,
                errors: &self.errors,
                digraphs: &self.digraphs,
                rhythm: &self.rhythm,
                ghost: &self.ghost,
                history: None,
                progress_percent: 100.0,
                readings: self.readings(),
            })
        }

        fn readings(&self) -> Vec<ConsumerReadings> {
            let consumers: [&dyn StreamConsumer; 5] =
                [&self.metrics, &self.errors, &self.digraphs, &self.rhythm, &self.ghost];
            consumers.into_iter().map(ConsumerReadings::of).collect()
        }
    }

    #[test]
    fn summary_not_ready_while_accumulating() {
        let generator = ReportGenerator::new(EngineConfig::default());
        assert!(!generator.is_final());
        assert!(matches!(
            generator.summary(),
            Err(crate::error::EngineError::ContractViolation(ContractViolation::ReportNotReady))
        ));
    }

    #[test]
    fn empty_session_has_neutral_metrics() {
        let mut fixture = Fixture::new("hello");
        let mut generator = ReportGenerator::new(EngineConfig::default());
        let report = fixture.generate(&mut generator);

        assert!(generator.is_final());
        assert_eq!(report.metrics, FinalMetrics::default());
        assert!(report.intervals.is_none());
        assert!(report.mistakes.is_empty());
        assert!(report.wpm_timeline.is_empty());
        assert!(report.recommendations.is_empty());
        assert!(report.ghost.is_none());
        assert!(report.comparison.is_none());
        assert!(!report.personal_best);
    }

    #[test]
    fn generate_is_idempotent() {
        let mut fixture = Fixture::new("hello");
        fixture.feed(&typed_run("hello", "hello", 100));
        let mut generator = ReportGenerator::new(EngineConfig::default());
        let first = fixture.generate(&mut generator);

        // more analyzer state after the fact does not leak in
        fixture.errors.process_event(&crate::analysis::test_helpers::event(5, 600, 'x', 'y', 5));
        let second = fixture.generate(&mut generator);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(generator.summary().unwrap(), first);
    }

    #[test]
    fn clean_session_metrics() {
        let mut fixture = Fixture::new("hello world");
        fixture.feed(&typed_run("hello world", "hello world", 100));
        let mut generator = ReportGenerator::new(EngineConfig::default());
        let report = fixture.generate(&mut generator);

        assert_eq!(report.metrics.accuracy, 100.0);
        assert_eq!(report.metrics.final_combo, 11);
        assert_eq!(report.metrics.max_combo, 11);
        assert_eq!(report.metrics.errors, 0);
        assert_eq!(report.combo_milestones, vec![10]);
        assert!(report.mistakes.is_empty());
        assert_eq!(report.ghost, Some(GhostDelta::NoGhost));
        assert_eq!(report.readings.len(), 5);
        assert_eq!(report.readings[0].consumer, "Metrics");
    }

    #[test]
    fn mistakes_and_transpositions_reach_the_report() {
        let mut fixture = Fixture::new("the cat");
        fixture.feed(&typed_run("the cat", "teh cat", 100));
        let mut generator = ReportGenerator::new(EngineConfig::default());
        let report = fixture.generate(&mut generator);

        assert_eq!(report.metrics.errors, 2);
        assert_eq!(report.mistakes.len(), 2);
        assert!(report
            .recommendations
            .contains(&Recommendation::PracticeTranspositions { count: 1 }));
    }

    #[test]
    fn json_export_contains_sections() {
        let mut fixture = Fixture::new("abc");
        fixture.feed(&typed_run("abc", "abc", 100));
        let mut generator = ReportGenerator::new(EngineConfig::default());
        let report = fixture.generate(&mut generator);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"metrics\""));
        assert!(json.contains("\"wpm_timeline\""));
        assert!(!json.contains("\"comparison\""));

        let path = std::env::temp_dir().join("typing_telemetry_report_test.json");
        report.export_json(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, json);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn timeline_buckets_cover_the_session() {
        let mut recorder = SessionRecorder::new("a".repeat(13), Utc::now());
        let mut metrics = MetricsCalculator::default();
        // 13 keys one second apart: last at 12s
        for e in typed_run(&"a".repeat(13), &"a".repeat(13), 1000) {
            metrics.process_event(&e);
            recorder.record(e, metrics.latest().unwrap()).unwrap();
        }
        let recording = recorder.finalize(None);
        let buckets = wpm_timeline(&recording, Duration::from_secs(5));

        assert_eq!(buckets.len(), 3);
        // keys at 0..=4s land in the first 5s bucket: 5 chars / 5 / (5/60)
        assert!((buckets[0].wpm - 12.0).abs() < 1e-9);
        // last bucket covers 10s..12s and holds keys at 10, 11, 12
        assert_eq!(buckets[2].start_secs, 10.0);
        assert_eq!(buckets[2].end_secs, 12.0);
        assert!((buckets[2].wpm - (3.0 / 5.0) / (2.0 / 60.0)).abs() < 1e-9);
    }
}
