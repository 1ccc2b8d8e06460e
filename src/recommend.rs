//! Threshold rules that turn session results into practice advice
//!
//! Rules run in a fixed order and every rule that fires contributes one
//! recommendation:
//!
//! 1. [`Recommendation::ReduceSpeed`]: accuracy below the floor while typing
//!    faster than the personal average (needs history)
//! 2. [`Recommendation::PracticeDigraphs`]: slow digraphs were found
//! 3. [`Recommendation::PracticeTranspositions`]: swapped character pairs
//! 4. [`Recommendation::DrillProblemKeys`]: keys at or above the error rate
//!    threshold
//! 5. [`Recommendation::ImproveRhythm`]: consistency below the floor
//! 6. [`Recommendation::PushSpeed`]: accuracy at or above the precision
//!    ceiling without beating the personal average
//!
//! A session without keystrokes gets no recommendations.

use crate::analysis::{DigraphStat, ProblemKey};
use crate::config::RecommendationThresholds;
use crate::history::PersonalHistory;
use crate::report::FinalMetrics;
use serde::{Deserialize, Serialize};

/// A single piece of advice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Recommendation {
    ReduceSpeed {
        accuracy: f64,
        wpm: f64,
        average_wpm: f64,
    },
    PracticeDigraphs { digraphs: Vec<String> },
    PracticeTranspositions { count: u32 },
    DrillProblemKeys { keys: Vec<char> },
    ImproveRhythm { consistency: f64 },
    PushSpeed { accuracy: f64 },
}

impl Recommendation {
    /// Human readable advice
    pub fn message(&self) -> String {
        match self {
            Recommendation::ReduceSpeed {
                accuracy,
                wpm,
                average_wpm,
            } => format!(
                "Slow down: {:.0} wpm is above your {:.0} wpm average but accuracy dropped to {:.1}%",
                wpm, average_wpm, accuracy
            ),
            Recommendation::PracticeDigraphs { digraphs } => {
                format!("Practice these letter pairs: {}", digraphs.join(", "))
            }
            Recommendation::PracticeTranspositions { count } => format!(
                "{} swapped letter pair(s): focus on finger order in common sequences",
                count
            ),
            Recommendation::DrillProblemKeys { keys } => {
                let keys: Vec<String> = keys.iter().map(|k| format!("'{}'", k)).collect();
                format!("Drill the keys you miss most: {}", keys.join(", "))
            }
            Recommendation::ImproveRhythm { consistency } => format!(
                "Rhythm consistency {:.1}/10: aim for an even pace rather than bursts",
                consistency
            ),
            Recommendation::PushSpeed { accuracy } => format!(
                "{:.1}% accuracy: you have room to push your speed",
                accuracy
            ),
        }
    }
}

/// Everything the rules look at
#[derive(Debug, Clone, Copy)]
pub struct RuleInputs<'a> {
    pub metrics: &'a FinalMetrics,
    pub slow_digraphs: &'a [DigraphStat],
    pub transpositions: u32,
    pub problem_keys: &'a [ProblemKey],
    pub history: Option<&'a PersonalHistory>,
}

type Rule = fn(&RuleInputs<'_>, &RecommendationThresholds) -> Option<Recommendation>;

const RULES: [Rule; 6] = [
    reduce_speed,
    practice_digraphs,
    practice_transpositions,
    drill_problem_keys,
    improve_rhythm,
    push_speed,
];

/// Run every rule in order
pub fn evaluate(inputs: &RuleInputs<'_>, thresholds: &RecommendationThresholds) -> Vec<Recommendation> {
    if inputs.metrics.total == 0 {
        return Vec::new();
    }
    let fired: Vec<Recommendation> = RULES.iter().filter_map(|rule| rule(inputs, thresholds)).collect();
    log::debug!("{} recommendation rule(s) fired", fired.len());
    fired
}

fn known_history<'a>(inputs: &RuleInputs<'a>) -> Option<&'a PersonalHistory> {
    inputs.history.filter(|h| h.has_sessions())
}

fn reduce_speed(inputs: &RuleInputs<'_>, t: &RecommendationThresholds) -> Option<Recommendation> {
    let history = known_history(inputs)?;
    let m = inputs.metrics;
    (m.accuracy < t.accuracy_floor && m.net_wpm > history.avg_wpm).then(|| {
        Recommendation::ReduceSpeed {
            accuracy: m.accuracy,
            wpm: m.net_wpm,
            average_wpm: history.avg_wpm,
        }
    })
}

fn practice_digraphs(inputs: &RuleInputs<'_>, _: &RecommendationThresholds) -> Option<Recommendation> {
    if inputs.slow_digraphs.is_empty() {
        return None;
    }
    Some(Recommendation::PracticeDigraphs {
        digraphs: inputs
            .slow_digraphs
            .iter()
            .map(|d| d.pair.iter().collect())
            .collect(),
    })
}

fn practice_transpositions(inputs: &RuleInputs<'_>, _: &RecommendationThresholds) -> Option<Recommendation> {
    (inputs.transpositions > 0).then_some(Recommendation::PracticeTranspositions {
        count: inputs.transpositions,
    })
}

fn drill_problem_keys(inputs: &RuleInputs<'_>, t: &RecommendationThresholds) -> Option<Recommendation> {
    let keys: Vec<char> = inputs
        .problem_keys
        .iter()
        .filter(|k| k.error_rate >= t.problem_key_error_rate)
        .map(|k| k.key)
        .collect();
    (!keys.is_empty()).then_some(Recommendation::DrillProblemKeys { keys })
}

fn improve_rhythm(inputs: &RuleInputs<'_>, t: &RecommendationThresholds) -> Option<Recommendation> {
    let consistency = inputs.metrics.consistency;
    (consistency < t.consistency_floor).then_some(Recommendation::ImproveRhythm { consistency })
}

fn push_speed(inputs: &RuleInputs<'_>, t: &RecommendationThresholds) -> Option<Recommendation> {
    let m = inputs.metrics;
    if m.accuracy < t.precision_ceiling {
        return None;
    }
    if let Some(history) = known_history(inputs) {
        if m.net_wpm > history.avg_wpm {
            return None;
        }
    }
    Some(Recommendation::PushSpeed { accuracy: m.accuracy })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(net_wpm: f64, accuracy: f64, consistency: f64) -> FinalMetrics {
        FinalMetrics {
            net_wpm,
            accuracy,
            consistency,
            total: 100,
            correct: accuracy as u64,
            errors: 100 - accuracy as u64,
            ..FinalMetrics::default()
        }
    }

    fn history(avg_wpm: f64) -> PersonalHistory {
        PersonalHistory {
            sessions: 4,
            avg_wpm,
            ..PersonalHistory::default()
        }
    }

    fn digraph(a: char, b: char) -> DigraphStat {
        DigraphStat {
            pair: [a, b],
            sample_count: 3,
            mean_latency_ms: 250.0,
            variance: 0.0,
            relative_slowness: 0.4,
        }
    }

    fn run(inputs: RuleInputs<'_>) -> Vec<Recommendation> {
        evaluate(&inputs, &RecommendationThresholds::default())
    }

    #[test]
    fn empty_session_gets_nothing() {
        let m = FinalMetrics::default();
        let inputs = RuleInputs {
            metrics: &m,
            slow_digraphs: &[],
            transpositions: 0,
            problem_keys: &[],
            history: None,
        };
        assert!(run(inputs).is_empty());
    }

    #[test]
    fn reduce_speed_needs_history() {
        let m = metrics(70.0, 90.0, 8.0);
        let mut inputs = RuleInputs {
            metrics: &m,
            slow_digraphs: &[],
            transpositions: 0,
            problem_keys: &[],
            history: None,
        };
        assert!(run(inputs).is_empty());

        let h = history(60.0);
        inputs.history = Some(&h);
        assert!(matches!(run(inputs).as_slice(), [Recommendation::ReduceSpeed { .. }]));

        let slower = history(80.0);
        inputs.history = Some(&slower);
        assert!(run(inputs).is_empty());
    }

    #[test]
    fn rules_fire_in_fixed_order() {
        let m = metrics(70.0, 90.0, 3.0);
        let h = history(50.0);
        let slow = [digraph('t', 'h')];
        let keys = [ProblemKey {
            key: 'q',
            attempts: 4,
            errors: 2,
            error_rate: 0.5,
        }];
        let inputs = RuleInputs {
            metrics: &m,
            slow_digraphs: &slow,
            transpositions: 2,
            problem_keys: &keys,
            history: Some(&h),
        };

        let recs = run(inputs);
        assert_eq!(recs.len(), 5);
        assert!(matches!(recs[0], Recommendation::ReduceSpeed { .. }));
        assert_eq!(
            recs[1],
            Recommendation::PracticeDigraphs {
                digraphs: vec!["th".to_string()]
            }
        );
        assert_eq!(recs[2], Recommendation::PracticeTranspositions { count: 2 });
        assert_eq!(recs[3], Recommendation::DrillProblemKeys { keys: vec!['q'] });
        assert_eq!(recs[4], Recommendation::ImproveRhythm { consistency: 3.0 });
    }

    #[test]
    fn problem_keys_below_rate_are_ignored() {
        let m = metrics(40.0, 97.0, 9.0);
        let keys = [ProblemKey {
            key: 'e',
            attempts: 50,
            errors: 1,
            error_rate: 0.02,
        }];
        let inputs = RuleInputs {
            metrics: &m,
            slow_digraphs: &[],
            transpositions: 0,
            problem_keys: &keys,
            history: None,
        };
        assert!(run(inputs).is_empty());
    }

    #[test]
    fn precise_typists_are_told_to_push() {
        let m = metrics(40.0, 99.0, 9.0);
        let inputs = RuleInputs {
            metrics: &m,
            slow_digraphs: &[],
            transpositions: 0,
            problem_keys: &[],
            history: None,
        };
        let recs = run(inputs);
        assert_eq!(recs, vec![Recommendation::PushSpeed { accuracy: 99.0 }]);
        assert!(recs[0].message().contains("99.0%"));

        // already faster than usual: no push
        let h = history(30.0);
        let inputs = RuleInputs {
            history: Some(&h),
            ..inputs
        };
        assert!(run(inputs).is_empty());
    }

    #[test]
    fn messages_name_the_details() {
        let rec = Recommendation::DrillProblemKeys { keys: vec!['a', ';'] };
        assert_eq!(rec.message(), "Drill the keys you miss most: 'a', ';'");
    }
}
