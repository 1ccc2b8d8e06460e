//! Mistake classification and per-key error rates

use super::{Reading, StreamConsumer};
use crate::stream::KeystrokeEvent;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

/// How a mistaken keystroke is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Wrong character in place of the expected one
    Substitution,
    /// Half of a swapped pair of adjacent characters
    Transposition,
}

/// One incorrect keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub expected: char,
    pub typed: char,
    pub position: usize,
    pub timestamp: Duration,
    pub kind: ErrorKind,
}

/// Row of the common mistakes table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeEntry {
    pub typed: char,
    pub expected: char,
    pub count: u32,
}

/// What a ranked mistake refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MistakeKind {
    Substitution { typed: char, expected: char },
    /// `expected` is the pair in text order; it was typed reversed
    Transposition { expected: [char; 2] },
}

/// Mistake entry ordered for the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedMistake {
    #[serde(flatten)]
    pub mistake: MistakeKind,
    pub count: u32,
}

/// Expected character with its error rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProblemKey {
    pub key: char,
    pub attempts: u32,
    pub errors: u32,
    /// errors / attempts, 0..=1
    pub error_rate: f64,
}

/// Tracks every mistake of a session and the patterns behind them
#[derive(Debug, Clone, Default)]
pub struct ErrorAnalyzer {
    records: Vec<ErrorRecord>,
    /// (typed, expected) -> count over all mistakes
    mistakes: HashMap<(char, char), u32>,
    /// (typed, expected) -> count over mistakes not explained by a swap
    substitutions: HashMap<(char, char), u32>,
    /// expected pair in text order -> count
    transpositions: HashMap<(char, char), u32>,
    key_attempts: HashMap<char, u32>,
    key_errors: HashMap<char, u32>,
    previous: Option<KeystrokeEvent>,
}

impl ErrorAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn total_errors(&self) -> usize {
        self.records.len()
    }

    pub fn transposition_count(&self) -> u32 {
        self.transpositions.values().sum()
    }

    /// Full (typed, expected) table, most frequent first
    pub fn mistake_table(&self) -> Vec<MistakeEntry> {
        let mut table: Vec<MistakeEntry> = self
            .mistakes
            .iter()
            .map(|(&(typed, expected), &count)| MistakeEntry {
                typed,
                expected,
                count,
            })
            .collect();
        table.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.expected.cmp(&b.expected))
                .then(a.typed.cmp(&b.typed))
        });
        table
    }

    /// Top `limit` mistakes with swapped pairs counted once per swap.
    ///
    /// Ties rank transpositions first, then by characters so the order is
    /// stable across runs.
    pub fn ranked_mistakes(&self, limit: usize) -> Vec<RankedMistake> {
        let mut ranked: Vec<RankedMistake> = self
            .transpositions
            .iter()
            .map(|(&(first, second), &count)| RankedMistake {
                mistake: MistakeKind::Transposition {
                    expected: [first, second],
                },
                count,
            })
            .chain(
                self.substitutions
                    .iter()
                    .map(|(&(typed, expected), &count)| RankedMistake {
                        mistake: MistakeKind::Substitution { typed, expected },
                        count,
                    }),
            )
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| rank_kind(&a.mistake, &b.mistake)));
        ranked.truncate(limit);
        ranked
    }

    /// Keys with at least one error, highest error rate first
    pub fn problem_keys(&self, limit: usize) -> Vec<ProblemKey> {
        let mut keys: Vec<ProblemKey> = self
            .key_errors
            .iter()
            .map(|(&key, &errors)| {
                let attempts = self.key_attempts.get(&key).copied().unwrap_or(errors).max(1);
                ProblemKey {
                    key,
                    attempts,
                    errors,
                    error_rate: errors as f64 / attempts as f64,
                }
            })
            .collect();
        keys.sort_by(|a, b| {
            b.error_rate
                .partial_cmp(&a.error_rate)
                .unwrap_or(Ordering::Equal)
                .then(b.errors.cmp(&a.errors))
                .then(a.key.cmp(&b.key))
        });
        keys.truncate(limit);
        keys
    }

    /// Did `prev` and `event` swap two adjacent characters?
    fn is_swap(prev: &KeystrokeEvent, event: &KeystrokeEvent) -> bool {
        !prev.correct
            && !event.correct
            && prev.text_position + 1 == event.text_position
            && prev.typed_char == event.expected_char
            && event.typed_char == prev.expected_char
    }

    fn retag_as_transposition(&mut self, prev: &KeystrokeEvent, event: &KeystrokeEvent) {
        let n = self.records.len();
        if n < 2 || self.records[n - 2].kind == ErrorKind::Transposition {
            return;
        }
        for record in &mut self.records[n - 2..] {
            record.kind = ErrorKind::Transposition;
            let key = (record.typed, record.expected);
            if let Some(count) = self.substitutions.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    self.substitutions.remove(&key);
                }
            }
        }
        *self
            .transpositions
            .entry((prev.expected_char, event.expected_char))
            .or_insert(0) += 1;
        log::debug!(
            "transposition {}{} typed as {}{} at position {}",
            prev.expected_char,
            event.expected_char,
            prev.typed_char,
            event.typed_char,
            prev.text_position
        );
    }
}

fn rank_kind(a: &MistakeKind, b: &MistakeKind) -> Ordering {
    match (a, b) {
        (MistakeKind::Transposition { expected: x }, MistakeKind::Transposition { expected: y }) => {
            x.cmp(y)
        }
        (MistakeKind::Transposition { .. }, MistakeKind::Substitution { .. }) => Ordering::Less,
        (MistakeKind::Substitution { .. }, MistakeKind::Transposition { .. }) => Ordering::Greater,
        (
            MistakeKind::Substitution {
                typed: t1,
                expected: e1,
            },
            MistakeKind::Substitution {
                typed: t2,
                expected: e2,
            },
        ) => e1.cmp(e2).then(t1.cmp(t2)),
    }
}

impl StreamConsumer for ErrorAnalyzer {
    fn name(&self) -> &'static str {
        "Errors"
    }

    fn description(&self) -> &'static str {
        "Classifies mistakes and tracks per-key error rates"
    }

    fn process_event(&mut self, event: &KeystrokeEvent) {
        *self.key_attempts.entry(event.expected_char).or_insert(0) += 1;

        if !event.correct {
            *self.key_errors.entry(event.expected_char).or_insert(0) += 1;
            let key = (event.typed_char, event.expected_char);
            *self.mistakes.entry(key).or_insert(0) += 1;
            *self.substitutions.entry(key).or_insert(0) += 1;
            self.records.push(ErrorRecord {
                expected: event.expected_char,
                typed: event.typed_char,
                position: event.text_position,
                timestamp: event.timestamp,
                kind: ErrorKind::Substitution,
            });

            if let Some(prev) = self.previous {
                if Self::is_swap(&prev, event) {
                    self.retag_as_transposition(&prev, event);
                }
            }
        }

        self.previous = Some(*event);
    }

    fn get_results(&self) -> Vec<Reading> {
        let mut results = vec![
            Reading::info("Errors", format!("{}", self.total_errors())),
            Reading::info("Transpositions", format!("{}", self.transposition_count())),
        ];

        if let Some(top) = self.ranked_mistakes(1).first() {
            let value = match top.mistake {
                MistakeKind::Substitution { typed, expected } => {
                    format!("'{}' for '{}' x{}", typed, expected, top.count)
                }
                MistakeKind::Transposition { expected } => {
                    format!("'{}{}' swapped x{}", expected[0], expected[1], top.count)
                }
            };
            results.push(Reading::warning("Top Mistake", value));
        }

        if let Some(key) = self.problem_keys(1).first() {
            results.push(Reading::warning(
                "Problem Key",
                format!("'{}': {:.0}% missed", key.key, key.error_rate * 100.0),
            ));
        }

        results
    }
}
