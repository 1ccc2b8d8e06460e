//! Keystroke event type and boundary validation

use crate::error::InputRejection;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single keystroke with its position in the session timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredKeystroke")]
pub struct KeystrokeEvent {
    /// Total order within the session, starting at 0
    pub sequence: u64,
    /// Offset from session start
    pub timestamp: Duration,
    /// Character the target text required
    pub expected_char: char,
    /// Character actually entered
    pub typed_char: char,
    /// Derived from `typed_char == expected_char`
    pub correct: bool,
    /// Index into the target text when the key was entered
    pub text_position: usize,
}

impl KeystrokeEvent {
    pub fn new(
        sequence: u64,
        timestamp: Duration,
        expected_char: char,
        typed_char: char,
        text_position: usize,
    ) -> Self {
        Self {
            sequence,
            timestamp,
            expected_char,
            typed_char,
            correct: typed_char == expected_char,
            text_position,
        }
    }

    /// Milliseconds between `earlier` and this event
    pub fn millis_since(&self, earlier: &KeystrokeEvent) -> u64 {
        self.timestamp.saturating_sub(earlier.timestamp).as_millis() as u64
    }

    /// Reject events whose stored correctness flag was tampered with
    pub(crate) fn check_consistency(&self) -> Result<(), InputRejection> {
        if self.correct == (self.typed_char == self.expected_char) {
            Ok(())
        } else {
            Err(InputRejection::InconsistentCorrectness {
                sequence: self.sequence,
            })
        }
    }
}

/// Wire form of [`KeystrokeEvent`], checked before it is accepted
#[derive(Deserialize)]
struct StoredKeystroke {
    sequence: u64,
    timestamp: Duration,
    expected_char: char,
    typed_char: char,
    correct: bool,
    text_position: usize,
}

impl TryFrom<StoredKeystroke> for KeystrokeEvent {
    type Error = InputRejection;

    fn try_from(stored: StoredKeystroke) -> Result<Self, Self::Error> {
        let event = KeystrokeEvent {
            sequence: stored.sequence,
            timestamp: stored.timestamp,
            expected_char: stored.expected_char,
            typed_char: stored.typed_char,
            correct: stored.correct,
            text_position: stored.text_position,
        };
        event.check_consistency()?;
        Ok(event)
    }
}

/// Parse a raw key payload that must hold exactly one character.
///
/// `on_empty` and `on_many` pick the rejection reported for each failure, so
/// the same check serves both the typed and the expected side.
pub fn parse_char(
    raw: &str,
    on_empty: InputRejection,
    on_many: fn(String) -> InputRejection,
) -> Result<char, InputRejection> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Err(on_empty),
        (Some(c), None) => Ok(c),
        (Some(_), Some(_)) => Err(on_many(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_correctness() {
        let hit = KeystrokeEvent::new(0, Duration::ZERO, 'a', 'a', 0);
        assert!(hit.correct);

        let miss = KeystrokeEvent::new(1, Duration::from_millis(90), 'a', 's', 1);
        assert!(!miss.correct);
        assert_eq!(miss.millis_since(&hit), 90);
    }

    #[test]
    fn parse_char_accepts_single_grapheme() {
        let c = parse_char("é", InputRejection::EmptyTyped, InputRejection::MultiCharTyped);
        assert_eq!(c, Ok('é'));
    }

    #[test]
    fn parse_char_rejects_empty_and_multi() {
        assert_eq!(
            parse_char("", InputRejection::EmptyTyped, InputRejection::MultiCharTyped),
            Err(InputRejection::EmptyTyped)
        );
        assert_eq!(
            parse_char("ab", InputRejection::EmptyExpected, InputRejection::MultiCharExpected),
            Err(InputRejection::MultiCharExpected("ab".into()))
        );
    }

    #[test]
    fn tampered_correctness_is_detected() {
        let mut event = KeystrokeEvent::new(4, Duration::ZERO, 'a', 'b', 0);
        assert!(event.check_consistency().is_ok());
        event.correct = true;
        assert_eq!(
            event.check_consistency(),
            Err(InputRejection::InconsistentCorrectness { sequence: 4 })
        );
    }

    #[test]
    fn deserializing_a_tampered_event_fails() {
        let miss = KeystrokeEvent::new(2, Duration::from_millis(250), 'a', 'b', 2);
        let json = serde_json::to_string(&miss).unwrap();
        assert_eq!(serde_json::from_str::<KeystrokeEvent>(&json).unwrap(), miss);

        let tampered = json.replace("\"correct\":false", "\"correct\":true");
        assert_ne!(tampered, json);
        let err = serde_json::from_str::<KeystrokeEvent>(&tampered).unwrap_err();
        assert!(err.to_string().contains("event 2 carries"), "{}", err);
    }
}
