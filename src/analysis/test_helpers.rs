//! Shared test utilities for stream consumers
//!
//! Provides builders for keystroke events with explicit timing.

use super::StreamConsumer;
use crate::stream::KeystrokeEvent;
use std::time::Duration;

/// Creates an event with full control over every field.
pub fn event(sequence: u64, ms: u64, expected: char, typed: char, position: usize) -> KeystrokeEvent {
    KeystrokeEvent::new(sequence, Duration::from_millis(ms), expected, typed, position)
}

/// Types `typed` against `target` one position per key, `interval_ms` apart,
/// starting at t = 0.
pub fn typed_run(target: &str, typed: &str, interval_ms: u64) -> Vec<KeystrokeEvent> {
    target
        .chars()
        .zip(typed.chars())
        .enumerate()
        .map(|(i, (expected, actual))| event(i as u64, i as u64 * interval_ms, expected, actual, i))
        .collect()
}

/// Same as [`typed_run`] with an explicit timestamp per key.
pub fn timed_run(target: &str, typed: &str, times_ms: &[u64]) -> Vec<KeystrokeEvent> {
    target
        .chars()
        .zip(typed.chars())
        .zip(times_ms)
        .enumerate()
        .map(|(i, ((expected, actual), &ms))| event(i as u64, ms, expected, actual, i))
        .collect()
}

/// Feeds every event to the consumer in order.
pub fn feed<C: StreamConsumer>(consumer: &mut C, events: &[KeystrokeEvent]) {
    for e in events {
        consumer.process_event(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_run_spaces_events_evenly() {
        let events = typed_run("abc", "abx", 100);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].timestamp, Duration::from_millis(200));
        assert_eq!(events[2].sequence, 2);
        assert!(!events[2].correct);
    }

    #[test]
    fn timed_run_uses_given_times() {
        let events = timed_run("ab", "ab", &[0, 250]);
        assert_eq!(events[1].timestamp, Duration::from_millis(250));
        assert_eq!(events[1].text_position, 1);
    }
}
