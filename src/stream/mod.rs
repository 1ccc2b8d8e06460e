//! Keystroke events and the ordered stream they flow through

mod event;
mod ordering;

pub use event::{parse_char, KeystrokeEvent};
pub use ordering::EventStream;
