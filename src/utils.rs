//! Shared utility functions and traits

use serde::{Deserialize, Serialize};

/// Extension trait for tracking minimum and maximum values in Option<T>.
///
/// # Example
///
/// ```
/// use typing_telemetry::utils::MinMaxExt;
///
/// let mut min: Option<u64> = None;
/// let mut max: Option<u64> = None;
///
/// min.update_min(50);
/// max.update_max(50);
/// min.update_min(30);
/// max.update_max(70);
/// assert_eq!(min, Some(30));
/// assert_eq!(max, Some(70));
/// ```
pub trait MinMaxExt<T: Ord + Copy> {
    /// Stores `value` if it is smaller than the current minimum or none exists yet.
    fn update_min(&mut self, value: T);

    /// Stores `value` if it is larger than the current maximum or none exists yet.
    fn update_max(&mut self, value: T);
}

impl<T: Ord + Copy> MinMaxExt<T> for Option<T> {
    fn update_min(&mut self, value: T) {
        *self = Some(self.map(|m| m.min(value)).unwrap_or(value));
    }

    fn update_max(&mut self, value: T) {
        *self = Some(self.map(|m| m.max(value)).unwrap_or(value));
    }
}

/// Welford's online mean and variance accumulator.
///
/// ```
/// use typing_telemetry::utils::Welford;
///
/// let mut w = Welford::default();
/// for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
///     w.push(x);
/// }
/// assert!((w.mean() - 5.0).abs() < 1e-12);
/// assert!((w.variance() - 4.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of all samples, 0 when empty
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance, 0 with fewer than two samples
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
