//! Uniformly sampled longitudinal series.
//!
//! A `Series` is the single sample shape the whole core operates on:
//! values in mm at positions `start_pos + i * interval` metres. Adapters
//! coerce whatever they ingest into this shape; uniformity and
//! finiteness are checked once at construction and every downstream
//! component can rely on them.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Tolerance for inter-sample spacing deviation, in metres.
pub const SPACING_TOLERANCE_M: f64 = 1e-3;

/// Default sampling interval of the measurement cars, in metres.
pub const DEFAULT_SAMPLING_INTERVAL_M: f64 = 0.25;

/// A finite, uniformly sampled longitudinal profile.
///
/// Positions are implicit: `position(i) = start_pos + i * interval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    start_pos: f64,
    interval: f64,
    values: Vec<f64>,
}

impl Series {
    /// Build a series from explicit `(position [m], value [mm])` samples.
    ///
    /// Validates that positions are strictly increasing with uniform
    /// spacing (within [`SPACING_TOLERANCE_M`]) and that every value is
    /// finite.
    pub fn from_samples(samples: &[(f64, f64)]) -> Result<Self, CoreError> {
        if samples.is_empty() {
            return Err(CoreError::EmptyInput);
        }

        let interval = if samples.len() >= 2 {
            samples[1].0 - samples[0].0
        } else {
            DEFAULT_SAMPLING_INTERVAL_M
        };
        if interval <= 0.0 {
            return Err(CoreError::NonUniformSampling {
                index: 1,
                spacing: interval,
                expected: DEFAULT_SAMPLING_INTERVAL_M,
            });
        }

        for i in 1..samples.len() {
            let spacing = samples[i].0 - samples[i - 1].0;
            if (spacing - interval).abs() > SPACING_TOLERANCE_M {
                return Err(CoreError::NonUniformSampling {
                    index: i,
                    spacing,
                    expected: interval,
                });
            }
        }

        let values: Vec<f64> = samples.iter().map(|&(_, v)| v).collect();
        Self::from_values(samples[0].0, interval, values)
    }

    /// Build a series from a start position, interval, and raw values.
    pub fn from_values(
        start_pos: f64,
        interval: f64,
        values: Vec<f64>,
    ) -> Result<Self, CoreError> {
        if values.is_empty() {
            return Err(CoreError::EmptyInput);
        }
        if !(interval > 0.0) || !interval.is_finite() || !start_pos.is_finite() {
            return Err(CoreError::NonUniformSampling {
                index: 0,
                spacing: interval,
                expected: DEFAULT_SAMPLING_INTERVAL_M,
            });
        }
        for (i, v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(CoreError::NonFiniteSample { index: i });
            }
        }
        Ok(Self {
            start_pos,
            interval,
            values,
        })
    }

    /// A new series with the same geometry but different values.
    ///
    /// Panics in debug builds if the length differs; the pipeline only
    /// ever derives same-length value vectors.
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self, CoreError> {
        debug_assert_eq!(values.len(), self.values.len());
        Self::from_values(self.start_pos, self.interval, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn start_pos(&self) -> f64 {
        self.start_pos
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Position of sample `i` in metres.
    pub fn position(&self, i: usize) -> f64 {
        self.start_pos + i as f64 * self.interval
    }

    /// All sample positions.
    pub fn positions(&self) -> Vec<f64> {
        (0..self.values.len()).map(|i| self.position(i)).collect()
    }

    /// Nearest sample index for a position, clamped into range.
    pub fn index_of(&self, position: f64) -> usize {
        let raw = (position - self.start_pos) / self.interval;
        let idx = raw.round();
        if idx <= 0.0 {
            0
        } else {
            (idx as usize).min(self.values.len() - 1)
        }
    }

    /// Maximum absolute value, for normalization and tolerances.
    pub fn max_abs(&self) -> f64 {
        self.values.iter().map(|v| v.abs()).fold(0.0f64, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_samples_accepts_uniform_spacing() {
        let samples: Vec<(f64, f64)> = (0..10).map(|i| (i as f64 * 0.25, i as f64)).collect();
        let series = Series::from_samples(&samples).expect("uniform series should validate");
        assert_eq!(series.len(), 10);
        assert!((series.interval() - 0.25).abs() < 1e-12);
        assert!((series.position(4) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn from_samples_rejects_nonuniform_spacing() {
        let samples = vec![(0.0, 1.0), (0.25, 2.0), (0.60, 3.0)];
        let err = Series::from_samples(&samples).unwrap_err();
        match err {
            CoreError::NonUniformSampling { index, .. } => assert_eq!(index, 2),
            other => panic!("expected NonUniformSampling, got {:?}", other),
        }
    }

    #[test]
    fn from_values_rejects_empty_and_nonfinite() {
        assert!(matches!(
            Series::from_values(0.0, 0.25, vec![]),
            Err(CoreError::EmptyInput)
        ));
        assert!(matches!(
            Series::from_values(0.0, 0.25, vec![1.0, f64::NAN]),
            Err(CoreError::NonFiniteSample { index: 1 })
        ));
    }

    #[test]
    fn index_of_clamps_to_range() {
        let series = Series::from_values(0.0, 0.25, vec![0.0; 8]).unwrap();
        assert_eq!(series.index_of(-5.0), 0);
        assert_eq!(series.index_of(0.51), 2);
        assert_eq!(series.index_of(100.0), 7);
    }
}
