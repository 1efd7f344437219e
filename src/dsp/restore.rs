//! Restoration (inverse bandpass) filter.
//!
//! The chord-based measurement process attenuates long wavelengths; the
//! restoration filter undoes that by passing the 6-40 m band of the
//! measured series through a frequency-domain FIR design. The impulse
//! response is the inverse FFT of a Hermitian bandpass mask, rotated so
//! the main tap sits at the kernel centre; applying it by direct
//! convolution is therefore zero-phase and the restored waveform stays
//! position-aligned with the input.

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::dsp::fft::{ifft, next_power_of_two};
use crate::error::CoreError;

/// Default band of wavelengths the restoration passes, in metres.
pub const DEFAULT_LAMBDA_LOWER_M: f64 = 6.0;
pub const DEFAULT_LAMBDA_UPPER_M: f64 = 40.0;

/// FIR inverse filter for one series length and band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestorationFilter {
    impulse: Vec<f64>,
    center: usize,
    padded_len: usize,
    k_low: usize,
    k_high: usize,
    lambda_lower: f64,
    lambda_upper: f64,
}

impl RestorationFilter {
    /// Design the filter for a series of `n` samples at `delta_d` metre
    /// spacing, passing wavelengths in `[lambda_lower, lambda_upper]`.
    pub fn design(
        n: usize,
        delta_d: f64,
        lambda_lower: f64,
        lambda_upper: f64,
    ) -> Result<Self, CoreError> {
        if n == 0 {
            return Err(CoreError::EmptyInput);
        }
        if !(delta_d > 0.0) || !delta_d.is_finite() {
            return Err(CoreError::NonUniformSampling {
                index: 0,
                spacing: delta_d,
                expected: crate::data::series::DEFAULT_SAMPLING_INTERVAL_M,
            });
        }
        if !(lambda_lower > 0.0) || !(lambda_upper > 0.0) || lambda_lower >= lambda_upper {
            return Err(CoreError::InvalidBand {
                lower: lambda_lower,
                upper: lambda_upper,
            });
        }

        let padded_len = next_power_of_two(n);
        let k_low = ((padded_len as f64 * delta_d / lambda_upper).ceil() as usize).max(1);
        let k_high =
            ((padded_len as f64 * delta_d / lambda_lower).floor() as usize).min(padded_len / 2);

        // Real bandpass mask with Hermitian symmetry, so the impulse
        // response comes out real.
        let mut mask = vec![Complex::new(0.0, 0.0); padded_len];
        if k_low <= k_high {
            for k in k_low..=k_high {
                mask[k] = Complex::new(1.0, 0.0);
                let mirror = padded_len - k;
                if mirror != k && mirror < padded_len {
                    mask[mirror] = Complex::new(1.0, 0.0);
                }
            }
        } else {
            log::warn!(
                "restoration band [{:.1}, {:.1}] m resolves to an empty bin range for N={}",
                lambda_lower,
                lambda_upper,
                n
            );
        }

        ifft(&mut mask)?;

        // Rotate so lag 0 lands on the centre tap; truncate to n taps.
        let center = n / 2;
        let impulse: Vec<f64> = (0..n)
            .map(|j| {
                let lag = j as isize - center as isize;
                let idx = lag.rem_euclid(padded_len as isize) as usize;
                mask[idx].re
            })
            .collect();

        Ok(Self {
            impulse,
            center,
            padded_len,
            k_low,
            k_high,
            lambda_lower,
            lambda_upper,
        })
    }

    /// The impulse response taps (centre tap at `len() / 2`).
    pub fn impulse(&self) -> &[f64] {
        &self.impulse
    }

    pub fn band(&self) -> (f64, f64) {
        (self.lambda_lower, self.lambda_upper)
    }

    /// Passband bin range `[k_low, k_high]` over the padded length.
    pub fn bin_range(&self) -> (usize, usize) {
        (self.k_low, self.k_high)
    }

    pub fn padded_len(&self) -> usize {
        self.padded_len
    }

    /// Apply the filter by direct convolution with zero extension.
    pub fn apply(&self, values: &[f64]) -> Result<Vec<f64>, CoreError> {
        if values.is_empty() {
            return Err(CoreError::EmptyInput);
        }
        let n = values.len();
        let center = self.center as isize;
        let mut out = vec![0.0; n];
        for (i, slot) in out.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (j, &w) in self.impulse.iter().enumerate() {
                let k = i as isize - (j as isize - center);
                if k >= 0 && (k as usize) < n {
                    acc += w * values[k as usize];
                }
            }
            *slot = acc;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::fft::fft_real;

    #[test]
    fn invalid_band_is_rejected() {
        assert!(matches!(
            RestorationFilter::design(512, 0.25, 40.0, 6.0),
            Err(CoreError::InvalidBand { .. })
        ));
        assert!(matches!(
            RestorationFilter::design(512, 0.25, -6.0, 40.0),
            Err(CoreError::InvalidBand { .. })
        ));
        assert!(matches!(
            RestorationFilter::design(0, 0.25, 6.0, 40.0),
            Err(CoreError::EmptyInput)
        ));
    }

    #[test]
    fn bin_range_matches_band() {
        // Np = 512, delta = 0.25: k_low = ceil(512*0.25/40) = 4,
        // k_high = floor(512*0.25/6) = 21.
        let filter = RestorationFilter::design(400, 0.25, 6.0, 40.0).unwrap();
        assert_eq!(filter.bin_range(), (4, 21));
        assert_eq!(filter.padded_len(), 512);
        assert_eq!(filter.impulse().len(), 400);
    }

    #[test]
    fn spectral_support_is_the_passband() {
        // Power-of-two length so the kernel is the untruncated inverse
        // transform of the mask and its spectrum is exact.
        let n = 512;
        let filter = RestorationFilter::design(n, 0.25, 6.0, 40.0).unwrap();
        let (k_low, k_high) = filter.bin_range();

        let spectrum = fft_real(filter.impulse()).unwrap();
        for k in 0..=n / 2 {
            let magnitude = spectrum[k].norm();
            if k >= k_low && k <= k_high {
                assert!(
                    magnitude >= 0.99,
                    "bin {} in band has magnitude {}",
                    k,
                    magnitude
                );
            } else {
                assert!(
                    magnitude <= 0.01,
                    "bin {} out of band has magnitude {}",
                    k,
                    magnitude
                );
            }
        }
    }

    #[test]
    fn in_band_sinusoid_survives() {
        // 20 m wavelength sits inside the 6-40 m band; the interior of
        // the restored series reproduces it.
        let n = 800;
        let delta = 0.25;
        let values: Vec<f64> = (0..n)
            .map(|i| 10.0 * (2.0 * std::f64::consts::PI * i as f64 * delta / 20.0).sin())
            .collect();
        let filter = RestorationFilter::design(n, delta, 6.0, 40.0).unwrap();
        let restored = filter.apply(&values).unwrap();

        for i in n / 4..3 * n / 4 {
            assert!(
                (restored[i] - values[i]).abs() < 2.0,
                "restored[{}] = {} deviates from input {}",
                i,
                restored[i],
                values[i]
            );
        }
    }

    #[test]
    fn dc_is_rejected() {
        let n = 400;
        let values = vec![5.0; n];
        let filter = RestorationFilter::design(n, 0.25, 6.0, 40.0).unwrap();
        let restored = filter.apply(&values).unwrap();

        // The band excludes DC: the middle of the restored series is
        // close to zero (edges and quarter-points carry truncation
        // ripple).
        for i in 3 * n / 8..5 * n / 8 {
            assert!(
                restored[i].abs() < 1.0,
                "restored[{}] = {} should be near zero for DC input",
                i,
                restored[i]
            );
        }
    }
}
