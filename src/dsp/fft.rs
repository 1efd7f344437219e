//! FFT kernel.
//!
//! Thin layer over `rustfft` fixing the conventions the rest of the core
//! relies on: buffers are zero-padded to the next power of two, the
//! inverse transform carries the `1/Np` scaling, and window functions
//! return fresh vectors.

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::CoreError;

/// Next power of two >= n.
pub fn next_power_of_two(n: usize) -> usize {
    let mut p = 1;
    while p < n {
        p <<= 1;
    }
    p
}

/// In-place forward FFT after zero-padding to the next power of two.
pub fn fft(buffer: &mut Vec<Complex<f64>>) -> Result<(), CoreError> {
    if buffer.is_empty() {
        return Err(CoreError::EmptyInput);
    }
    let padded = next_power_of_two(buffer.len());
    buffer.resize(padded, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let plan = planner.plan_fft_forward(padded);
    plan.process(buffer);
    Ok(())
}

/// In-place inverse FFT with `1/Np` scaling after zero-padding.
pub fn ifft(buffer: &mut Vec<Complex<f64>>) -> Result<(), CoreError> {
    if buffer.is_empty() {
        return Err(CoreError::EmptyInput);
    }
    let padded = next_power_of_two(buffer.len());
    buffer.resize(padded, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let plan = planner.plan_fft_inverse(padded);
    plan.process(buffer);

    let scale = 1.0 / padded as f64;
    for v in buffer.iter_mut() {
        *v *= scale;
    }
    Ok(())
}

/// Forward FFT of a real vector; returns the padded complex spectrum.
pub fn fft_real(values: &[f64]) -> Result<Vec<Complex<f64>>, CoreError> {
    let mut buffer: Vec<Complex<f64>> = values.iter().map(|&v| Complex::new(v, 0.0)).collect();
    fft(&mut buffer)?;
    Ok(buffer)
}

/// Diagnostic round-trip check: `ifft(fft(v))` must reproduce `v`
/// within `1e-9 * max|v|`. Failures indicate numerical instability in
/// the transform stack and are extremely rare.
pub fn verify_round_trip(values: &[f64]) -> Result<(), CoreError> {
    let mut buffer = fft_real(values)?;
    ifft(&mut buffer)?;
    let tolerance = 1e-9 * values.iter().map(|v| v.abs()).fold(0.0f64, f64::max);
    for (i, &v) in values.iter().enumerate() {
        let err = (buffer[i].re - v).abs();
        if err > tolerance {
            return Err(CoreError::NumericalInstability(format!(
                "FFT round-trip error {:.3e} at index {} exceeds {:.3e}",
                err, i, tolerance
            )));
        }
    }
    Ok(())
}

/// Window functions for spectral analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WindowKind {
    Hanning,
    Hamming,
    Blackman,
    None,
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowKind::Hanning => write!(f, "hanning"),
            WindowKind::Hamming => write!(f, "hamming"),
            WindowKind::Blackman => write!(f, "blackman"),
            WindowKind::None => write!(f, "none"),
        }
    }
}

/// Apply a window to the data, returning a new vector.
pub fn apply_window(values: &[f64], kind: WindowKind) -> Vec<f64> {
    let n = values.len();
    if n < 2 || kind == WindowKind::None {
        return values.to_vec();
    }
    let denom = (n - 1) as f64;
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let x = 2.0 * std::f64::consts::PI * i as f64 / denom;
            let w = match kind {
                WindowKind::Hanning => 0.5 - 0.5 * x.cos(),
                WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
                WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                WindowKind::None => 1.0,
            };
            v * w
        })
        .collect()
}
