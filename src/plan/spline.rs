//! Natural cubic spline and linear interpolation through plan knots.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Natural cubic spline with second derivatives solved by the Thomas
/// (tridiagonal) algorithm. Evaluation outside the knot range extends
/// the first or last segment polynomial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at the knots; zero at both ends.
    m: Vec<f64>,
}

impl CubicSpline {
    pub fn natural(xs: &[f64], ys: &[f64]) -> Result<Self, CoreError> {
        if xs.len() < 2 || xs.len() != ys.len() {
            return Err(CoreError::EmptyInput);
        }
        for pair in xs.windows(2) {
            if pair[1] <= pair[0] {
                return Err(CoreError::NumericalInstability(format!(
                    "spline knots must be strictly increasing, got {} then {}",
                    pair[0], pair[1]
                )));
            }
        }

        let n = xs.len();
        let mut m = vec![0.0; n];
        if n > 2 {
            // Tridiagonal system for interior second derivatives.
            let rows = n - 2;
            let mut diag = vec![0.0; rows];
            let mut upper = vec![0.0; rows];
            let mut lower = vec![0.0; rows];
            let mut rhs = vec![0.0; rows];
            for r in 0..rows {
                let i = r + 1;
                let h0 = xs[i] - xs[i - 1];
                let h1 = xs[i + 1] - xs[i];
                lower[r] = h0;
                diag[r] = 2.0 * (h0 + h1);
                upper[r] = h1;
                rhs[r] = 6.0
                    * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
            }

            // Forward sweep.
            for r in 1..rows {
                let w = lower[r] / diag[r - 1];
                diag[r] -= w * upper[r - 1];
                rhs[r] -= w * rhs[r - 1];
            }
            // Back substitution.
            m[rows] = rhs[rows - 1] / diag[rows - 1];
            for r in (0..rows - 1).rev() {
                m[r + 1] = (rhs[r] - upper[r] * m[r + 2]) / diag[r];
            }
        }

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            m,
        })
    }

    /// Index of the segment used to evaluate `x` (clamped to the end
    /// segments for extrapolation).
    fn segment(&self, x: f64) -> usize {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return 0;
        }
        if x >= self.xs[n - 1] {
            return n - 2;
        }
        // Binary search for the knot interval.
        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] <= x {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let i = self.segment(x);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * h * h / 6.0
    }
}

/// Piecewise-linear interpolation through `(xs, ys)` with end-segment
/// extension, in the manner of the spline above.
pub fn interp_linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    debug_assert!(xs.len() >= 2 && xs.len() == ys.len());
    let n = xs.len();
    let i = if x <= xs[0] {
        0
    } else if x >= xs[n - 1] {
        n - 2
    } else {
        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if xs[mid] <= x {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    };
    let h = xs[i + 1] - xs[i];
    if h.abs() < 1e-12 {
        return ys[i];
    }
    ys[i] + (ys[i + 1] - ys[i]) * (x - xs[i]) / h
}
