//! Numerical kernels: FFT, restoration filtering, versines, statistics.

pub mod fft;
pub mod restore;
pub mod stats;
pub mod versine;

pub use fft::{apply_window, next_power_of_two, WindowKind};
pub use restore::{RestorationFilter, DEFAULT_LAMBDA_LOWER_M, DEFAULT_LAMBDA_UPPER_M};
pub use stats::SeriesStats;
