//! Data model: sample series, curve geometry, constraints, machine
//! profiles. Everything here is produced once per pipeline invocation
//! and read-only afterwards.

pub mod constraints;
pub mod curve;
pub mod mtt;
pub mod series;

pub use constraints::{Constraints, FixedPoint, MovementLimit};
pub use curve::{
    CurveDirection, CurveElement, CurveTable, Transition, TransitionKind, VerticalCurve,
    VerticalCurveKind,
};
pub use mtt::{CorrectionFactors, MttProfile, MttRegistry};
pub use series::{Series, DEFAULT_SAMPLING_INTERVAL_M, SPACING_TOLERANCE_M};
