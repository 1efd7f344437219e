//! trackalign — track-alignment correction planning core.
//!
//! Computes correction plans for maintenance tamping machines from
//! measured track-irregularity series: restores the long-wavelength
//! geometry hidden by chord-based measurement, synthesizes a target
//! plan line under operational constraints, derives per-sample
//! movements, clamps them to a machine profile, and verifies the
//! predicted result.
//!
//! The crate is a pure, deterministic library: inputs are in-memory
//! series, outputs are freshly allocated result bags, and a work log of
//! every stage decision rides along in the result. Independent
//! invocations may run concurrently; nothing here holds shared mutable
//! state.

pub mod data;
pub mod dsp;
pub mod error;
pub mod guidance;
pub mod log;
pub mod movement;
pub mod pipeline;
pub mod plan;
pub mod quality;

pub use data::{
    Constraints, CurveDirection, CurveElement, CurveTable, FixedPoint, MovementLimit,
    MttProfile, MttRegistry, Series, Transition, TransitionKind, VerticalCurve,
};
pub use error::CoreError;
pub use guidance::{Direction, MttResult, OptimizationMethod};
pub use pipeline::{
    run, run_dual, run_with_abort, DualResult, PipelineInput, PipelineOptions, PipelineResult,
    PlanStrategy,
};
pub use plan::{Interpolation, PlanLine};
pub use quality::{DataType, QualityGrade, QualityReport};
