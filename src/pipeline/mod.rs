//! Orchestration engine.
//!
//! Fixed stage sequence over one measured series:
//! restoration -> versines -> plan -> movements -> guidance -> quality.
//! Each stage's decisions land in the work log; the first hard failure
//! short-circuits with the stage name attached; warnings accumulate in
//! the result instead of failing the run.

use serde::{Deserialize, Serialize};

use crate::data::constraints::Constraints;
use crate::data::curve::{CurveElement, CurveTable, VerticalCurve};
use crate::data::mtt::MttProfile;
use crate::data::series::{Series, DEFAULT_SAMPLING_INTERVAL_M, SPACING_TOLERANCE_M};
use crate::dsp::restore::{RestorationFilter, DEFAULT_LAMBDA_LOWER_M, DEFAULT_LAMBDA_UPPER_M};
use crate::dsp::stats::{self, SeriesStats};
use crate::dsp::versine;
use crate::error::CoreError;
use crate::guidance::{self, Direction, MttResult, OptimizationMethod};
use crate::log::worklog::WorkLog;
use crate::movement::{self, LimitCheck, LimitViolations, MovementVector, Peak, WorkSection};
use crate::plan::zero_point::{good_up_ratio, synthesize_zero_point};
use crate::plan::{convex, Interpolation, PlanLine};
use crate::quality::{self, DataType, QualityGrade, QualityReport};

/// Which plan generator the engine invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStrategy {
    ZeroPoint,
    Convex,
}

impl Default for PlanStrategy {
    fn default() -> Self {
        PlanStrategy::ZeroPoint
    }
}

/// Options steering one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub plan_strategy: PlanStrategy,
    pub interpolation: Interpolation,
    /// Restoration passband, metres of wavelength.
    pub lambda_lower: f64,
    pub lambda_upper: f64,
    /// Expected sampling interval; the input series must match.
    pub sampling_interval: f64,
    /// Master switch for upward preference (OR-ed with the constraint
    /// bag's own flag).
    pub upward_priority: bool,
    pub optimization_method: OptimizationMethod,
    pub direction: Direction,
    /// Chord lengths for the versine stage, metres.
    pub chord_lengths: Vec<f64>,
    pub smoothing_window: usize,
    /// Half-width of the front-offset grid search, metres.
    pub offset_search_range_m: f64,
    pub movement_check: LimitCheck,
    /// Window, in samples, for movement peak extraction.
    pub peak_window: usize,
    pub quality_data_type: DataType,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            plan_strategy: PlanStrategy::default(),
            interpolation: Interpolation::default(),
            lambda_lower: DEFAULT_LAMBDA_LOWER_M,
            lambda_upper: DEFAULT_LAMBDA_UPPER_M,
            sampling_interval: DEFAULT_SAMPLING_INTERVAL_M,
            upward_priority: true,
            optimization_method: OptimizationMethod::default(),
            direction: Direction::default(),
            chord_lengths: vec![10.0, 20.0, 40.0],
            smoothing_window: 5,
            offset_search_range_m: 5.0,
            movement_check: LimitCheck::default(),
            peak_window: 10,
            quality_data_type: DataType::Level,
        }
    }
}

/// Everything one pipeline invocation consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInput {
    pub samples: Series,
    pub curve_elements: Vec<CurveElement>,
    pub vertical_curves: Vec<VerticalCurve>,
    pub constraints: Constraints,
    pub mtt_profile: Option<MttProfile>,
    pub options: PipelineOptions,
}

impl PipelineInput {
    /// A minimal input: just the measured series and defaults.
    pub fn new(samples: Series) -> Self {
        Self {
            samples,
            curve_elements: Vec::new(),
            vertical_curves: Vec::new(),
            constraints: Constraints::default(),
            mtt_profile: None,
            options: PipelineOptions::default(),
        }
    }
}

/// Versines for one chord length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChordVersines {
    pub chord_m: f64,
    pub measured: Series,
    /// Present when curve elements were supplied.
    pub theoretical: Option<Series>,
    /// Statistics excluding the boundary zeros.
    pub stats: SeriesStats,
}

/// Movement and improvement statistics of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatistics {
    pub restored: SeriesStats,
    pub predicted: SeriesStats,
    pub improvement_rate_pct: f64,
    pub good_up_ratio: f64,
    pub violations: LimitViolations,
    pub peaks: Vec<Peak>,
    pub sections: Vec<WorkSection>,
}

/// The typed result bag holding every intermediate artefact.
///
/// Stages behind an abort point come back as `None` with
/// `complete == false`; a completed run populates everything except
/// `mtt`, which requires a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub restored: Series,
    pub versines: Vec<ChordVersines>,
    pub plan: Option<PlanLine>,
    pub movements: Option<Vec<MovementVector>>,
    pub predicted: Option<Series>,
    pub statistics: Option<PipelineStatistics>,
    pub mtt: Option<MttResult>,
    pub quality: Option<QualityReport>,
    pub work_log: WorkLog,
    pub complete: bool,
}

impl PipelineResult {
    /// Versines for a specific chord, if that chord was requested.
    pub fn versines_for_chord(&self, chord_m: f64) -> Option<&ChordVersines> {
        self.versines
            .iter()
            .find(|v| (v.chord_m - chord_m).abs() < 1e-9)
    }
}

/// Results of a paired level + alignment run.
///
/// The two dimensions are planned independently; when a profile is
/// supplied, one guidance pass consumes both movement channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualResult {
    pub level: PipelineResult,
    pub lateral: PipelineResult,
    pub mtt: Option<MttResult>,
}

/// Run the full pipeline.
pub fn run(input: &PipelineInput) -> Result<PipelineResult, CoreError> {
    run_with_abort(input, |_| false)
}

/// Run the pipeline over a level series and its paired alignment
/// series. `input.samples` is the level series; `lateral_samples` must
/// be sample-aligned with it.
pub fn run_dual(
    input: &PipelineInput,
    lateral_samples: &Series,
) -> Result<DualResult, CoreError> {
    if lateral_samples.len() != input.samples.len() {
        return Err(CoreError::NumericalInstability(format!(
            "lateral series length {} does not match level series length {}",
            lateral_samples.len(),
            input.samples.len()
        ))
        .in_stage("validate"));
    }

    let mut level_input = input.clone();
    level_input.mtt_profile = None;
    let level = run(&level_input)?;

    let mut lateral_input = input.clone();
    lateral_input.samples = lateral_samples.clone();
    lateral_input.mtt_profile = None;
    lateral_input.options.quality_data_type = DataType::Alignment;
    let lateral = run(&lateral_input)?;

    let mtt = match &input.mtt_profile {
        Some(profile) => {
            let tamping: Vec<f64> = level
                .movements
                .as_ref()
                .map(|ms| ms.iter().map(|m| m.amount).collect())
                .unwrap_or_default();
            let lining: Vec<f64> = lateral
                .movements
                .as_ref()
                .map(|ms| ms.iter().map(|m| m.amount).collect())
                .unwrap_or_default();
            Some(
                guidance::run_guidance(
                    &input.samples,
                    &tamping,
                    &lining,
                    profile,
                    input.options.direction,
                    input.options.optimization_method,
                    input.options.offset_search_range_m,
                )
                .map_err(|e| e.in_stage("guidance"))?,
            )
        }
        None => None,
    };

    Ok(DualResult {
        level,
        lateral,
        mtt,
    })
}

/// Run the pipeline, polling `should_abort` with the name of each
/// completed stage. A `true` return stops before the next stage; the
/// partial result is tagged incomplete, never corrupt.
pub fn run_with_abort<F>(
    input: &PipelineInput,
    mut should_abort: F,
) -> Result<PipelineResult, CoreError>
where
    F: FnMut(&str) -> bool,
{
    let mut work_log = WorkLog::new();
    let samples = &input.samples;
    let options = &input.options;
    let n = samples.len();

    // Validation: the series enforces uniformity and finiteness at
    // construction; here it is checked against the configured interval
    // and the curve table is built.
    if (samples.interval() - options.sampling_interval).abs() > SPACING_TOLERANCE_M {
        return Err(CoreError::NonUniformSampling {
            index: 0,
            spacing: samples.interval(),
            expected: options.sampling_interval,
        }
        .in_stage("validate"));
    }
    let curve_table = if input.curve_elements.is_empty() && input.vertical_curves.is_empty() {
        None
    } else {
        Some(
            CurveTable::new(input.curve_elements.clone(), input.vertical_curves.clone())
                .map_err(|e| e.in_stage("validate"))?,
        )
    };
    work_log.add_entry(
        "validate",
        &format!(
            "{} samples at {:.3} m, {} curve elements",
            n,
            samples.interval(),
            input.curve_elements.len()
        ),
    );

    let mut constraints = input.constraints.clone();
    constraints.upward_priority = constraints.upward_priority || options.upward_priority;

    // Stage 1: restoration.
    let filter = RestorationFilter::design(
        n,
        samples.interval(),
        options.lambda_lower,
        options.lambda_upper,
    )
    .map_err(|e| e.in_stage("restoration"))?;
    let restored_values = filter
        .apply(samples.values())
        .map_err(|e| e.in_stage("restoration"))?;
    let restored = samples
        .with_values(restored_values)
        .map_err(|e| e.in_stage("restoration"))?;
    let (k_low, k_high) = filter.bin_range();
    work_log.add_entry(
        "restoration",
        &format!(
            "band {:.1}-{:.1} m, bins {}-{} of {}",
            options.lambda_lower,
            options.lambda_upper,
            k_low,
            k_high,
            filter.padded_len()
        ),
    );

    let mut result = PipelineResult {
        restored,
        versines: Vec::new(),
        plan: None,
        movements: None,
        predicted: None,
        statistics: None,
        mtt: None,
        quality: None,
        work_log: WorkLog::new(),
        complete: false,
    };
    if should_abort("restoration") {
        return finish_aborted(result, work_log, "restoration");
    }

    // Stage 2: versines.
    let positions = result.restored.positions();
    for &chord in &options.chord_lengths {
        let measured_values =
            versine::measured_versine(result.restored.values(), chord, samples.interval())
                .map_err(|e| e.in_stage("versine"))?;
        let chord_stats = versine::versine_stats(&measured_values);
        let measured = samples
            .with_values(measured_values)
            .map_err(|e| e.in_stage("versine"))?;
        let theoretical = match &curve_table {
            Some(table) => Some(
                samples
                    .with_values(versine::theoretical_versine(table, &positions, chord))
                    .map_err(|e| e.in_stage("versine"))?,
            ),
            None => None,
        };
        result.versines.push(ChordVersines {
            chord_m: chord,
            measured,
            theoretical,
            stats: chord_stats,
        });
    }
    work_log.add_entry(
        "versine",
        &format!(
            "chords {:?} m{}",
            options.chord_lengths,
            if curve_table.is_some() {
                ", with theoretical values"
            } else {
                ""
            }
        ),
    );
    if should_abort("versine") {
        return finish_aborted(result, work_log, "versine");
    }

    // Stage 3: plan synthesis.
    let plan = match options.plan_strategy {
        PlanStrategy::ZeroPoint => {
            let outcome = synthesize_zero_point(
                &result.restored,
                &constraints,
                options.interpolation,
                options.smoothing_window,
            )
            .map_err(|e| e.in_stage("plan"))?;
            for w in &outcome.warnings {
                work_log.warn(w);
            }
            work_log.add_entry(
                "plan",
                &format!(
                    "zero-point ({:?}), {} crossings{}, score {:.0}",
                    options.interpolation,
                    outcome.crossings.len(),
                    if outcome.fallback {
                        ", moving-average fallback"
                    } else {
                        ""
                    },
                    outcome.plan.quality_score
                ),
            );
            outcome.plan
        }
        PlanStrategy::Convex => {
            let outcome = convex::optimize_convex(&result.restored, &constraints)
                .map_err(|e| e.in_stage("plan"))?;
            work_log.add_entry(
                "plan",
                &format!(
                    "convex, good-up ratio {:.2}, score {:.0}",
                    outcome.stats.good_up_ratio, outcome.plan.quality_score
                ),
            );
            outcome.plan
        }
    };
    result.plan = Some(plan);
    if should_abort("plan") {
        return finish_aborted(result, work_log, "plan");
    }

    // Stage 4: movements, predicted waveform, statistics.
    let plan_ref = result.plan.as_ref().expect("plan stage just completed");
    let movements =
        movement::compute_movements(samples, plan_ref).map_err(|e| e.in_stage("movement"))?;
    let predicted = movement::predicted_waveform(&result.restored, &movements)
        .map_err(|e| e.in_stage("movement"))?;

    let amounts: Vec<f64> = movements.iter().map(|m| m.amount).collect();
    let restored_stats = stats::stats(result.restored.values());
    let predicted_stats = stats::stats(predicted.values());
    let movement_series = samples
        .with_values(amounts.clone())
        .map_err(|e| e.in_stage("movement"))?;
    let statistics = PipelineStatistics {
        restored: restored_stats,
        predicted: predicted_stats,
        improvement_rate_pct: movement::improvement_rate(
            restored_stats.sigma,
            predicted_stats.sigma,
        ),
        good_up_ratio: good_up_ratio(&amounts),
        violations: movement::check_limits(&movements, &options.movement_check),
        peaks: movement::extract_peaks(&movement_series, options.peak_window),
        sections: movement::split_work_sections(&movements, options.movement_check.maximum),
    };
    work_log.add_entry(
        "movement",
        &format!(
            "sigma {:.2} -> {:.2} mm, improvement {:.1}%, good-up {:.2}",
            statistics.restored.sigma,
            statistics.predicted.sigma,
            statistics.improvement_rate_pct,
            statistics.good_up_ratio
        ),
    );
    result.movements = Some(movements);
    result.predicted = Some(predicted);
    result.statistics = Some(statistics);
    if should_abort("movement") {
        return finish_aborted(result, work_log, "movement");
    }

    // Stage 5: MTT guidance, when a profile is supplied.
    if let Some(profile) = &input.mtt_profile {
        let mtt = guidance::run_guidance(
            samples,
            &amounts,
            &[],
            profile,
            options.direction,
            options.optimization_method,
            options.offset_search_range_m,
        )
        .map_err(|e| e.in_stage("guidance"))?;
        for r in &mtt.recommendations {
            work_log.warn(r);
        }
        work_log.add_entry(
            "guidance",
            &format!(
                "{} offset {:.1} m, limited ratio {:.2}",
                mtt.profile_name, mtt.offset_m, mtt.efficiency.limited_ratio
            ),
        );
        result.mtt = Some(mtt);
    }
    if should_abort("guidance") {
        return finish_aborted(result, work_log, "guidance");
    }

    // Stage 6: quality verification over the predicted waveform.
    let predicted_ref = result
        .predicted
        .as_ref()
        .expect("movement stage just completed");
    let quality = quality::verify(predicted_ref, options.quality_data_type);
    if quality.grade == QualityGrade::Poor {
        work_log.warn(&format!(
            "predicted waveform graded poor (score {:.0})",
            quality.score
        ));
    }
    work_log.add_entry(
        "quality",
        &format!(
            "{} grade {}, score {:.0}, {} anomalies",
            quality.data_type,
            quality.grade,
            quality.score,
            quality.anomalies.len()
        ),
    );
    result.quality = Some(quality);

    result.work_log = work_log;
    result.complete = true;
    Ok(result)
}

fn finish_aborted(
    mut result: PipelineResult,
    mut work_log: WorkLog,
    stage: &str,
) -> Result<PipelineResult, CoreError> {
    let msg = format!("run aborted after stage '{}'", stage);
    work_log.warn(&msg);
    result.work_log = work_log;
    result.complete = false;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::curve::CurveDirection;
    use crate::data::mtt::MttRegistry;

    const PI: f64 = std::f64::consts::PI;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn dc_series(n: usize, level: f64) -> Series {
        init_logging();
        Series::from_values(0.0, 0.25, vec![level; n]).unwrap()
    }

    fn sinusoid_series(n: usize, amplitude: f64, lambda: f64) -> Series {
        init_logging();
        let values: Vec<f64> = (0..n)
            .map(|i| amplitude * (2.0 * PI * i as f64 * 0.25 / lambda).sin())
            .collect();
        Series::from_values(0.0, 0.25, values).unwrap()
    }

    fn loose_constraints() -> Constraints {
        Constraints {
            max_upward: 200.0,
            max_downward: 200.0,
            upward_priority: false,
            ..Constraints::default()
        }
    }

    #[test]
    fn lengths_are_preserved_end_to_end() {
        let mut input = PipelineInput::new(sinusoid_series(800, 10.0, 20.0));
        input.constraints = loose_constraints();
        input.options.upward_priority = false;
        let result = run(&input).unwrap();

        assert!(result.complete);
        assert_eq!(result.restored.len(), 800);
        assert_eq!(result.plan.as_ref().unwrap().len(), 800);
        assert_eq!(result.movements.as_ref().unwrap().len(), 800);
        assert_eq!(result.predicted.as_ref().unwrap().len(), 800);
        for v in &result.versines {
            assert_eq!(v.measured.len(), 800);
        }
    }

    #[test]
    fn pure_dc_section_is_dropped_to_grade() {
        // Constant 5 mm offset: the band rejects DC, the plan hugs the
        // zero line, and every sample is lowered by about 5 mm.
        let mut input = PipelineInput::new(dc_series(400, 5.0));
        input.constraints = loose_constraints();
        input.options.upward_priority = false;
        let result = run(&input).unwrap();

        let restored = result.restored.values();
        let sigma_restored = result.statistics.as_ref().unwrap().restored.sigma;
        assert!(
            sigma_restored < 1.5,
            "restored sigma {} should be near zero for DC input",
            sigma_restored
        );
        for i in 150..250 {
            assert!(
                restored[i].abs() < 1.0,
                "restored[{}] = {} should be near zero",
                i,
                restored[i]
            );
        }

        let movements = result.movements.as_ref().unwrap();
        let mean: f64 = movements.iter().map(|m| m.amount).sum::<f64>() / movements.len() as f64;
        assert!(
            (mean + 5.0).abs() < 0.5,
            "mean movement {} should be close to -5",
            mean
        );
        for m in movements {
            assert!(
                (m.amount + 5.0).abs() < 2.0,
                "movement at {} m is {}, expected about -5",
                m.position,
                m.amount
            );
        }

        let improvement = result.statistics.as_ref().unwrap().improvement_rate_pct;
        assert!(
            improvement.abs() < 15.0,
            "lowering a constant offset barely changes sigma, got {}%",
            improvement
        );
    }

    #[test]
    fn single_sinusoid_is_planned_flat() {
        let mut input = PipelineInput::new(sinusoid_series(800, 10.0, 20.0));
        input.constraints = Constraints {
            max_upward: 50.0,
            max_downward: 20.0,
            upward_priority: false,
            ..Constraints::default()
        };
        input.options.upward_priority = false;
        let result = run(&input).unwrap();

        // The 20 m wavelength is inside the band: the restored interior
        // tracks the input.
        let samples = input.samples.values();
        let restored = result.restored.values();
        for i in 200..600 {
            assert!(
                (restored[i] - samples[i]).abs() < 2.0,
                "restored[{}] = {} vs input {}",
                i,
                restored[i],
                samples[i]
            );
        }

        // 10 m chord versine of a 20 m sinusoid has 10 mm peaks; the
        // interior is free of edge truncation effects.
        let chord10 = result
            .versines_for_chord(10.0)
            .expect("10 m chord requested");
        let peak = chord10.measured.values()[200..600]
            .iter()
            .map(|v| v.abs())
            .fold(0.0f64, f64::max);
        assert!(
            (peak - 10.0).abs() < 1.5,
            "10 m chord versine peak {} should be near 10 mm",
            peak
        );

        // The plan hugs the zero line through the crossings.
        let plan = result.plan.as_ref().unwrap();
        for (i, &v) in plan.values.iter().enumerate() {
            assert!(v.abs() < 0.05, "plan[{}] = {} should be flat", i, v);
        }

        // Movements mirror the negated input, and the predicted
        // residual shrinks sigma substantially.
        let movements = result.movements.as_ref().unwrap();
        for (m, &s) in movements.iter().zip(samples.iter()) {
            assert!(
                (m.amount + s).abs() < 0.05,
                "movement at {} m is {}, expected {}",
                m.position,
                m.amount,
                -s
            );
        }
        let improvement = result.statistics.as_ref().unwrap().improvement_rate_pct;
        assert!(
            improvement > 50.0,
            "improvement {}% should be substantial",
            improvement
        );
    }

    #[test]
    fn movement_consistency_invariant() {
        let mut input = PipelineInput::new(sinusoid_series(640, 6.0, 25.0));
        input.constraints = loose_constraints();
        input.options.upward_priority = false;
        let result = run(&input).unwrap();

        let restored = result.restored.values();
        let predicted = result.predicted.as_ref().unwrap().values();
        let movements = result.movements.as_ref().unwrap();
        for i in 0..restored.len() {
            assert!(
                (predicted[i] - (restored[i] + movements[i].amount)).abs() < 1e-9,
                "predicted[{}] must equal restored + movement",
                i
            );
        }

        let s = result.statistics.as_ref().unwrap();
        assert_eq!(
            s.improvement_rate_pct > 0.0,
            s.predicted.sigma < s.restored.sigma,
            "improvement sign must follow the sigma ordering"
        );
    }

    #[test]
    fn circular_arc_theoretical_versine() {
        let mut input = PipelineInput::new(dc_series(500, 0.0));
        input.curve_elements = vec![CurveElement::circular(
            0.0,
            100.0,
            400.0,
            CurveDirection::Left,
        )];
        input.constraints = loose_constraints();
        input.options.upward_priority = false;
        let result = run(&input).unwrap();

        let chord10 = result.versines_for_chord(10.0).unwrap();
        let theoretical = chord10.theoretical.as_ref().expect("curve supplied");
        // Position 50 m, sample 200: 1000 * 100 / (8 * 400) = 31.25 mm.
        assert!(
            (theoretical.values()[200] - 31.25).abs() < 1e-9,
            "theoretical versine {} at 50 m",
            theoretical.values()[200]
        );
        // Sample 480 sits at 120 m, past the end of the element.
        assert_eq!(theoretical.values()[480], 0.0);
    }

    #[test]
    fn convex_strategy_bounds_the_drop() {
        // Triangle wave, amplitude 30 mm, period 40 m; the 6-40 m band
        // keeps its fundamental.
        let n = 800;
        let values: Vec<f64> = (0..n)
            .map(|i| {
                let phase = (i % 160) as f64 / 160.0;
                let tri = if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                };
                30.0 * tri
            })
            .collect();
        let mut input = PipelineInput::new(Series::from_values(0.0, 0.25, values).unwrap());
        input.options.plan_strategy = PlanStrategy::Convex;
        input.constraints = Constraints {
            max_upward: 50.0,
            max_downward: 10.0,
            upward_priority: true,
            ..Constraints::default()
        };
        let result = run(&input).unwrap();

        let plan = result.plan.as_ref().unwrap();
        let restored = result.restored.values();
        for i in 0..restored.len() {
            assert!(
                plan.values[i] - restored[i] >= -10.0 - 1e-9,
                "plan drop at {} is {}",
                i,
                plan.values[i] - restored[i]
            );
        }
    }

    #[test]
    fn mtt_clamp_limits_the_guidance() {
        // 80 mm movements against a 50 mm lift capacity.
        let mut input = PipelineInput::new(sinusoid_series(800, 80.0, 20.0));
        input.constraints = loose_constraints();
        input.options.upward_priority = false;
        let mut profile = MttRegistry::with_builtin().get("08-16").unwrap().clone();
        profile.lift_capacity_mm = 50.0;
        input.mtt_profile = Some(profile);
        let result = run(&input).unwrap();

        let mtt = result.mtt.as_ref().expect("profile supplied");
        let max_tamping = mtt
            .points
            .iter()
            .map(|p| p.tamping.abs())
            .fold(0.0f64, f64::max);
        assert!(
            max_tamping <= 50.0 + 1e-9,
            "max tamping {} must respect the capacity",
            max_tamping
        );
        assert!(mtt.points.iter().any(|p| p.capacity_limited));
        assert!(mtt.efficiency.limited_ratio > 0.0);
    }

    #[test]
    fn abort_after_restoration_returns_partial_result() {
        let mut input = PipelineInput::new(sinusoid_series(400, 5.0, 20.0));
        input.constraints = loose_constraints();
        let result = run_with_abort(&input, |stage| stage == "restoration").unwrap();

        assert!(!result.complete);
        assert_eq!(result.restored.len(), 400);
        assert!(result.plan.is_none());
        assert!(result.movements.is_none());
        assert!(result.quality.is_none());
        assert!(result
            .work_log
            .warnings
            .iter()
            .any(|w| w.contains("aborted")));
    }

    #[test]
    fn stage_failures_are_annotated() {
        let mut input = PipelineInput::new(dc_series(100, 1.0));
        input.options.lambda_lower = 40.0;
        input.options.lambda_upper = 6.0;
        let err = run(&input).unwrap_err();
        assert_eq!(err.stage(), Some("restoration"));
    }

    #[test]
    fn overlapping_curves_fail_validation() {
        let mut input = PipelineInput::new(dc_series(100, 1.0));
        input.curve_elements = vec![
            CurveElement::circular(0.0, 50.0, 400.0, CurveDirection::Left),
            CurveElement::circular(40.0, 90.0, 600.0, CurveDirection::Right),
        ];
        let err = run(&input).unwrap_err();
        assert_eq!(err.stage(), Some("validate"));
    }

    #[test]
    fn mismatched_sampling_interval_is_rejected() {
        let samples = Series::from_values(0.0, 0.5, vec![1.0; 50]).unwrap();
        let input = PipelineInput::new(samples);
        let err = run(&input).unwrap_err();
        assert_eq!(err.stage(), Some("validate"));
    }

    #[test]
    fn work_log_records_every_stage() {
        let mut input = PipelineInput::new(sinusoid_series(400, 5.0, 20.0));
        input.constraints = loose_constraints();
        input.options.upward_priority = false;
        let result = run(&input).unwrap();

        let stages: Vec<&str> = result
            .work_log
            .entries
            .iter()
            .map(|e| e.stage.as_str())
            .collect();
        for expected in [
            "validate",
            "restoration",
            "versine",
            "plan",
            "movement",
            "quality",
        ] {
            assert!(
                stages.contains(&expected),
                "work log missing stage '{}': {:?}",
                expected,
                stages
            );
        }
    }

    #[test]
    fn dual_run_feeds_both_channels_to_guidance() {
        let level = sinusoid_series(400, 20.0, 20.0);
        let lateral_values: Vec<f64> = (0..400)
            .map(|i| 12.0 * (2.0 * PI * i as f64 * 0.25 / 25.0).cos())
            .collect();
        let lateral = Series::from_values(0.0, 0.25, lateral_values).unwrap();

        let mut input = PipelineInput::new(level);
        input.constraints = loose_constraints();
        input.options.upward_priority = false;
        input.mtt_profile = Some(MttRegistry::with_builtin().get("08-32U").unwrap().clone());

        let result = run_dual(&input, &lateral).unwrap();
        assert!(result.level.complete);
        assert!(result.lateral.complete);
        assert_eq!(
            result.lateral.quality.as_ref().unwrap().data_type,
            DataType::Alignment
        );

        let mtt = result.mtt.as_ref().expect("profile supplied");
        assert!(mtt.points.iter().any(|p| p.lining != 0.0), "lining channel must be populated");
        assert!(mtt.points.iter().any(|p| p.tamping != 0.0));
    }

    #[test]
    fn dual_run_rejects_mismatched_lengths() {
        let input = PipelineInput::new(sinusoid_series(400, 5.0, 20.0));
        let lateral = sinusoid_series(300, 5.0, 20.0);
        let err = run_dual(&input, &lateral).unwrap_err();
        assert_eq!(err.stage(), Some("validate"));
    }

    #[test]
    fn result_bag_round_trips_through_json() {
        let mut input = PipelineInput::new(sinusoid_series(200, 4.0, 20.0));
        input.constraints = loose_constraints();
        input.options.upward_priority = false;
        input.mtt_profile = Some(MttRegistry::with_builtin().get("09-16").unwrap().clone());
        let result = run(&input).unwrap();

        let json = serde_json::to_string(&result).unwrap();
        let parsed: PipelineResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.restored.len(), result.restored.len());
        assert_eq!(parsed.complete, result.complete);
        assert_eq!(
            parsed.mtt.as_ref().map(|m| m.points.len()),
            result.mtt.as_ref().map(|m| m.points.len())
        );
    }
}
