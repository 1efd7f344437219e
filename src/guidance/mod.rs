//! MTT guidance correction.
//!
//! Maps a movement plan onto what one particular machine can actually
//! execute: the front-offset grid search aligns the guidance values with
//! the machine's front measuring point, correction factors and capacity
//! clamps bound each sample, and the efficiency figures estimate the
//! shift.

use serde::{Deserialize, Serialize};

use crate::data::mtt::MttProfile;
use crate::data::series::Series;
use crate::error::CoreError;

/// Working direction of the machine over the section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Forward
    }
}

/// Objective minimised by the front-offset grid search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationMethod {
    /// Total energy `sum(tamping^2 + lining^2)`.
    Energy,
    /// Peak `max(|tamping|, |lining|)`.
    Peak,
    /// RMS over both channels.
    Rms,
}

impl Default for OptimizationMethod {
    fn default() -> Self {
        OptimizationMethod::Energy
    }
}

/// Grid step of the front-offset search, metres.
const OFFSET_STEP_M: f64 = 0.5;
/// Limited-ratio above which a second pass is recommended.
const LIMITED_RATIO_WARNING: f64 = 0.20;
/// Sleeper spacing assumed for cycle estimation, metres.
const SLEEPER_SPACING_M: f64 = 0.6;

/// One corrected guidance sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidancePoint {
    pub position: f64,
    /// Vertical guidance (lift), mm.
    pub tamping: f64,
    /// Lateral guidance (shift), mm.
    pub lining: f64,
    pub capacity_limited: bool,
}

/// Shift and duration estimates for the corrected plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Efficiency {
    pub total_length_km: f64,
    pub estimated_time_h: f64,
    pub limited_ratio: f64,
    pub tamping_cycles: u64,
}

/// Guidance output for one machine pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MttResult {
    pub profile_name: String,
    pub direction: Direction,
    /// Front offset selected by the grid search, metres.
    pub offset_m: f64,
    pub method: OptimizationMethod,
    pub points: Vec<GuidancePoint>,
    /// What the machine's own asymmetric measuring chord will display
    /// for the corrected lift; present when the profile carries its
    /// trolley distances.
    pub display_versine: Option<Vec<f64>>,
    pub efficiency: Efficiency,
    pub recommendations: Vec<String>,
    pub max_tamping: f64,
    pub max_lining: f64,
}

/// Asymmetric mid-chord offset of `values` as seen by a measuring
/// system with trolleys `bc_m` behind and `cd_m` ahead of the tamping
/// point. With equal distances this is the negated standard versine.
/// Samples whose chord ends fall outside the series are 0.
pub fn eccentric_versine(values: &[f64], bc_m: f64, cd_m: f64, delta_d: f64) -> Vec<f64> {
    let n = values.len();
    if bc_m <= 0.0 || cd_m <= 0.0 || delta_d <= 0.0 {
        return vec![0.0; n];
    }
    let hb = ((bc_m / delta_d).round() as usize).max(1);
    let hd = ((cd_m / delta_d).round() as usize).max(1);
    let total = bc_m + cd_m;
    let mut out = vec![0.0; n];
    for i in hb..n.saturating_sub(hd) {
        let chord = (cd_m * values[i - hb] + bc_m * values[i + hd]) / total;
        out[i] = values[i] - chord;
    }
    out
}

/// Build the corrected guidance series for a given offset.
///
/// Forward passes read the movement measured `offset` metres behind the
/// guidance point; backward passes read ahead. Out-of-range reads are
/// zero. Correction factors scale each channel before the capacity
/// clamp.
pub fn correct_for_machine(
    geometry: &Series,
    tamping: &[f64],
    lining: &[f64],
    profile: &MttProfile,
    direction: Direction,
    offset_m: f64,
) -> Vec<GuidancePoint> {
    let n = geometry.len();
    let shift = (offset_m / geometry.interval()).round() as isize;
    let shift = match direction {
        Direction::Forward => shift,
        Direction::Backward => -shift,
    };

    let sample = |data: &[f64], i: usize| -> f64 {
        let j = i as isize - shift;
        if j >= 0 && (j as usize) < data.len() {
            data[j as usize]
        } else {
            0.0
        }
    };

    (0..n)
        .map(|i| {
            let raw_tamping = sample(tamping, i) * profile.correction_factors.level;
            let raw_lining = if lining.is_empty() {
                0.0
            } else {
                sample(lining, i) * profile.correction_factors.alignment
            };
            let tamping =
                raw_tamping.clamp(-profile.lift_capacity_mm, profile.lift_capacity_mm);
            let lining = raw_lining.clamp(
                -profile.alignment_capacity_mm,
                profile.alignment_capacity_mm,
            );
            GuidancePoint {
                position: geometry.position(i),
                tamping,
                lining,
                capacity_limited: tamping != raw_tamping || lining != raw_lining,
            }
        })
        .collect()
}

fn objective(points: &[GuidancePoint], method: OptimizationMethod) -> f64 {
    match method {
        OptimizationMethod::Energy => points
            .iter()
            .map(|p| p.tamping * p.tamping + p.lining * p.lining)
            .sum(),
        OptimizationMethod::Peak => points
            .iter()
            .map(|p| p.tamping.abs().max(p.lining.abs()))
            .fold(0.0f64, f64::max),
        OptimizationMethod::Rms => {
            if points.is_empty() {
                0.0
            } else {
                let energy: f64 = points
                    .iter()
                    .map(|p| p.tamping * p.tamping + p.lining * p.lining)
                    .sum();
                (energy / points.len() as f64).sqrt()
            }
        }
    }
}

/// Grid-search the front offset around the profile's nominal value.
/// Candidates run low to high in 0.5 m steps; the first strict minimum
/// wins, so ties resolve deterministically.
pub fn optimize_front_offset(
    geometry: &Series,
    tamping: &[f64],
    lining: &[f64],
    profile: &MttProfile,
    direction: Direction,
    method: OptimizationMethod,
    search_range_m: f64,
) -> f64 {
    let mut best_offset = profile.front_offset_m - search_range_m;
    let mut best_score = f64::INFINITY;
    let steps = (2.0 * search_range_m / OFFSET_STEP_M).round() as usize;
    for step in 0..=steps {
        let offset = profile.front_offset_m - search_range_m + step as f64 * OFFSET_STEP_M;
        let points = correct_for_machine(geometry, tamping, lining, profile, direction, offset);
        let score = objective(&points, method);
        if score < best_score {
            best_score = score;
            best_offset = offset;
        }
    }
    best_offset
}

/// Run the full guidance pass for one machine.
pub fn run_guidance(
    geometry: &Series,
    tamping: &[f64],
    lining: &[f64],
    profile: &MttProfile,
    direction: Direction,
    method: OptimizationMethod,
    search_range_m: f64,
) -> Result<MttResult, CoreError> {
    profile.validate()?;
    if geometry.is_empty() || tamping.is_empty() {
        return Err(CoreError::EmptyInput);
    }

    let offset_m = optimize_front_offset(
        geometry,
        tamping,
        lining,
        profile,
        direction,
        method,
        search_range_m,
    );
    let points = correct_for_machine(geometry, tamping, lining, profile, direction, offset_m);

    let n = points.len();
    let limited = points.iter().filter(|p| p.capacity_limited).count();
    let total_length_km = n as f64 * geometry.interval() / 1000.0;
    let efficiency = Efficiency {
        total_length_km,
        estimated_time_h: total_length_km / profile.working_speed_kmh,
        limited_ratio: limited as f64 / n as f64,
        tamping_cycles: (total_length_km * 1000.0
            / (profile.tamping_units as f64 * SLEEPER_SPACING_M))
            .ceil() as u64,
    };

    let max_tamping = points.iter().map(|p| p.tamping.abs()).fold(0.0f64, f64::max);
    let max_lining = points.iter().map(|p| p.lining.abs()).fold(0.0f64, f64::max);

    let mut recommendations = Vec::new();
    if efficiency.limited_ratio > LIMITED_RATIO_WARNING {
        recommendations.push(format!(
            "{:.0}% of samples hit machine capacity; plan a second pass or relax the target line",
            efficiency.limited_ratio * 100.0
        ));
    }
    if max_tamping > 0.9 * profile.lift_capacity_mm {
        recommendations.push(format!(
            "peak lift {:.1} mm is within 10% of the {:.0} mm capacity of {}",
            max_tamping, profile.lift_capacity_mm, profile.name
        ));
    }
    if max_lining > 0.9 * profile.alignment_capacity_mm {
        recommendations.push(format!(
            "peak shift {:.1} mm is within 10% of the {:.0} mm alignment capacity of {}",
            max_lining, profile.alignment_capacity_mm, profile.name
        ));
    }
    for r in &recommendations {
        log::warn!("guidance [{}]: {}", profile.name, r);
    }

    let display_versine = match (profile.bc_distance_m, profile.cd_distance_m) {
        (Some(bc), Some(cd)) => {
            let corrected: Vec<f64> = points.iter().map(|p| p.tamping).collect();
            Some(eccentric_versine(&corrected, bc, cd, geometry.interval()))
        }
        _ => None,
    };

    Ok(MttResult {
        profile_name: profile.name.clone(),
        direction,
        offset_m,
        method,
        points,
        display_versine,
        efficiency,
        recommendations,
        max_tamping,
        max_lining,
    })
}
