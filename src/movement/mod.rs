//! Movement calculator: per-sample movement vectors, the predicted
//! post-work waveform, improvement statistics, limit checks, peak
//! extraction, and work-section partitioning.

use serde::{Deserialize, Serialize};

use crate::data::series::Series;
use crate::dsp::stats;
use crate::error::CoreError;
use crate::plan::PlanLine;

/// Signed direction of one movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Movement of one sample from its current level to the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementVector {
    pub position: f64,
    pub current_level: f64,
    pub target_level: f64,
    /// Signed movement `target - current`, mm; positive lifts.
    pub amount: f64,
    pub direction: MoveDirection,
    /// Clamped by a movement-limit window during planning.
    pub constrained: bool,
    pub fixed: bool,
}

/// Movement-limit thresholds for the violation report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitCheck {
    pub standard: f64,
    pub maximum: f64,
}

impl Default for LimitCheck {
    fn default() -> Self {
        Self {
            standard: 25.0,
            maximum: 50.0,
        }
    }
}

/// Samples whose movement exceeds the configured limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitViolations {
    /// `standard < |m| <= maximum`.
    pub standard_exceeded: Vec<usize>,
    /// `|m| > maximum`.
    pub maximum_exceeded: Vec<usize>,
}

/// A windowed local extremum of a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peak {
    pub index: usize,
    pub position: f64,
    pub value: f64,
}

/// A contiguous run of workable samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSection {
    pub start_index: usize,
    pub end_index: usize,
    pub max_abs_movement: f64,
    pub mean_abs_movement: f64,
}

/// Per-sample movements from the current geometry to the plan.
pub fn compute_movements(
    current: &Series,
    plan: &PlanLine,
) -> Result<Vec<MovementVector>, CoreError> {
    if current.is_empty() {
        return Err(CoreError::EmptyInput);
    }
    if current.len() != plan.len() {
        return Err(CoreError::NumericalInstability(format!(
            "plan length {} does not match series length {}",
            plan.len(),
            current.len()
        )));
    }
    Ok(current
        .values()
        .iter()
        .enumerate()
        .map(|(i, &level)| {
            let target = plan.values[i];
            let amount = target - level;
            MovementVector {
                position: current.position(i),
                current_level: level,
                target_level: target,
                amount,
                direction: if amount >= 0.0 {
                    MoveDirection::Up
                } else {
                    MoveDirection::Down
                },
                constrained: plan.limited[i],
                fixed: plan.fixed[i],
            }
        })
        .collect())
}

/// Predicted post-work waveform: `restored + movement`, sample-aligned.
pub fn predicted_waveform(
    restored: &Series,
    movements: &[MovementVector],
) -> Result<Series, CoreError> {
    if restored.len() != movements.len() {
        return Err(CoreError::NumericalInstability(format!(
            "movement length {} does not match series length {}",
            movements.len(),
            restored.len()
        )));
    }
    let values: Vec<f64> = restored
        .values()
        .iter()
        .zip(movements.iter())
        .map(|(r, m)| r + m.amount)
        .collect();
    restored.with_values(values)
}

/// Sigma-improvement rate in percent; 0 when the input sigma is 0.
pub fn improvement_rate(sigma_before: f64, sigma_after: f64) -> f64 {
    if sigma_before == 0.0 {
        0.0
    } else {
        (sigma_before - sigma_after) / sigma_before * 100.0
    }
}

/// Group movement amounts into standard / maximum limit violations.
pub fn check_limits(movements: &[MovementVector], limits: &LimitCheck) -> LimitViolations {
    let mut violations = LimitViolations::default();
    for (i, m) in movements.iter().enumerate() {
        let magnitude = m.amount.abs();
        if magnitude > limits.maximum {
            violations.maximum_exceeded.push(i);
        } else if magnitude > limits.standard {
            violations.standard_exceeded.push(i);
        }
    }
    violations
}

/// Windowed local extrema: samples whose magnitude strictly exceeds
/// every neighbour within `window` samples. Top 10 by magnitude.
pub fn extract_peaks(series: &Series, window: usize) -> Vec<Peak> {
    let values = series.values();
    let n = values.len();
    let window = window.max(1);
    let mut peaks: Vec<Peak> = Vec::new();
    for i in 0..n {
        let magnitude = values[i].abs();
        if magnitude == 0.0 {
            continue;
        }
        let lo = i.saturating_sub(window);
        let hi = (i + window).min(n - 1);
        let dominates = (lo..=hi).all(|j| j == i || values[j].abs() < magnitude);
        if dominates {
            peaks.push(Peak {
                index: i,
                position: series.position(i),
                value: values[i],
            });
        }
    }
    peaks.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
    peaks.truncate(10);
    peaks
}

/// Partition the movement series into maximal contiguous runs in which
/// every sample stays within `max_movement`. Samples beyond the cap
/// separate the runs and belong to none.
pub fn split_work_sections(movements: &[MovementVector], max_movement: f64) -> Vec<WorkSection> {
    let mut sections = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, m) in movements.iter().enumerate() {
        if m.amount.abs() <= max_movement {
            if run_start.is_none() {
                run_start = Some(i);
            }
        } else if let Some(start) = run_start.take() {
            sections.push(section_from(movements, start, i - 1));
        }
    }
    if let Some(start) = run_start {
        sections.push(section_from(movements, start, movements.len() - 1));
    }
    sections
}

fn section_from(movements: &[MovementVector], start: usize, end: usize) -> WorkSection {
    let amounts: Vec<f64> = movements[start..=end].iter().map(|m| m.amount).collect();
    WorkSection {
        start_index: start,
        end_index: end,
        max_abs_movement: stats::max_abs(&amounts),
        mean_abs_movement: stats::mean_abs(&amounts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: Vec<f64>) -> Series {
        Series::from_values(0.0, 0.25, values).unwrap()
    }

    #[test]
    fn movements_are_plan_minus_current() {
        let current = series(vec![5.0, -3.0, 0.0, 2.0]);
        let plan = PlanLine::unconstrained(vec![0.0, 0.0, 1.0, 2.0]);
        let movements = compute_movements(&current, &plan).unwrap();
        assert_eq!(movements.len(), 4);
        assert_eq!(movements[0].amount, -5.0);
        assert_eq!(movements[0].direction, MoveDirection::Down);
        assert_eq!(movements[1].amount, 3.0);
        assert_eq!(movements[1].direction, MoveDirection::Up);
        assert_eq!(movements[3].amount, 0.0);
        assert_eq!(movements[3].direction, MoveDirection::Up);
    }

    #[test]
    fn predicted_is_restored_plus_movement() {
        let restored = series(vec![1.0, 2.0, -1.0]);
        let current = series(vec![1.5, 2.0, -0.5]);
        let plan = PlanLine::unconstrained(vec![0.0, 0.0, 0.0]);
        let movements = compute_movements(&current, &plan).unwrap();
        let predicted = predicted_waveform(&restored, &movements).unwrap();
        for i in 0..3 {
            let expected = restored.values()[i] + movements[i].amount;
            assert!(
                (predicted.values()[i] - expected).abs() < 1e-9,
                "predicted[{}] mismatch",
                i
            );
        }
    }

    #[test]
    fn improvement_rate_sign_matches_sigma_ordering() {
        assert!(improvement_rate(2.0, 1.0) > 0.0);
        assert!(improvement_rate(1.0, 2.0) < 0.0);
        assert_eq!(improvement_rate(0.0, 1.0), 0.0);
        assert!((improvement_rate(4.0, 1.0) - 75.0).abs() < 1e-12);
    }

    #[test]
    fn limit_groups_are_disjoint() {
        let current = series(vec![0.0; 4]);
        let plan = PlanLine::unconstrained(vec![10.0, 30.0, 60.0, -55.0]);
        let movements = compute_movements(&current, &plan).unwrap();
        let violations = check_limits(&movements, &LimitCheck::default());
        assert_eq!(violations.standard_exceeded, vec![1]);
        assert_eq!(violations.maximum_exceeded, vec![2, 3]);
    }

    #[test]
    fn peaks_are_windowed_extrema() {
        let mut values = vec![0.0; 100];
        values[20] = 8.0;
        values[21] = 3.0;
        values[60] = -12.0;
        let s = series(values);
        let peaks = extract_peaks(&s, 10);
        assert_eq!(peaks.len(), 2);
        // Sorted by magnitude, the -12 peak leads.
        assert_eq!(peaks[0].index, 60);
        assert_eq!(peaks[0].value, -12.0);
        assert_eq!(peaks[1].index, 20);
    }

    #[test]
    fn neighbouring_equal_magnitudes_cancel() {
        let mut values = vec![0.0; 50];
        values[10] = 5.0;
        values[12] = -5.0;
        let s = series(values);
        // Neither strictly dominates its window.
        assert!(extract_peaks(&s, 10).is_empty());
    }

    #[test]
    fn work_sections_split_on_oversized_movements() {
        let current = series(vec![0.0; 7]);
        let plan = PlanLine::unconstrained(vec![1.0, 2.0, 90.0, 3.0, 4.0, 95.0, 5.0]);
        let movements = compute_movements(&current, &plan).unwrap();
        let sections = split_work_sections(&movements, 50.0);
        assert_eq!(sections.len(), 3);
        assert_eq!(
            (sections[0].start_index, sections[0].end_index),
            (0, 1)
        );
        assert_eq!(
            (sections[1].start_index, sections[1].end_index),
            (3, 4)
        );
        assert_eq!(
            (sections[2].start_index, sections[2].end_index),
            (6, 6)
        );
        assert!((sections[1].max_abs_movement - 4.0).abs() < 1e-12);
        assert!((sections[1].mean_abs_movement - 3.5).abs() < 1e-12);
    }
}
