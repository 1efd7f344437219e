//! Data-quality verification.
//!
//! Base statistics, anomaly detection (z-score and IQR outliers, jumps,
//! abnormal gradients, flat regions, consecutive-anomaly runs) and a
//! composite quality grade against per-data-type threshold tables.

use serde::{Deserialize, Serialize};

use crate::data::series::Series;
use crate::dsp::stats::{self, SeriesStats};

/// What the verified series measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Level,
    Alignment,
    Cant,
    Gauge,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Level => write!(f, "level"),
            DataType::Alignment => write!(f, "alignment"),
            DataType::Cant => write!(f, "cant"),
            DataType::Gauge => write!(f, "gauge"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    ZScoreOutlier,
    IqrOutlier,
    Jump,
    AbnormalGradient,
    FlatRegion,
    ConsecutiveRun,
}

/// One detected anomaly; runs span `start_index..=end_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub start_index: usize,
    pub end_index: usize,
    pub position: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityGrade::Excellent => write!(f, "excellent"),
            QualityGrade::Good => write!(f, "good"),
            QualityGrade::Acceptable => write!(f, "acceptable"),
            QualityGrade::Poor => write!(f, "poor"),
        }
    }
}

/// Thresholds one grade tier must satisfy, mm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GradeThresholds {
    pub sigma: f64,
    pub max_abs: f64,
    pub rms: f64,
}

/// Verification report for one series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub data_type: DataType,
    pub stats: SeriesStats,
    pub anomalies: Vec<Anomaly>,
    pub score: f64,
    pub grade: QualityGrade,
}

/// Z-score beyond which a sample is anomalous / critical.
const ZSCORE_WARNING: f64 = 3.5;
const ZSCORE_CRITICAL: f64 = 5.0;
/// Step between adjacent samples flagged as a jump, mm.
const JUMP_THRESHOLD_MM: f64 = 20.0;
/// Central-difference gradient threshold, mm/m.
const GRADIENT_THRESHOLD: f64 = 50.0;
/// Flat-region tolerance (mm) and minimum run length.
const FLAT_TOLERANCE_MM: f64 = 0.1;
const FLAT_MIN_RUN: usize = 10;
/// Minimum length of a consecutive-anomaly run.
const CONSECUTIVE_MIN_RUN: usize = 5;

/// Threshold tiers (excellent, good, acceptable) per data type.
fn grade_table(data_type: DataType) -> [GradeThresholds; 3] {
    match data_type {
        DataType::Level => [
            GradeThresholds { sigma: 1.5, max_abs: 4.0, rms: 2.0 },
            GradeThresholds { sigma: 2.5, max_abs: 7.0, rms: 3.5 },
            GradeThresholds { sigma: 4.0, max_abs: 12.0, rms: 5.5 },
        ],
        DataType::Alignment => [
            GradeThresholds { sigma: 1.2, max_abs: 3.5, rms: 1.8 },
            GradeThresholds { sigma: 2.0, max_abs: 6.0, rms: 3.0 },
            GradeThresholds { sigma: 3.5, max_abs: 10.0, rms: 5.0 },
        ],
        DataType::Cant => [
            GradeThresholds { sigma: 1.0, max_abs: 3.0, rms: 1.5 },
            GradeThresholds { sigma: 1.8, max_abs: 5.0, rms: 2.5 },
            GradeThresholds { sigma: 3.0, max_abs: 9.0, rms: 4.5 },
        ],
        DataType::Gauge => [
            GradeThresholds { sigma: 0.8, max_abs: 2.5, rms: 1.2 },
            GradeThresholds { sigma: 1.5, max_abs: 4.5, rms: 2.2 },
            GradeThresholds { sigma: 2.5, max_abs: 8.0, rms: 4.0 },
        ],
    }
}

/// Verify a series and grade it for its data type.
pub fn verify(series: &Series, data_type: DataType) -> QualityReport {
    let values = series.values();
    let base = stats::stats(values);
    let mut anomalies = Vec::new();
    let mut flagged = vec![false; values.len()];

    detect_zscore(series, &base, &mut anomalies, &mut flagged);
    detect_iqr(series, &mut anomalies, &mut flagged);
    detect_jumps(series, &mut anomalies, &mut flagged);
    detect_gradients(series, &mut anomalies, &mut flagged);
    detect_flat_regions(series, &mut anomalies);
    detect_consecutive_runs(series, &flagged, &mut anomalies);

    let grade = grade_of(&base, data_type);
    let score = composite_score(&base, &anomalies, data_type);

    if grade == QualityGrade::Poor {
        log::warn!(
            "{} series graded poor (sigma {:.2} mm, max {:.2} mm)",
            data_type,
            base.sigma,
            base.max.abs().max(base.min.abs())
        );
    }

    QualityReport {
        data_type,
        stats: base,
        anomalies,
        score,
        grade,
    }
}

fn push_sample(
    anomalies: &mut Vec<Anomaly>,
    flagged: &mut [bool],
    series: &Series,
    i: usize,
    kind: AnomalyKind,
    severity: Severity,
) {
    flagged[i] = true;
    anomalies.push(Anomaly {
        kind,
        severity,
        start_index: i,
        end_index: i,
        position: series.position(i),
        value: series.values()[i],
    });
}

fn detect_zscore(
    series: &Series,
    base: &SeriesStats,
    anomalies: &mut Vec<Anomaly>,
    flagged: &mut [bool],
) {
    if base.sigma == 0.0 {
        return;
    }
    for (i, &v) in series.values().iter().enumerate() {
        let z = (v - base.mean).abs() / base.sigma;
        if z > ZSCORE_WARNING {
            let severity = if z > ZSCORE_CRITICAL {
                Severity::Critical
            } else {
                Severity::Warning
            };
            push_sample(anomalies, flagged, series, i, AnomalyKind::ZScoreOutlier, severity);
        }
    }
}

fn detect_iqr(series: &Series, anomalies: &mut Vec<Anomaly>, flagged: &mut [bool]) {
    let values = series.values();
    if values.len() < 4 {
        return;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    if iqr == 0.0 {
        return;
    }
    let lo = q1 - 1.5 * iqr;
    let hi = q3 + 1.5 * iqr;
    for (i, &v) in values.iter().enumerate() {
        if v < lo || v > hi {
            push_sample(anomalies, flagged, series, i, AnomalyKind::IqrOutlier, Severity::Warning);
        }
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
    }
}

fn detect_jumps(series: &Series, anomalies: &mut Vec<Anomaly>, flagged: &mut [bool]) {
    let values = series.values();
    for i in 1..values.len() {
        if (values[i] - values[i - 1]).abs() > JUMP_THRESHOLD_MM {
            push_sample(anomalies, flagged, series, i, AnomalyKind::Jump, Severity::Critical);
        }
    }
}

fn detect_gradients(series: &Series, anomalies: &mut Vec<Anomaly>, flagged: &mut [bool]) {
    let values = series.values();
    let n = values.len();
    if n < 3 {
        return;
    }
    let span = 2.0 * series.interval();
    for i in 1..n - 1 {
        let gradient = (values[i + 1] - values[i - 1]) / span;
        if gradient.abs() > GRADIENT_THRESHOLD {
            push_sample(
                anomalies,
                flagged,
                series,
                i,
                AnomalyKind::AbnormalGradient,
                Severity::Warning,
            );
        }
    }
}

fn detect_flat_regions(series: &Series, anomalies: &mut Vec<Anomaly>) {
    let values = series.values();
    let n = values.len();
    let mut i = 0;
    while i < n {
        let anchor = values[i];
        let mut j = i + 1;
        while j < n && (values[j] - anchor).abs() <= FLAT_TOLERANCE_MM {
            j += 1;
        }
        let run = j - i;
        if run >= FLAT_MIN_RUN {
            anomalies.push(Anomaly {
                kind: AnomalyKind::FlatRegion,
                severity: Severity::Warning,
                start_index: i,
                end_index: j - 1,
                position: series.position(i),
                value: anchor,
            });
        }
        i = if run > 1 { j } else { i + 1 };
    }
}

fn detect_consecutive_runs(series: &Series, flagged: &[bool], anomalies: &mut Vec<Anomaly>) {
    let mut run_start: Option<usize> = None;
    for i in 0..=flagged.len() {
        let on = i < flagged.len() && flagged[i];
        match (on, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                if i - start >= CONSECUTIVE_MIN_RUN {
                    anomalies.push(Anomaly {
                        kind: AnomalyKind::ConsecutiveRun,
                        severity: Severity::Critical,
                        start_index: start,
                        end_index: i - 1,
                        position: series.position(start),
                        value: series.values()[start],
                    });
                }
                run_start = None;
            }
            _ => {}
        }
    }
}

fn grade_of(base: &SeriesStats, data_type: DataType) -> QualityGrade {
    let max_abs = base.max.abs().max(base.min.abs());
    let tiers = grade_table(data_type);
    let grades = [
        QualityGrade::Excellent,
        QualityGrade::Good,
        QualityGrade::Acceptable,
    ];
    for (tier, grade) in tiers.iter().zip(grades.iter()) {
        if base.sigma <= tier.sigma && max_abs <= tier.max_abs && base.rms <= tier.rms {
            return *grade;
        }
    }
    QualityGrade::Poor
}

fn composite_score(base: &SeriesStats, anomalies: &[Anomaly], data_type: DataType) -> f64 {
    let mut score: f64 = 100.0;
    for a in anomalies {
        score -= match a.severity {
            Severity::Warning => 2.0,
            Severity::Critical => 5.0,
        };
    }
    let acceptable = grade_table(data_type)[2];
    let max_abs = base.max.abs().max(base.min.abs());
    if base.sigma > acceptable.sigma {
        score -= 15.0;
    }
    if max_abs > acceptable.max_abs {
        score -= 10.0;
    }
    if base.rms > acceptable.rms {
        score -= 10.0;
    }
    score.clamp(0.0, 100.0)
}
