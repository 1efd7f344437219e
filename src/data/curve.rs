//! Curve geometry model.
//!
//! Horizontal curve elements (circular arcs with optional entry
//! transitions), vertical curves, and the `CurveTable` positional lookup
//! the versine engine evaluates theoretical values against. A table is
//! immutable once constructed and may be shared across concurrent
//! pipeline invocations.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Hand of a horizontal curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveDirection {
    Left,
    Right,
}

impl std::fmt::Display for CurveDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurveDirection::Left => write!(f, "left"),
            CurveDirection::Right => write!(f, "right"),
        }
    }
}

/// How curvature (and cant) evolve along a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Curvature linear in arc length.
    Clothoid,
    /// Smoothstep weighting `p^2 (3 - 2p)`.
    Cubic,
    /// Straight-line ramp.
    Linear,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionKind::Clothoid => write!(f, "clothoid"),
            TransitionKind::Cubic => write!(f, "cubic"),
            TransitionKind::Linear => write!(f, "linear"),
        }
    }
}

/// Entry transition of a curve element.
///
/// The transition occupies the first `length` metres of its element;
/// the remainder of the element runs at the full circular radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub length: f64,
    pub kind: TransitionKind,
    /// Cant at the start of the ramp, mm. Defaults to 0.
    pub start_cant: Option<f64>,
    /// Cant at the end of the ramp, mm. Defaults to the element cant.
    pub end_cant: Option<f64>,
}

/// One horizontal curve element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveElement {
    pub start_pos: f64,
    pub end_pos: f64,
    /// Circular radius in metres. Required unless the element is a pure
    /// cant ramp.
    pub radius: Option<f64>,
    /// Superelevation in the circular section, mm.
    pub cant: Option<f64>,
    pub direction: CurveDirection,
    pub transition: Option<Transition>,
}

impl CurveElement {
    /// A plain circular arc.
    pub fn circular(start_pos: f64, end_pos: f64, radius: f64, direction: CurveDirection) -> Self {
        Self {
            start_pos,
            end_pos,
            radius: Some(radius),
            cant: None,
            direction,
            transition: None,
        }
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.start_pos && position <= self.end_pos
    }

    /// Relative transition progress at `position`: 0 at the element
    /// start, 1 once the ramp is complete. 1 when there is no transition.
    pub fn transition_progress(&self, position: f64) -> f64 {
        match &self.transition {
            Some(t) if t.length > 0.0 => {
                ((position - self.start_pos) / t.length).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.start_pos >= self.end_pos {
            return Err(CoreError::InvalidCurve {
                position: self.start_pos,
                reason: "start_pos must be less than end_pos".into(),
            });
        }
        if let Some(r) = self.radius {
            if r <= 0.0 {
                return Err(CoreError::InvalidCurve {
                    position: self.start_pos,
                    reason: format!("radius must be positive, got {}", r),
                });
            }
        }
        if let Some(t) = &self.transition {
            if t.length <= 0.0 {
                return Err(CoreError::InvalidCurve {
                    position: self.start_pos,
                    reason: format!("transition length must be positive, got {}", t.length),
                });
            }
            if self.radius.is_none() {
                return Err(CoreError::InvalidCurve {
                    position: self.start_pos,
                    reason: "transition requires a target radius".into(),
                });
            }
        }
        Ok(())
    }
}

/// Classification of a vertical curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalCurveKind {
    Sag,
    Crest,
    Flat,
}

/// A parabolic vertical curve joining two grades (in permille).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerticalCurve {
    pub start_pos: f64,
    pub end_pos: f64,
    /// Intersection point of the two grade lines, within the element.
    pub grade_change_point: f64,
    pub grade_before: f64,
    pub grade_after: f64,
    pub radius: f64,
}

impl VerticalCurve {
    pub fn kind(&self) -> VerticalCurveKind {
        if self.grade_after > self.grade_before {
            VerticalCurveKind::Sag
        } else if self.grade_after < self.grade_before {
            VerticalCurveKind::Crest
        } else {
            VerticalCurveKind::Flat
        }
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.start_pos && position <= self.end_pos
    }

    /// Vertical offset (mm) of the parabola from the intersecting grade
    /// lines at `position`. Zero at both ends, extremal between them.
    pub fn offset_at(&self, position: f64) -> f64 {
        if !self.contains(position) {
            return 0.0;
        }
        let length = self.end_pos - self.start_pos;
        if length <= 0.0 {
            return 0.0;
        }
        // Grades are permille = mm/m, so the offset comes out in mm.
        let x = position - self.start_pos;
        (self.grade_after - self.grade_before) * x * (length - x) / (2.0 * length)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.start_pos >= self.end_pos {
            return Err(CoreError::InvalidCurve {
                position: self.start_pos,
                reason: "vertical curve start_pos must be less than end_pos".into(),
            });
        }
        if self.grade_change_point < self.start_pos || self.grade_change_point > self.end_pos {
            return Err(CoreError::InvalidCurve {
                position: self.start_pos,
                reason: "grade change point must lie within the element".into(),
            });
        }
        Ok(())
    }
}

/// Positional lookup over validated, non-overlapping curve elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveTable {
    elements: Vec<CurveElement>,
    vertical: Vec<VerticalCurve>,
}

impl CurveTable {
    /// Validate, sort, and index the elements.
    pub fn new(
        mut elements: Vec<CurveElement>,
        vertical: Vec<VerticalCurve>,
    ) -> Result<Self, CoreError> {
        for e in &elements {
            e.validate()?;
        }
        for v in &vertical {
            v.validate()?;
        }
        elements.sort_by(|a, b| a.start_pos.total_cmp(&b.start_pos));
        for pair in elements.windows(2) {
            if pair[1].start_pos < pair[0].end_pos {
                return Err(CoreError::OverlappingCurves {
                    position: pair[1].start_pos,
                });
            }
        }
        Ok(Self { elements, vertical })
    }

    /// A table with no curves; every lookup returns tangent-track values.
    pub fn empty() -> Self {
        Self {
            elements: Vec::new(),
            vertical: Vec::new(),
        }
    }

    pub fn elements(&self) -> &[CurveElement] {
        &self.elements
    }

    pub fn vertical_curves(&self) -> &[VerticalCurve] {
        &self.vertical
    }

    /// The element containing `position`, if any.
    pub fn element_at(&self, position: f64) -> Option<&CurveElement> {
        // Elements are sorted and non-overlapping; linear scan is fine
        // for the handful of elements a work section carries.
        self.elements.iter().find(|e| e.contains(position))
    }

    /// Local radius at `position`, accounting for transition progress.
    ///
    /// `None` on tangent track or where curvature is still zero at the
    /// very start of a transition.
    pub fn local_radius_at(&self, position: f64) -> Option<f64> {
        let element = self.element_at(position)?;
        let radius = element.radius?;
        let p = element.transition_progress(position);
        match element.transition.as_ref().map(|t| t.kind) {
            None => Some(radius),
            Some(kind) => {
                let weight = transition_weight(kind, p);
                if weight <= 0.0 {
                    None
                } else {
                    Some(radius / weight)
                }
            }
        }
    }

    /// Signed curvature `1/R` in 1/m; left-hand curves positive.
    pub fn curvature_at(&self, position: f64) -> f64 {
        let Some(element) = self.element_at(position) else {
            return 0.0;
        };
        let sign = match element.direction {
            CurveDirection::Left => 1.0,
            CurveDirection::Right => -1.0,
        };
        match self.local_radius_at(position) {
            Some(r) => sign / r,
            None => 0.0,
        }
    }

    /// Cant (mm) at `position`, ramped over the transition.
    pub fn cant_at(&self, position: f64) -> f64 {
        let Some(element) = self.element_at(position) else {
            return 0.0;
        };
        let full = element.cant.unwrap_or(0.0);
        match &element.transition {
            None => full,
            Some(t) => {
                let from = t.start_cant.unwrap_or(0.0);
                let to = t.end_cant.unwrap_or(full);
                let p = element.transition_progress(position);
                from + (to - from) * transition_weight(t.kind, p)
            }
        }
    }

    /// Gauge widening (slack) in mm at `position`.
    ///
    /// Standard narrow-gauge table: `23400 / R`, rounded down to 5 mm
    /// steps, capped at 30 mm, zero below 5 mm.
    pub fn slack_at(&self, position: f64) -> f64 {
        match self.local_radius_at(position) {
            None => 0.0,
            Some(r) => {
                let raw = 23400.0 / r;
                let stepped = (raw / 5.0).floor() * 5.0;
                stepped.clamp(0.0, 30.0)
            }
        }
    }

    /// Vertical-curve offset (mm) at `position`.
    pub fn vertical_offset_at(&self, position: f64) -> f64 {
        self.vertical
            .iter()
            .filter(|v| v.contains(position))
            .map(|v| v.offset_at(position))
            .sum()
    }
}

/// Weighting of curvature/cant along a transition at progress `p`.
pub(crate) fn transition_weight(kind: TransitionKind, p: f64) -> f64 {
    let p = p.clamp(0.0, 1.0);
    match kind {
        TransitionKind::Clothoid | TransitionKind::Linear => p,
        TransitionKind::Cubic => p * p * (3.0 - 2.0 * p),
    }
}
