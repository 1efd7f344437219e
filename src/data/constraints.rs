//! Operational constraints on plan-line synthesis.

use serde::{Deserialize, Serialize};

/// A point the plan must pass through (turnout, level crossing, bridge
/// abutment). With `target_level` the plan is pinned to that value;
/// without, the plan is pinned to the current geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedPoint {
    pub position: f64,
    pub target_level: Option<f64>,
    pub must_keep: bool,
}

/// A windowed cap on absolute movement (overhead wire height, platform
/// edges, structure gauge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementLimit {
    pub start_pos: f64,
    pub end_pos: f64,
    pub max_abs_movement: f64,
}

impl MovementLimit {
    pub fn contains(&self, position: f64) -> bool {
        position >= self.start_pos && position <= self.end_pos
    }
}

/// Constraint bag passed into the plan stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    /// Maximum upward movement (lift), mm.
    pub max_upward: f64,
    /// Maximum downward movement (drop), mm.
    pub max_downward: f64,
    pub fixed_points: Vec<FixedPoint>,
    pub movement_limits: Vec<MovementLimit>,
    pub upward_priority: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        // Typical single-pass tamping machine envelope: generous lift,
        // very little controlled drop.
        Self {
            max_upward: 50.0,
            max_downward: 10.0,
            fixed_points: Vec::new(),
            movement_limits: Vec::new(),
            upward_priority: true,
        }
    }
}

impl Constraints {
    /// The fixed point closest to `position` within `tolerance` metres.
    pub fn fixed_point_near(&self, position: f64, tolerance: f64) -> Option<&FixedPoint> {
        self.fixed_points
            .iter()
            .filter(|fp| (fp.position - position).abs() <= tolerance)
            .min_by(|a, b| {
                (a.position - position)
                    .abs()
                    .total_cmp(&(b.position - position).abs())
            })
    }

    /// The tightest movement-limit window covering `position`, if any.
    pub fn movement_limit_at(&self, position: f64) -> Option<f64> {
        self.movement_limits
            .iter()
            .filter(|w| w.contains(position))
            .map(|w| w.max_abs_movement)
            .min_by(f64::total_cmp)
    }

    /// Directional cap at `position`: `max_upward` for lifts,
    /// `max_downward` for drops, tightened by any window limit.
    pub fn allowable_movement(&self, position: f64, upward: bool) -> f64 {
        let directional = if upward {
            self.max_upward
        } else {
            self.max_downward
        };
        match self.movement_limit_at(position) {
            Some(window) => directional.min(window),
            None => directional,
        }
    }
}
