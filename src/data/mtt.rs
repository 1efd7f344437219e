//! MTT machine profiles and the profile registry.
//!
//! Capacities and offsets vary per machine series; the registry is a
//! plain value constructed once at startup and passed to whoever needs
//! it. Eccentricity distances (BC/CD) are configuration data carried on
//! the profile, never hard-coded in the guidance pass.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Multiplicative correction factors applied to guidance values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionFactors {
    pub level: f64,
    pub alignment: f64,
    pub cant: f64,
    pub gauge: f64,
}

impl Default for CorrectionFactors {
    fn default() -> Self {
        Self {
            level: 1.0,
            alignment: 1.0,
            cant: 1.0,
            gauge: 1.0,
        }
    }
}

/// Working profile of one tamping machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MttProfile {
    pub name: String,
    /// Distance from the front measuring point to the tamping unit, m.
    pub front_offset_m: f64,
    pub working_speed_kmh: f64,
    pub lift_capacity_mm: f64,
    pub alignment_capacity_mm: f64,
    /// Sleepers tamped per insertion cycle.
    pub tamping_units: u32,
    pub measurement_chord_m: f64,
    pub correction_factors: CorrectionFactors,
    /// Eccentricity distances of the measuring trolleys, m.
    pub bc_distance_m: Option<f64>,
    pub cd_distance_m: Option<f64>,
}

impl MttProfile {
    /// Check the fields the guidance pass relies on.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |reason: String| CoreError::InvalidProfile {
            name: self.name.clone(),
            reason,
        };
        if self.name.is_empty() {
            return Err(CoreError::InvalidProfile {
                name: "<unnamed>".into(),
                reason: "profile name is required".into(),
            });
        }
        if !(self.lift_capacity_mm > 0.0) {
            return Err(fail(format!(
                "lift capacity must be positive, got {}",
                self.lift_capacity_mm
            )));
        }
        if !(self.alignment_capacity_mm > 0.0) {
            return Err(fail(format!(
                "alignment capacity must be positive, got {}",
                self.alignment_capacity_mm
            )));
        }
        if !(self.working_speed_kmh > 0.0) {
            return Err(fail(format!(
                "working speed must be positive, got {}",
                self.working_speed_kmh
            )));
        }
        if self.tamping_units == 0 {
            return Err(fail("tamping units must be at least 1".into()));
        }
        if !(self.measurement_chord_m > 0.0) {
            return Err(fail(format!(
                "measurement chord must be positive, got {}",
                self.measurement_chord_m
            )));
        }
        Ok(())
    }
}

/// Immutable lookup of machine profiles by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MttRegistry {
    profiles: Vec<MttProfile>,
}

impl MttRegistry {
    /// Registry preloaded with the common Plasser machine series.
    pub fn with_builtin() -> Self {
        Self {
            profiles: builtin_profiles(),
        }
    }

    pub fn empty() -> Self {
        Self {
            profiles: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MttProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Add or replace a profile. Fails if the profile is invalid.
    pub fn register(&mut self, profile: MttProfile) -> Result<(), CoreError> {
        profile.validate()?;
        self.profiles.retain(|p| p.name != profile.name);
        self.profiles.push(profile);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn builtin_profiles() -> Vec<MttProfile> {
    vec![
        MttProfile {
            name: "08-16".into(),
            front_offset_m: 6.8,
            working_speed_kmh: 0.45,
            lift_capacity_mm: 60.0,
            alignment_capacity_mm: 40.0,
            tamping_units: 16,
            measurement_chord_m: 10.0,
            correction_factors: CorrectionFactors::default(),
            bc_distance_m: Some(4.7),
            cd_distance_m: Some(9.3),
        },
        MttProfile {
            name: "08-32U".into(),
            front_offset_m: 8.2,
            working_speed_kmh: 0.75,
            lift_capacity_mm: 80.0,
            alignment_capacity_mm: 50.0,
            tamping_units: 32,
            measurement_chord_m: 10.0,
            correction_factors: CorrectionFactors::default(),
            bc_distance_m: Some(5.2),
            cd_distance_m: Some(10.5),
        },
        MttProfile {
            name: "09-16".into(),
            front_offset_m: 7.4,
            working_speed_kmh: 0.60,
            lift_capacity_mm: 70.0,
            alignment_capacity_mm: 45.0,
            tamping_units: 16,
            measurement_chord_m: 10.0,
            correction_factors: CorrectionFactors::default(),
            bc_distance_m: Some(4.9),
            cd_distance_m: Some(9.8),
        },
        MttProfile {
            name: "09-3X".into(),
            front_offset_m: 9.1,
            working_speed_kmh: 1.10,
            lift_capacity_mm: 100.0,
            alignment_capacity_mm: 60.0,
            tamping_units: 48,
            measurement_chord_m: 10.0,
            correction_factors: CorrectionFactors::default(),
            bc_distance_m: Some(5.6),
            cd_distance_m: Some(11.2),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_validate() {
        let registry = MttRegistry::with_builtin();
        assert!(!registry.is_empty());
        for name in registry.names() {
            registry
                .get(name)
                .expect("registered name resolves")
                .validate()
                .expect("builtin profile should validate");
        }
    }

    #[test]
    fn invalid_capacity_is_rejected() {
        let mut profile = MttRegistry::with_builtin().get("08-16").unwrap().clone();
        profile.lift_capacity_mm = 0.0;
        let err = profile.validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidProfile { .. }));
    }

    #[test]
    fn register_replaces_by_name() {
        let mut registry = MttRegistry::with_builtin();
        let before = registry.len();
        let mut profile = registry.get("08-16").unwrap().clone();
        profile.lift_capacity_mm = 65.0;
        registry.register(profile).unwrap();
        assert_eq!(registry.len(), before);
        assert_eq!(registry.get("08-16").unwrap().lift_capacity_mm, 65.0);
    }
}
