//! Tunables for the simulation, solver, contacts and sleeping.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};

/// Settings for the constraint solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverSettings {
    /// Gauss-Seidel passes per sub-step.
    pub iterations: usize,
    /// Fraction of positional error corrected per sub-step (ERP).
    pub error_reduction: f32,
    /// Upper bound on the velocity used to correct positional error.
    pub max_error_correction_velocity: f32,
    /// Softness applied to joint rows that do not specify their own.
    pub default_softness: f32,
    /// Penetration tolerated before contacts push bodies apart.
    pub allowed_penetration: f32,
    /// Approach speed below which restitution is ignored.
    pub restitution_threshold: f32,
    /// Squared impulse below which a row counts as resting.
    pub resting_impulse_threshold_squared: f32,
    /// Reapply last step's impulses before iterating.
    pub warm_starting: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            iterations: 10,
            error_reduction: 0.2,
            max_error_correction_velocity: 5.0,
            default_softness: 0.0,
            allowed_penetration: 0.01,
            restitution_threshold: 1.0,
            resting_impulse_threshold_squared: 1e-8,
            warm_starting: true,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(PhysicsError::InvalidSettings("solver iterations must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.error_reduction) {
            return Err(PhysicsError::InvalidSettings("error reduction must be in [0, 1]"));
        }
        if !(self.max_error_correction_velocity >= 0.0) {
            return Err(PhysicsError::InvalidSettings(
                "max error correction velocity must be non-negative",
            ));
        }
        if !(self.default_softness >= 0.0) || !self.default_softness.is_finite() {
            return Err(PhysicsError::InvalidSettings("default softness must be finite and non-negative"));
        }
        if !(self.allowed_penetration >= 0.0) || !self.allowed_penetration.is_finite() {
            return Err(PhysicsError::InvalidSettings("allowed penetration must be finite and non-negative"));
        }
        if !(self.restitution_threshold >= 0.0) {
            return Err(PhysicsError::InvalidSettings("restitution threshold must be non-negative"));
        }
        if !(self.resting_impulse_threshold_squared >= 0.0) {
            return Err(PhysicsError::InvalidSettings("resting threshold must be non-negative"));
        }
        Ok(())
    }
}

/// Settings for contact generation and persistence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContactSettings {
    /// Contacts separated by up to this distance are still reported.
    pub contact_margin: f32,
    /// Maximum anchor drift for a new contact to inherit a prior impulse.
    pub contact_match_tolerance: f32,
    /// Fattening applied to broad-phase bounds.
    pub broad_phase_margin: f32,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            contact_margin: 0.02,
            contact_match_tolerance: 0.05,
            broad_phase_margin: 0.1,
        }
    }
}

impl ContactSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.contact_margin >= 0.0) || !self.contact_margin.is_finite() {
            return Err(PhysicsError::InvalidSettings("contact margin must be finite and non-negative"));
        }
        if !(self.contact_match_tolerance > 0.0) || !self.contact_match_tolerance.is_finite() {
            return Err(PhysicsError::InvalidSettings("contact match tolerance must be positive"));
        }
        if !(self.broad_phase_margin >= 0.0) || !self.broad_phase_margin.is_finite() {
            return Err(PhysicsError::InvalidSettings("broad phase margin must be finite and non-negative"));
        }
        Ok(())
    }
}

/// Settings for putting resting bodies to sleep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SleepSettings {
    pub enabled: bool,
    /// Linear speed below which a body may fall asleep.
    pub linear_threshold: f32,
    /// Angular speed below which a body may fall asleep.
    pub angular_threshold: f32,
    /// Seconds a body must stay below both thresholds.
    pub time_to_sleep: f32,
}

impl Default for SleepSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            linear_threshold: 0.05,
            angular_threshold: 0.05,
            time_to_sleep: 0.5,
        }
    }
}

impl SleepSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.linear_threshold >= 0.0) || !(self.angular_threshold >= 0.0) {
            return Err(PhysicsError::InvalidSettings("sleep thresholds must be non-negative"));
        }
        if !(self.time_to_sleep >= 0.0) || !self.time_to_sleep.is_finite() {
            return Err(PhysicsError::InvalidSettings("time to sleep must be finite and non-negative"));
        }
        Ok(())
    }
}

/// Top-level simulation settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationSettings {
    /// Length of one sub-step in seconds.
    pub fixed_time_step: f32,
    /// Sub-steps run per `update` at most; excess time is dropped.
    pub max_steps_per_update: usize,
    /// Run one more collision update after the last sub-step so contacts
    /// match the final poses.
    pub synchronize_collision_domain: bool,
    pub max_linear_velocity: f32,
    pub max_angular_velocity: f32,
    pub solver: SolverSettings,
    pub contacts: ContactSettings,
    pub sleeping: SleepSettings,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            fixed_time_step: 1.0 / 60.0,
            max_steps_per_update: 2,
            synchronize_collision_domain: false,
            max_linear_velocity: 100.0,
            max_angular_velocity: 50.0,
            solver: SolverSettings::default(),
            contacts: ContactSettings::default(),
            sleeping: SleepSettings::default(),
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_time_step > 0.0) || !self.fixed_time_step.is_finite() {
            return Err(PhysicsError::InvalidSettings("fixed time step must be positive"));
        }
        if self.max_steps_per_update == 0 {
            return Err(PhysicsError::InvalidSettings("max steps per update must be at least 1"));
        }
        if !(self.max_linear_velocity > 0.0) || !(self.max_angular_velocity > 0.0) {
            return Err(PhysicsError::InvalidSettings("velocity limits must be positive"));
        }
        self.solver.validate()?;
        self.contacts.validate()?;
        self.sleeping.validate()
    }
}
