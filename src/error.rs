//! Error types for simulation setup and construction.

use thiserror::Error;

use crate::collision::ObjectHandle;
use crate::constraints::ConstraintHandle;
use crate::dynamics::BodyHandle;

/// Errors reported by the physics core.
///
/// Configuration errors surface from `add_*` calls or from the constraint
/// setup of a step. Construction errors surface when a shape, body or
/// settings value is built with invalid parameters. Numerical degeneracies
/// during a step are never errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// A constraint names the same body on both sides.
    #[error("constraint connects body {0:?} to itself")]
    SameBody(BodyHandle),

    /// A joint or limit axis has (near) zero length.
    #[error("degenerate axis in {0}")]
    DegenerateAxis(&'static str),

    /// Lower limit exceeds upper limit.
    #[error("invalid limits: min {min} > max {max}")]
    InvalidLimits { min: f32, max: f32 },

    /// A handle that does not refer to a live body.
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),

    /// A handle that does not refer to a live constraint.
    #[error("unknown constraint {0:?}")]
    UnknownConstraint(ConstraintHandle),

    /// A handle that does not refer to a live collision object.
    #[error("unknown collision object {0:?}")]
    UnknownObject(ObjectHandle),

    /// Shape parameters are non-finite, non-positive or empty.
    #[error("invalid shape: {0}")]
    InvalidShape(&'static str),

    /// Mass properties cannot be computed or are not positive.
    #[error("invalid mass: {0}")]
    InvalidMass(&'static str),

    /// A settings value is out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(&'static str),
}

/// Result type for the physics core.
pub type Result<T, E = PhysicsError> = std::result::Result<T, E>;
