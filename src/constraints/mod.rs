//! Constraints between pairs of bodies.
//!
//! Every constraint, contacts included, is reduced to [`ConstraintRow`]s
//! before solving. A [`Constraint`] pairs two bodies with a
//! [`ConstraintKind`] and keeps its row impulses between steps for warm
//! starting.

mod contact;
mod joints;
mod limits;
mod motors;
mod row;

use crate::arena::arena_handle;
use crate::dynamics::{BodyHandle, RigidBody};
use crate::error::{PhysicsError, Result};
use crate::settings::SolverSettings;

pub use contact::{contact_rows, store_contact_impulses, ContactMaterial, ROWS_PER_CONTACT};
pub use joints::{BallJoint, FixedJoint, HingeJoint, HingeMotor};
pub use limits::{AngularLimit, DistanceLimit, LinearLimit};
pub use motors::{AngularVelocityMotor, EulerAngleMotor, LinearVelocityMotor};
pub use row::{correction_bias, separation_bias, ConstraintRow, FrictionBound, Jacobian};

arena_handle!(
    /// Generational handle to a [`Constraint`] in a simulation.
    ConstraintHandle
);

/// The behavior of a constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintKind {
    BallJoint(BallJoint),
    HingeJoint(HingeJoint),
    FixedJoint(FixedJoint),
    DistanceLimit(DistanceLimit),
    LinearLimit(LinearLimit),
    AngularLimit(AngularLimit),
    LinearVelocityMotor(LinearVelocityMotor),
    AngularVelocityMotor(AngularVelocityMotor),
    EulerAngleMotor(EulerAngleMotor),
}

macro_rules! impl_from_kind {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for ConstraintKind {
                fn from(value: $variant) -> Self {
                    ConstraintKind::$variant(value)
                }
            }
        )*
    };
}

impl_from_kind!(
    BallJoint,
    HingeJoint,
    FixedJoint,
    DistanceLimit,
    LinearLimit,
    AngularLimit,
    LinearVelocityMotor,
    AngularVelocityMotor,
    EulerAngleMotor,
);

impl ConstraintKind {
    /// Checks axes, limits and gains.
    pub fn validate(&self) -> Result<()> {
        match self {
            ConstraintKind::BallJoint(_) | ConstraintKind::FixedJoint(_) => Ok(()),
            ConstraintKind::HingeJoint(j) => j.validate(),
            ConstraintKind::DistanceLimit(l) => l.validate(),
            ConstraintKind::LinearLimit(l) => l.validate(),
            ConstraintKind::AngularLimit(l) => l.validate(),
            ConstraintKind::LinearVelocityMotor(m) => m.validate(),
            ConstraintKind::AngularVelocityMotor(m) => m.validate(),
            ConstraintKind::EulerAngleMotor(m) => m.validate(),
        }
    }

    /// Appends this constraint's rows for the current poses to `out`.
    pub fn rows(&self, a: &RigidBody, b: &RigidBody, dt: f32, settings: &SolverSettings, out: &mut Vec<ConstraintRow>) -> Result<()> {
        match self {
            ConstraintKind::BallJoint(j) => j.rows(a, b, dt, settings, out),
            ConstraintKind::HingeJoint(j) => j.rows(a, b, dt, settings, out)?,
            ConstraintKind::FixedJoint(j) => j.rows(a, b, dt, settings, out),
            ConstraintKind::DistanceLimit(l) => l.rows(a, b, dt, settings, out),
            ConstraintKind::LinearLimit(l) => l.rows(a, b, dt, settings, out)?,
            ConstraintKind::AngularLimit(l) => l.rows(a, b, dt, settings, out)?,
            ConstraintKind::LinearVelocityMotor(m) => m.rows(a, b, dt, out)?,
            ConstraintKind::AngularVelocityMotor(m) => m.rows(a, b, dt, out)?,
            ConstraintKind::EulerAngleMotor(m) => m.rows(a, b, dt, out),
        }
        Ok(())
    }
}

/// A constraint between two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Disabled constraints are skipped by the solver
    pub enabled: bool,
    pub kind: ConstraintKind,
    impulses: Vec<f32>,
}

impl Constraint {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, kind: impl Into<ConstraintKind>) -> Self {
        Self {
            body_a,
            body_b,
            enabled: true,
            kind: kind.into(),
            impulses: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.body_a == self.body_b {
            return Err(PhysicsError::SameBody(self.body_a));
        }
        self.kind.validate()
    }

    #[inline]
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.body_a == body || self.body_b == body
    }

    /// Accumulated row impulses from the last solved step.
    pub fn impulses(&self) -> &[f32] {
        &self.impulses
    }

    /// Builds the rows, seeded with last step's impulses when the row
    /// layout is unchanged.
    pub(crate) fn build_rows(
        &self,
        a: &RigidBody,
        b: &RigidBody,
        dt: f32,
        settings: &SolverSettings,
        out: &mut Vec<ConstraintRow>,
    ) -> Result<()> {
        self.validate()?;
        let start = out.len();
        self.kind.rows(a, b, dt, settings, out)?;
        let built = &mut out[start..];
        if built.len() == self.impulses.len() {
            for (row, impulse) in built.iter_mut().zip(&self.impulses) {
                *row = row.with_impulse(row.clamp(*impulse));
            }
        }
        Ok(())
    }

    pub(crate) fn store_impulses(&mut self, rows: &[ConstraintRow]) {
        self.impulses.clear();
        self.impulses.extend(rows.iter().map(|row| row.impulse));
    }
}
