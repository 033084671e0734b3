//! One-dimensional constraint rows, the only thing the solver understands.

use crate::math::Vec3;
use crate::settings::SolverSettings;

/// Velocity Jacobian of a row for the two bodies.
///
/// The row's velocity is `Jv = linear_a·vA + angular_a·ωA + linear_b·vB + angular_b·ωB`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Jacobian {
    pub linear_a: Vec3,
    pub angular_a: Vec3,
    pub linear_b: Vec3,
    pub angular_b: Vec3,
}

impl Jacobian {
    /// Relative velocity of two attached points along `direction`, where
    /// `r_a` and `r_b` run from each center of mass to its point.
    #[inline]
    pub fn point(direction: Vec3, r_a: Vec3, r_b: Vec3) -> Self {
        Self {
            linear_a: direction,
            angular_a: r_a.cross(direction),
            linear_b: -direction,
            angular_b: -r_b.cross(direction),
        }
    }

    /// Relative angular velocity `ωA - ωB` about `axis`.
    #[inline]
    pub fn angular(axis: Vec3) -> Self {
        Self {
            linear_a: Vec3::ZERO,
            angular_a: axis,
            linear_b: Vec3::ZERO,
            angular_b: -axis,
        }
    }

    /// Relative linear velocity `vA - vB` of the centers along `axis`.
    #[inline]
    pub fn linear(axis: Vec3) -> Self {
        Self {
            linear_a: axis,
            angular_a: Vec3::ZERO,
            linear_b: -axis,
            angular_b: Vec3::ZERO,
        }
    }

    #[inline]
    pub fn negated(self) -> Self {
        Self {
            linear_a: -self.linear_a,
            angular_a: -self.angular_a,
            linear_b: -self.linear_b,
            angular_b: -self.angular_b,
        }
    }

    #[inline]
    pub fn velocity(&self, linear_a: Vec3, angular_a: Vec3, linear_b: Vec3, angular_b: Vec3) -> f32 {
        self.linear_a.dot(linear_a) + self.angular_a.dot(angular_a) + self.linear_b.dot(linear_b) + self.angular_b.dot(angular_b)
    }
}

/// Friction coupling: the row's bounds follow `±coefficient * λn` of the
/// normal row at `normal_row`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionBound {
    /// Index of the normal row; relative to its batch until the solver
    /// rebases it.
    pub normal_row: usize,
    pub coefficient: f32,
}

/// A 1-D sub-constraint.
///
/// Each solver pass moves the accumulated impulse toward
/// `λ += m_eff · (bias - Jv - softness·λ)`, clamped to `[min_impulse, max_impulse]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintRow {
    pub jacobian: Jacobian,
    /// Target velocity of the row
    pub bias: f32,
    /// Constraint force mixing; zero is rigid
    pub softness: f32,
    pub min_impulse: f32,
    pub max_impulse: f32,
    pub friction: Option<FrictionBound>,
    /// Accumulated impulse; the warm-start value before solving
    pub impulse: f32,
}

impl ConstraintRow {
    /// A rigid, unbounded row.
    pub fn equality(jacobian: Jacobian, bias: f32) -> Self {
        Self {
            jacobian,
            bias,
            softness: 0.0,
            min_impulse: f32::NEG_INFINITY,
            max_impulse: f32::INFINITY,
            friction: None,
            impulse: 0.0,
        }
    }

    /// A row that can only push, `λ >= 0`.
    pub fn inequality(jacobian: Jacobian, bias: f32) -> Self {
        Self {
            min_impulse: 0.0,
            ..Self::equality(jacobian, bias)
        }
    }

    /// Motor row driving `Jv` toward `target` with impulse up to `max_impulse`.
    ///
    /// A NaN target disables the row.
    pub fn motor(jacobian: Jacobian, target: f32, max_impulse: f32) -> Self {
        if target.is_nan() {
            return Self::disabled(jacobian);
        }
        let max = max_impulse.max(0.0);
        Self {
            min_impulse: -max,
            max_impulse: max,
            ..Self::equality(jacobian, target)
        }
    }

    /// Row with zero bounds; it never applies an impulse.
    pub fn disabled(jacobian: Jacobian) -> Self {
        Self {
            min_impulse: 0.0,
            max_impulse: 0.0,
            ..Self::equality(jacobian, 0.0)
        }
    }

    pub fn with_softness(mut self, softness: f32) -> Self {
        self.softness = softness.max(0.0);
        self
    }

    pub fn with_friction(mut self, normal_row: usize, coefficient: f32) -> Self {
        self.friction = Some(FrictionBound {
            normal_row,
            coefficient,
        });
        self.min_impulse = 0.0;
        self.max_impulse = 0.0;
        self
    }

    pub fn with_impulse(mut self, impulse: f32) -> Self {
        self.impulse = if impulse.is_finite() { impulse } else { 0.0 };
        self
    }

    #[inline]
    pub fn clamp(&self, impulse: f32) -> f32 {
        impulse.clamp(self.min_impulse, self.max_impulse)
    }
}

/// Bias driving a bilateral position error `c` back to zero.
#[inline]
pub fn correction_bias(c: f32, dt: f32, settings: &SolverSettings) -> f32 {
    let max = settings.max_error_correction_velocity;
    (-settings.error_reduction * c / dt).clamp(-max, max)
}

/// Bias for a one-sided row keeping `c >= 0`.
///
/// A violated row pushes back at the error-reduction rate; an open gap may
/// close within one step.
#[inline]
pub fn separation_bias(c: f32, dt: f32, settings: &SolverSettings) -> f32 {
    if c < 0.0 {
        (-settings.error_reduction * c / dt).min(settings.max_error_correction_velocity)
    } else {
        -c / dt
    }
}
