//! Sequential impulse solver.
//!
//! Projected Gauss-Seidel over [`ConstraintRow`]s: each row in turn moves
//! its accumulated impulse toward the value that satisfies it, clamped to
//! its bounds, and applies the change to a private copy of the two bodies'
//! velocities. Rows are visited in insertion order, so results are
//! reproducible for the same input.

use std::ops::Range;

use crate::constraints::ConstraintRow;
use crate::math::{Mat3, Vec3};
use crate::settings::SolverSettings;

/// Velocity and inverse mass of a body as seen by the solver.
///
/// Static, kinematic and sleeping bodies have zero inverse mass and keep
/// their velocities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBody {
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub inverse_mass: f32,
    /// World-space inverse inertia
    pub inverse_inertia: Mat3,
}

impl SolverBody {
    pub fn new(linear_velocity: Vec3, angular_velocity: Vec3, inverse_mass: f32, inverse_inertia: Mat3) -> Self {
        Self {
            linear_velocity,
            angular_velocity,
            inverse_mass,
            inverse_inertia,
        }
    }

    /// An immovable body moving with the given velocities.
    pub fn fixed(linear_velocity: Vec3, angular_velocity: Vec3) -> Self {
        Self::new(linear_velocity, angular_velocity, 0.0, Mat3::ZERO)
    }

    #[inline]
    fn response(&self, linear: Vec3, angular: Vec3) -> f32 {
        self.inverse_mass * linear.length_squared() + angular.dot(self.inverse_inertia * angular)
    }

    #[inline]
    fn apply(&mut self, linear: Vec3, angular: Vec3, impulse: f32) {
        self.linear_velocity += linear * (self.inverse_mass * impulse);
        self.angular_velocity += self.inverse_inertia * angular * impulse;
    }
}

#[derive(Debug, Clone, Copy)]
struct RowLink {
    body_a: usize,
    body_b: usize,
    effective_mass: f32,
}

/// Gauss-Seidel solver over constraint rows.
#[derive(Debug, Default)]
pub struct SequentialImpulseSolver {
    bodies: Vec<SolverBody>,
    rows: Vec<ConstraintRow>,
    links: Vec<RowLink>,
    max_impulse_squared: f32,
}

impl SequentialImpulseSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all bodies and rows, keeping allocations.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.rows.clear();
        self.links.clear();
        self.max_impulse_squared = 0.0;
    }

    pub fn add_body(&mut self, body: SolverBody) -> usize {
        self.bodies.push(body);
        self.bodies.len() - 1
    }

    /// Adds a batch of rows acting between bodies `a` and `b`, returning
    /// their range in [`Self::rows`]. Friction links inside the batch are
    /// rebased to solver indices.
    pub fn add_rows(&mut self, a: usize, b: usize, rows: &[ConstraintRow]) -> Range<usize> {
        let base = self.rows.len();
        if a == b || a >= self.bodies.len() || b >= self.bodies.len() {
            tracing::trace!(a, b, "rows skipped: invalid body pair");
            return base..base;
        }
        for row in rows {
            let mut row = *row;
            if let Some(friction) = row.friction.as_mut() {
                friction.normal_row += base;
            }
            self.rows.push(row);
            self.links.push(RowLink {
                body_a: a,
                body_b: b,
                effective_mass: 0.0,
            });
        }
        base..self.rows.len()
    }

    /// Computes effective masses; clears impulses when warm starting is off.
    pub fn prepare(&mut self, settings: &SolverSettings) {
        for (row, link) in self.rows.iter_mut().zip(&mut self.links) {
            let a = &self.bodies[link.body_a];
            let b = &self.bodies[link.body_b];
            let j = &row.jacobian;
            let k = a.response(j.linear_a, j.angular_a) + b.response(j.linear_b, j.angular_b) + row.softness;
            link.effective_mass = if k > 0.0 && k.is_finite() { 1.0 / k } else { 0.0 };
            if !settings.warm_starting {
                row.impulse = 0.0;
            }
        }
        self.max_impulse_squared = 0.0;
    }

    /// Applies the rows' initial impulses to the bodies.
    pub fn warm_start(&mut self) {
        for i in 0..self.rows.len() {
            let (min, max) = self.bounds(i);
            let row = &mut self.rows[i];
            row.impulse = row.impulse.clamp(min, max);
            let row = *row;
            if row.impulse != 0.0 {
                let link = self.links[i];
                self.apply(link, &row, row.impulse);
            }
        }
    }

    /// Runs the configured number of passes over all rows.
    pub fn solve(&mut self, settings: &SolverSettings) {
        for _ in 0..settings.iterations {
            self.max_impulse_squared = self.iterate();
        }
    }

    /// One pass over all rows; returns the largest squared impulse change.
    pub fn iterate(&mut self) -> f32 {
        let mut max_delta_sq = 0.0f32;
        for i in 0..self.rows.len() {
            let link = self.links[i];
            if link.effective_mass == 0.0 {
                continue;
            }
            let (min, max) = self.bounds(i);
            let row = self.rows[i];
            let a = &self.bodies[link.body_a];
            let b = &self.bodies[link.body_b];
            let jv = row.jacobian.velocity(a.linear_velocity, a.angular_velocity, b.linear_velocity, b.angular_velocity);

            let delta = link.effective_mass * (row.bias - jv - row.softness * row.impulse);
            let accumulated = (row.impulse + delta).clamp(min, max);
            let delta = accumulated - row.impulse;
            if !delta.is_finite() {
                continue;
            }
            self.rows[i].impulse = accumulated;
            self.apply(link, &row, delta);
            max_delta_sq = max_delta_sq.max(delta * delta);
        }
        max_delta_sq
    }

    fn bounds(&self, i: usize) -> (f32, f32) {
        let row = &self.rows[i];
        match row.friction {
            Some(friction) => {
                let normal = self.rows.get(friction.normal_row).map_or(0.0, |r| r.impulse);
                let limit = (friction.coefficient * normal).max(0.0);
                (-limit, limit)
            }
            None => (row.min_impulse, row.max_impulse),
        }
    }

    fn apply(&mut self, link: RowLink, row: &ConstraintRow, impulse: f32) {
        let j = &row.jacobian;
        self.bodies[link.body_a].apply(j.linear_a, j.angular_a, impulse);
        self.bodies[link.body_b].apply(j.linear_b, j.angular_b, impulse);
    }

    /// Largest squared impulse change in the last pass.
    pub fn max_impulse_squared(&self) -> f32 {
        self.max_impulse_squared
    }

    /// True when the last pass changed no impulse by more than the
    /// threshold.
    pub fn is_resting(&self, threshold_squared: f32) -> bool {
        self.max_impulse_squared <= threshold_squared
    }

    pub fn rows(&self) -> &[ConstraintRow] {
        &self.rows
    }

    pub fn body(&self, index: usize) -> Option<&SolverBody> {
        self.bodies.get(index)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Jacobian;
    use approx::assert_relative_eq;

    fn unit_body(velocity: Vec3) -> SolverBody {
        SolverBody::new(velocity, Vec3::ZERO, 1.0, Mat3::IDENTITY)
    }

    #[test]
    fn test_contact_stops_approach() {
        let mut solver = SequentialImpulseSolver::new();
        let a = solver.add_body(unit_body(Vec3::new(0.0, -2.0, 0.0)));
        let b = solver.add_body(SolverBody::fixed(Vec3::ZERO, Vec3::ZERO));
        let row = ConstraintRow::inequality(Jacobian::linear(Vec3::Y), 0.0);
        let range = solver.add_rows(a, b, &[row]);

        let settings = SolverSettings::default();
        solver.prepare(&settings);
        solver.warm_start();
        solver.solve(&settings);

        assert_relative_eq!(solver.body(a).unwrap().linear_velocity.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(solver.rows()[range.start].impulse, 2.0, epsilon = 1e-5);
        assert_eq!(solver.body(b).unwrap().linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_inequality_never_pulls() {
        let mut solver = SequentialImpulseSolver::new();
        let a = solver.add_body(unit_body(Vec3::new(0.0, 3.0, 0.0)));
        let b = solver.add_body(SolverBody::fixed(Vec3::ZERO, Vec3::ZERO));
        solver.add_rows(a, b, &[ConstraintRow::inequality(Jacobian::linear(Vec3::Y), 0.0)]);

        let settings = SolverSettings::default();
        solver.prepare(&settings);
        solver.solve(&settings);
        assert_relative_eq!(solver.body(a).unwrap().linear_velocity.y, 3.0);
        assert!(solver.is_resting(settings.resting_impulse_threshold_squared));
    }

    #[test]
    fn test_friction_bounded_by_normal_impulse() {
        let mut solver = SequentialImpulseSolver::new();
        // Sliding along X while pressed into the ground
        let a = solver.add_body(unit_body(Vec3::new(5.0, -1.0, 0.0)));
        let b = solver.add_body(SolverBody::fixed(Vec3::ZERO, Vec3::ZERO));
        let rows = [
            ConstraintRow::inequality(Jacobian::linear(Vec3::Y), 0.0),
            ConstraintRow::equality(Jacobian::linear(Vec3::X), 0.0).with_friction(0, 0.5),
        ];
        // Offset the batch to check rebasing
        solver.add_rows(a, b, &[ConstraintRow::disabled(Jacobian::linear(Vec3::Z))]);
        let range = solver.add_rows(a, b, &rows);
        assert_eq!(solver.rows()[range.start + 1].friction.map(|f| f.normal_row), Some(range.start));

        let settings = SolverSettings::default();
        solver.prepare(&settings);
        solver.solve(&settings);

        let body = solver.body(a).unwrap();
        assert_relative_eq!(body.linear_velocity.y, 0.0, epsilon = 1e-5);
        // λn = 1, so friction removes at most 0.5 of the sliding speed
        assert_relative_eq!(body.linear_velocity.x, 4.5, epsilon = 1e-4);
    }

    #[test]
    fn test_warm_start_applies_previous_impulse() {
        let mut solver = SequentialImpulseSolver::new();
        let a = solver.add_body(unit_body(Vec3::ZERO));
        let b = solver.add_body(SolverBody::fixed(Vec3::ZERO, Vec3::ZERO));
        let row = ConstraintRow::inequality(Jacobian::linear(Vec3::Y), 0.0).with_impulse(0.5);
        solver.add_rows(a, b, &[row]);

        let mut settings = SolverSettings::default();
        solver.prepare(&settings);
        solver.warm_start();
        assert_relative_eq!(solver.body(a).unwrap().linear_velocity.y, 0.5);

        solver.clear();
        let a = solver.add_body(unit_body(Vec3::ZERO));
        let b = solver.add_body(SolverBody::fixed(Vec3::ZERO, Vec3::ZERO));
        solver.add_rows(a, b, &[row]);
        settings.warm_starting = false;
        solver.prepare(&settings);
        solver.warm_start();
        assert_eq!(solver.body(a).unwrap().linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_soft_row_and_invalid_pair() {
        let mut solver = SequentialImpulseSolver::new();
        let a = solver.add_body(unit_body(Vec3::X));
        let b = solver.add_body(SolverBody::fixed(Vec3::ZERO, Vec3::ZERO));
        assert!(solver.add_rows(a, a, &[ConstraintRow::equality(Jacobian::linear(Vec3::X), 0.0)]).is_empty());

        // Softness 1 with unit mass: half the velocity is removed in one pass
        let row = ConstraintRow::equality(Jacobian::linear(Vec3::X), 0.0).with_softness(1.0);
        solver.add_rows(a, b, &[row]);
        let settings = SolverSettings::default();
        solver.prepare(&settings);
        solver.iterate();
        assert_relative_eq!(solver.body(a).unwrap().linear_velocity.x, 0.5, epsilon = 1e-5);
    }
}
