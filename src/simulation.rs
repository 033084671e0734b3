//! The simulation: bodies, constraints, force effects and the fixed-step
//! stepper that ties them to the collision domain and the solver.

use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, trace};

use crate::arena::Arena;
use crate::collision::{CollisionDomain, CollisionObject, ContactSet, ObjectPair};
use crate::constraints::{contact_rows, store_contact_impulses, Constraint, ConstraintHandle, ContactMaterial};
use crate::dynamics::{
    clamp_velocities, integrate_forces, integrate_pose, BodyHandle, ForceEffect, ForceEffectHandle, RigidBody,
};
use crate::error::{PhysicsError, Result};
use crate::geometry::ShapeType;
use crate::math::Vec3;
use crate::settings::SimulationSettings;
use crate::solver::{SequentialImpulseSolver, SolverBody};

/// Where the stepper currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepPhase {
    #[default]
    Idle,
    CollisionUpdate,
    ConstraintSetup,
    WarmStart,
    SolverIterate,
    Integrate,
}

/// Summary of the last [`Simulation::update`] or [`Simulation::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepStats {
    pub sub_steps: usize,
    pub contact_sets: usize,
    /// Rows handed to the solver in the last sub-step
    pub constraint_rows: usize,
    /// The solver's last pass changed no impulse noticeably
    pub resting: bool,
}

#[derive(Debug)]
struct ForceEffectEntry {
    effect: Box<dyn ForceEffect>,
    enabled: bool,
}

#[derive(Debug, Clone, Copy)]
enum RowSource {
    Contact { pair: ObjectPair, index: usize },
    Constraint(ConstraintHandle),
}

#[derive(Debug, Clone)]
struct RowBatch {
    source: RowSource,
    rows: Range<usize>,
}

/// A rigid-body simulation.
///
/// ```
/// use rigidsim::prelude::*;
///
/// let mut sim = Simulation::default();
/// sim.add_force_effect(Box::new(Gravity::default()));
///
/// let floor = RigidBody::fixed(Shape::plane(Vec3::Y, 0.0)?);
/// sim.add_body(floor)?;
/// let ball = sim.add_body(
///     RigidBody::dynamic(Shape::sphere(0.5)?, 1.0)?.with_position(Vec3::new(0.0, 2.0, 0.0)),
/// )?;
///
/// for _ in 0..120 {
///     sim.update(1.0 / 60.0)?;
/// }
/// let y = sim.body(ball).map(|b| b.position().y).unwrap_or_default();
/// assert!(y > 0.4 && y < 0.6);
/// # Ok::<(), PhysicsError>(())
/// ```
#[derive(Debug)]
pub struct Simulation {
    settings: SimulationSettings,
    bodies: Arena<BodyHandle, RigidBody>,
    constraints: Arena<ConstraintHandle, Constraint>,
    force_effects: Arena<ForceEffectHandle, ForceEffectEntry>,
    domain: CollisionDomain,
    solver: SequentialImpulseSolver,
    solver_indices: HashMap<BodyHandle, usize>,
    batches: Vec<RowBatch>,
    accumulator: f32,
    phase: StepPhase,
    stats: StepStats,
    step_count: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::with_valid_settings(SimulationSettings::default())
    }
}

impl Simulation {
    pub fn new(settings: SimulationSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::with_valid_settings(settings))
    }

    fn with_valid_settings(settings: SimulationSettings) -> Self {
        Self {
            domain: CollisionDomain::new(settings.contacts.clone()),
            settings,
            bodies: Arena::new(),
            constraints: Arena::new(),
            force_effects: Arena::new(),
            solver: SequentialImpulseSolver::new(),
            solver_indices: HashMap::new(),
            batches: Vec::new(),
            accumulator: 0.0,
            phase: StepPhase::Idle,
            stats: StepStats::default(),
            step_count: 0,
        }
    }

    #[inline]
    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SimulationSettings) -> Result<()> {
        settings.validate()?;
        self.domain.set_settings(settings.contacts.clone());
        self.settings = settings;
        Ok(())
    }

    // Bodies

    /// Registers a body and its collision object.
    pub fn add_body(&mut self, body: RigidBody) -> Result<BodyHandle> {
        if body.is_dynamic() && !body.shape().has_finite_mass() {
            return Err(PhysicsError::InvalidMass("dynamic bodies need a shape with finite mass"));
        }
        let domain = &mut self.domain;
        let handle = self.bodies.insert_with(|handle| {
            let object = CollisionObject::new(body.shape().clone(), body.pose())
                .with_group(body.group)
                .with_static(body.is_static())
                .with_owner(handle);
            let mut body = body;
            body.set_collision_object(Some(domain.add_object(object)));
            body
        });
        trace!(?handle, "body added");
        Ok(handle)
    }

    /// Removes a body, its collision object, its contact sets and every
    /// constraint attached to it.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let mut body = self.bodies.remove(handle)?;
        if let Some(object) = body.collision_object() {
            self.domain.remove_object(object);
        }
        body.set_collision_object(None);
        let removed = self.constraints.retain(|_, c| !c.involves(handle));
        debug!(?handle, constraints = removed.len(), "body removed");
        Some(body)
    }

    #[inline]
    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    /// Edits to public fields take effect on the next step.
    #[inline]
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> + '_ {
        self.bodies.iter()
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    // Constraints

    /// Adds a constraint after checking its bodies and parameters. Sleeping
    /// bodies it links are woken.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintHandle> {
        constraint.validate()?;
        for body in [constraint.body_a, constraint.body_b] {
            if !self.bodies.contains(body) {
                return Err(PhysicsError::UnknownBody(body));
            }
        }
        for body in [constraint.body_a, constraint.body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.wake_up();
            }
        }
        let handle = self.constraints.insert(constraint);
        trace!(?handle, "constraint added");
        Ok(handle)
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Result<Constraint> {
        self.constraints
            .remove(handle)
            .ok_or(PhysicsError::UnknownConstraint(handle))
    }

    #[inline]
    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(handle)
    }

    /// Changes are validated by the next step's setup.
    #[inline]
    pub fn constraint_mut(&mut self, handle: ConstraintHandle) -> Option<&mut Constraint> {
        self.constraints.get_mut(handle)
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintHandle, &Constraint)> + '_ {
        self.constraints.iter()
    }

    // Force effects

    pub fn add_force_effect(&mut self, effect: Box<dyn ForceEffect>) -> ForceEffectHandle {
        self.force_effects.insert(ForceEffectEntry { effect, enabled: true })
    }

    pub fn remove_force_effect(&mut self, handle: ForceEffectHandle) -> Option<Box<dyn ForceEffect>> {
        self.force_effects.remove(handle).map(|entry| entry.effect)
    }

    /// Returns false for an unknown handle.
    pub fn set_force_effect_enabled(&mut self, handle: ForceEffectHandle, enabled: bool) -> bool {
        match self.force_effects.get_mut(handle) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn force_effect_count(&self) -> usize {
        self.force_effects.len()
    }

    // Collision

    #[inline]
    pub fn collision_domain(&self) -> &CollisionDomain {
        &self.domain
    }

    /// Free objects added here collide and are reported, but only objects
    /// owned by bodies take part in the solver.
    #[inline]
    pub fn collision_domain_mut(&mut self) -> &mut CollisionDomain {
        &mut self.domain
    }

    /// Contact sets of the body's collision object.
    pub fn contacts_of_body(&self, handle: BodyHandle) -> impl Iterator<Item = &ContactSet> + '_ {
        let object = self.bodies.get(handle).and_then(RigidBody::collision_object);
        self.domain
            .contact_sets()
            .filter(move |set| object.is_some_and(|o| set.involves(o)))
    }

    // Stepping

    #[inline]
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    #[inline]
    pub fn last_step_stats(&self) -> StepStats {
        self.stats
    }

    /// Sub-steps executed since creation.
    #[inline]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Advances by `dt` seconds of real time in fixed sub-steps.
    ///
    /// At most `max_steps_per_update` sub-steps run; time beyond that is
    /// dropped. A non-finite or non-positive `dt` does nothing.
    pub fn update(&mut self, dt: f32) -> Result<()> {
        if !(dt > 0.0) || !dt.is_finite() {
            debug!(dt, "update skipped: invalid time delta");
            return Ok(());
        }

        let h = self.settings.fixed_time_step;
        let max_steps = self.settings.max_steps_per_update;
        self.accumulator += dt;
        let available = (self.accumulator / h + 1e-4).floor() as usize;
        let steps = available.min(max_steps);
        if available > max_steps {
            debug!(available, max_steps, "sub-step cap reached, dropping excess time");
            self.accumulator = 0.0;
        } else {
            self.accumulator = (self.accumulator - steps as f32 * h).max(0.0);
        }

        for _ in 0..steps {
            if let Err(err) = self.sub_step(h) {
                self.phase = StepPhase::Idle;
                return Err(err);
            }
        }
        if steps > 0 && self.settings.synchronize_collision_domain {
            self.phase = StepPhase::CollisionUpdate;
            self.collision_update();
        }
        self.phase = StepPhase::Idle;
        self.record_stats(steps);

        debug!(
            dt,
            sub_steps = steps,
            contact_sets = self.stats.contact_sets,
            rows = self.stats.constraint_rows,
            "simulation updated"
        );
        Ok(())
    }

    /// Runs exactly one sub-step, ignoring the time accumulator.
    pub fn step(&mut self) -> Result<()> {
        let result = self.sub_step(self.settings.fixed_time_step);
        self.phase = StepPhase::Idle;
        result?;
        self.record_stats(1);
        Ok(())
    }

    fn record_stats(&mut self, sub_steps: usize) {
        self.stats = StepStats {
            sub_steps,
            contact_sets: self.domain.contact_set_count(),
            constraint_rows: self.solver.rows().len(),
            resting: self
                .solver
                .is_resting(self.settings.solver.resting_impulse_threshold_squared),
        };
    }

    fn sub_step(&mut self, h: f32) -> Result<()> {
        self.phase = StepPhase::CollisionUpdate;
        self.collision_update();
        self.apply_forces(h);

        self.phase = StepPhase::ConstraintSetup;
        self.setup_constraints(h)?;

        self.phase = StepPhase::WarmStart;
        self.solver.warm_start();

        self.phase = StepPhase::SolverIterate;
        self.solver.solve(&self.settings.solver);

        self.phase = StepPhase::Integrate;
        self.integrate(h);
        self.store_impulses();

        let finished = self.force_effects.retain(|_, entry| !entry.effect.is_finished());
        if !finished.is_empty() {
            trace!(count = finished.len(), "finished force effects removed");
        }
        self.step_count += 1;
        Ok(())
    }

    /// Copies body state into the domain, updates contacts and wakes
    /// sleeping bodies that are being disturbed.
    fn collision_update(&mut self) {
        for (_, body) in self.bodies.iter() {
            let Some(handle) = body.collision_object() else {
                continue;
            };
            if let Some(object) = self.domain.object_mut(handle) {
                object.group = body.group;
                object.is_static = body.is_static();
            }
            if let Err(err) = self.domain.set_object_pose(handle, body.pose()) {
                trace!(%err, "body pose not synced");
            }
        }
        self.domain.update();
        self.wake_disturbed_bodies();
    }

    fn wake_disturbed_bodies(&mut self) {
        let sleep = &self.settings.sleeping;
        let moving = |body: &RigidBody| {
            !body.is_static() && !body.is_sleeping() && !body.is_slow(sleep.linear_threshold, sleep.angular_threshold)
        };

        let mut wake = Vec::new();
        let mut check = |ha: BodyHandle, a: &RigidBody, hb: BodyHandle, b: &RigidBody| {
            if a.is_sleeping() && moving(b) {
                wake.push(ha);
            }
            if b.is_sleeping() && moving(a) {
                wake.push(hb);
            }
        };
        for (pair, _) in self.domain.contact_pairs() {
            if let Some((ha, hb)) = pair_owners(&self.domain, pair) {
                if let (Some(a), Some(b)) = (self.bodies.get(ha), self.bodies.get(hb)) {
                    check(ha, a, hb, b);
                }
            }
        }
        for (_, c) in self.constraints.iter().filter(|(_, c)| c.enabled) {
            if let (Some(a), Some(b)) = (self.bodies.get(c.body_a), self.bodies.get(c.body_b)) {
                check(c.body_a, a, c.body_b, b);
            }
        }

        for handle in wake {
            if let Some(body) = self.bodies.get_mut(handle) {
                if body.is_sleeping() {
                    body.wake_up();
                    trace!(?handle, "body woken");
                }
            }
        }
    }

    fn apply_forces(&mut self, h: f32) {
        for (_, entry) in self.force_effects.iter_mut() {
            if !entry.enabled {
                continue;
            }
            let affects_sleeping = entry.effect.affects_sleeping();
            for (handle, body) in self.bodies.iter_mut() {
                if !body.is_dynamic() || (body.is_sleeping() && !affects_sleeping) {
                    continue;
                }
                entry.effect.apply(handle, body, h);
            }
            entry.effect.end_step();
        }
        for (_, body) in self.bodies.iter_mut() {
            integrate_forces(body, h);
        }
    }

    /// Builds solver bodies and rows for contacts and constraints.
    fn setup_constraints(&mut self, h: f32) -> Result<()> {
        self.solver.clear();
        self.solver_indices.clear();
        self.batches.clear();

        for (handle, body) in self.bodies.iter() {
            let solver_body = if body.is_dynamic() && !body.is_sleeping() {
                SolverBody::new(
                    body.linear_velocity,
                    body.angular_velocity,
                    body.inverse_mass(),
                    body.inverse_inertia_world(),
                )
            } else if body.is_kinematic() {
                SolverBody::fixed(body.linear_velocity, body.angular_velocity)
            } else {
                SolverBody::fixed(Vec3::ZERO, Vec3::ZERO)
            };
            self.solver_indices.insert(handle, self.solver.add_body(solver_body));
        }

        let settings = &self.settings.solver;
        let mut scratch = Vec::new();

        for (pair, set) in self.domain.contact_pairs() {
            let Some((ha, hb)) = pair_owners(&self.domain, pair) else {
                continue;
            };
            let (Some(a), Some(b)) = (self.bodies.get(ha), self.bodies.get(hb)) else {
                continue;
            };
            if !is_movable(a) && !is_movable(b) {
                continue;
            }
            let (Some(&ia), Some(&ib)) = (self.solver_indices.get(&ha), self.solver_indices.get(&hb)) else {
                continue;
            };
            let material = ContactMaterial::combine(a, b);
            for (index, contact) in set.contacts().iter().enumerate() {
                scratch.clear();
                contact_rows(contact, a, b, material, h, settings, &mut scratch);
                let rows = self.solver.add_rows(ia, ib, &scratch);
                self.batches.push(RowBatch {
                    source: RowSource::Contact { pair, index },
                    rows,
                });
            }
        }

        for (handle, constraint) in self.constraints.iter() {
            if !constraint.enabled {
                continue;
            }
            let a = self
                .bodies
                .get(constraint.body_a)
                .ok_or(PhysicsError::UnknownBody(constraint.body_a))?;
            let b = self
                .bodies
                .get(constraint.body_b)
                .ok_or(PhysicsError::UnknownBody(constraint.body_b))?;
            scratch.clear();
            constraint.build_rows(a, b, h, settings, &mut scratch)?;
            if !is_movable(a) && !is_movable(b) {
                continue;
            }
            let (Some(&ia), Some(&ib)) = (
                self.solver_indices.get(&constraint.body_a),
                self.solver_indices.get(&constraint.body_b),
            ) else {
                continue;
            };
            let rows = self.solver.add_rows(ia, ib, &scratch);
            self.batches.push(RowBatch {
                source: RowSource::Constraint(handle),
                rows,
            });
        }

        self.solver.prepare(settings);
        trace!(rows = self.solver.rows().len(), batches = self.batches.len(), "constraints set up");
        Ok(())
    }

    /// Writes solved velocities back, integrates poses and updates sleep.
    fn integrate(&mut self, h: f32) {
        let resting = self
            .solver
            .is_resting(self.settings.solver.resting_impulse_threshold_squared);
        let sleep = &self.settings.sleeping;

        for (handle, body) in self.bodies.iter_mut() {
            if !body.is_dynamic() || body.is_sleeping() {
                continue;
            }
            if let Some(solved) = self.solver_indices.get(&handle).and_then(|&i| self.solver.body(i)) {
                body.linear_velocity = solved.linear_velocity;
                body.angular_velocity = solved.angular_velocity;
            }
            clamp_velocities(body, self.settings.max_linear_velocity, self.settings.max_angular_velocity);
            integrate_pose(body, h);

            if sleep.enabled {
                let slow = body.is_slow(sleep.linear_threshold, sleep.angular_threshold);
                if body.update_sleep(h, slow && resting, sleep.time_to_sleep) {
                    trace!(?handle, "body fell asleep");
                }
            }
        }
    }

    fn store_impulses(&mut self) {
        let rows = self.solver.rows();
        for batch in &self.batches {
            let solved = &rows[batch.rows.clone()];
            match batch.source {
                RowSource::Contact { pair, index } => {
                    let contact = self
                        .domain
                        .contact_set_mut(pair)
                        .and_then(|set| set.contacts_mut().get_mut(index));
                    if let Some(contact) = contact {
                        store_contact_impulses(contact, solved);
                    }
                }
                RowSource::Constraint(handle) => {
                    if let Some(constraint) = self.constraints.get_mut(handle) {
                        constraint.store_impulses(solved);
                    }
                }
            }
        }
    }
}

/// Bodies owning both objects of a pair, if the pair can produce solver
/// contacts.
fn pair_owners(domain: &CollisionDomain, pair: ObjectPair) -> Option<(BodyHandle, BodyHandle)> {
    let a = domain.object(pair.a)?;
    let b = domain.object(pair.b)?;
    if a.shape.shape_type() == ShapeType::Ray || b.shape.shape_type() == ShapeType::Ray {
        return None;
    }
    let (ha, hb) = (a.owner?, b.owner?);
    (ha != hb).then_some((ha, hb))
}

/// True if the solver may change the body's velocity.
#[inline]
fn is_movable(body: &RigidBody) -> bool {
    body.is_dynamic() && !body.is_sleeping()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{BallJoint, HingeJoint};
    use crate::dynamics::{Explosion, Gravity};
    use crate::geometry::Shape;
    use crate::math::Pose;
    use approx::assert_relative_eq;

    fn ball_at(position: Vec3) -> RigidBody {
        RigidBody::dynamic(Shape::sphere(0.5).unwrap(), 1.0)
            .unwrap()
            .with_position(position)
    }

    fn ground() -> RigidBody {
        RigidBody::fixed(Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)).unwrap()).with_position(Vec3::new(0.0, -0.5, 0.0))
    }

    #[test]
    fn test_simulation_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Simulation>();
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = SimulationSettings::default();
        settings.max_steps_per_update = 0;
        assert!(matches!(Simulation::new(settings), Err(PhysicsError::InvalidSettings(_))));

        let mut sim = Simulation::default();
        let mut settings = SimulationSettings::default();
        settings.solver.iterations = 0;
        assert!(sim.set_settings(settings).is_err());
        assert_eq!(sim.settings().solver.iterations, 10);
    }

    #[test]
    fn test_update_accumulates_and_caps() {
        let mut sim = Simulation::default();
        let h = sim.settings().fixed_time_step;

        sim.update(h * 0.5).unwrap();
        assert_eq!(sim.last_step_stats().sub_steps, 0);
        sim.update(h * 0.5).unwrap();
        assert_eq!(sim.last_step_stats().sub_steps, 1);

        sim.update(h * 10.0).unwrap();
        assert_eq!(sim.last_step_stats().sub_steps, 2);
        assert_eq!(sim.step_count(), 3);
        assert_eq!(sim.phase(), StepPhase::Idle);

        // Excess was dropped: a small update does not catch up
        sim.update(h * 0.5).unwrap();
        assert_eq!(sim.last_step_stats().sub_steps, 0);

        sim.update(f32::NAN).unwrap();
        sim.update(-1.0).unwrap();
        assert_eq!(sim.step_count(), 3);
    }

    #[test]
    fn test_body_registration_creates_object() {
        let mut sim = Simulation::default();
        let handle = sim.add_body(ball_at(Vec3::new(1.0, 2.0, 3.0))).unwrap();
        let object = sim.body(handle).unwrap().collision_object().unwrap();
        let object = sim.collision_domain().object(object).unwrap();
        assert_eq!(object.owner, Some(handle));
        assert_eq!(object.pose.position, Vec3::new(1.0, 2.0, 3.0));

        let mut plane_body = RigidBody::fixed(Shape::plane(Vec3::Y, 0.0).unwrap());
        plane_body.set_motion_type(crate::dynamics::MotionType::Kinematic).unwrap();
        assert!(sim.add_body(plane_body).is_ok());
    }

    #[test]
    fn test_remove_body_cascades() {
        let mut sim = Simulation::default();
        let a = sim.add_body(ball_at(Vec3::ZERO)).unwrap();
        let b = sim.add_body(ball_at(Vec3::new(0.9, 0.0, 0.0))).unwrap();
        let joint = sim
            .add_constraint(Constraint::new(a, b, BallJoint::new(Vec3::ZERO, Vec3::ZERO)))
            .unwrap();
        sim.step().unwrap();
        assert_eq!(sim.collision_domain().contact_set_count(), 1);

        let removed = sim.remove_body(a).unwrap();
        assert!(removed.collision_object().is_none());
        assert!(sim.constraint(joint).is_none());
        assert_eq!(sim.collision_domain().contact_set_count(), 0);
        assert_eq!(sim.collision_domain().object_count(), 1);
        assert!(sim.body(a).is_none());
        assert!(sim.remove_body(a).is_none());
        assert_eq!(sim.remove_constraint(joint), Err(PhysicsError::UnknownConstraint(joint)));
    }

    #[test]
    fn test_constraint_configuration_errors() {
        let mut sim = Simulation::default();
        let a = sim.add_body(ball_at(Vec3::ZERO)).unwrap();
        let b = sim.add_body(ball_at(Vec3::X * 3.0)).unwrap();

        let same = Constraint::new(a, a, BallJoint::new(Vec3::ZERO, Vec3::ZERO));
        assert_eq!(sim.add_constraint(same).unwrap_err(), PhysicsError::SameBody(a));

        sim.remove_body(b);
        let dangling = Constraint::new(a, b, BallJoint::new(Vec3::ZERO, Vec3::ZERO));
        assert_eq!(sim.add_constraint(dangling).unwrap_err(), PhysicsError::UnknownBody(b));
    }

    #[test]
    fn test_invalid_constraint_fails_update_without_moving_bodies() {
        let mut sim = Simulation::default();
        let a = sim.add_body(ball_at(Vec3::ZERO).with_linear_velocity(Vec3::X)).unwrap();
        let b = sim.add_body(ball_at(Vec3::new(3.0, 0.0, 0.0))).unwrap();
        let hinge = HingeJoint::at_world(&Pose::IDENTITY, &Pose::from_position(Vec3::X * 3.0), Vec3::X, Vec3::Y).unwrap();
        let handle = sim.add_constraint(Constraint::new(a, b, hinge)).unwrap();

        if let Some(c) = sim.constraint_mut(handle) {
            if let crate::constraints::ConstraintKind::HingeJoint(h) = &mut c.kind {
                h.limit = Some((1.0, -1.0));
            }
        }
        let err = sim.update(sim.settings().fixed_time_step).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidLimits { .. }));
        assert_eq!(sim.phase(), StepPhase::Idle);
        assert_eq!(sim.body(a).unwrap().position(), Vec3::ZERO);
        assert_eq!(sim.step_count(), 0);
    }

    #[test]
    fn test_ball_rests_on_ground() {
        let mut sim = Simulation::default();
        sim.add_force_effect(Box::new(Gravity::default()));
        sim.add_body(ground()).unwrap();
        let ball = sim.add_body(ball_at(Vec3::new(0.0, 1.0, 0.0))).unwrap();

        for _ in 0..180 {
            sim.step().unwrap();
        }
        let body = sim.body(ball).unwrap();
        assert_relative_eq!(body.position().y, 0.5, epsilon = 0.02);
        assert!(body.linear_velocity.length() < 0.05);
        assert_eq!(sim.contacts_of_body(ball).count(), 1);
    }

    #[test]
    fn test_sleeping_and_waking() {
        let mut settings = SimulationSettings::default();
        settings.sleeping.enabled = true;
        let mut sim = Simulation::new(settings).unwrap();
        sim.add_force_effect(Box::new(Gravity::default()));
        sim.add_body(ground()).unwrap();
        let ball = sim.add_body(ball_at(Vec3::new(0.0, 0.5, 0.0))).unwrap();

        for _ in 0..240 {
            sim.step().unwrap();
        }
        assert!(sim.body(ball).unwrap().is_sleeping());
        let resting_y = sim.body(ball).unwrap().position().y;
        sim.step().unwrap();
        assert_eq!(sim.body(ball).unwrap().position().y, resting_y);

        sim.add_force_effect(Box::new(Explosion::new(Vec3::new(0.0, -1.0, 0.0), 5.0, 10.0)));
        sim.step().unwrap();
        let body = sim.body(ball).unwrap();
        assert!(!body.is_sleeping());
        assert!(body.position().y > resting_y);
        assert_eq!(sim.force_effect_count(), 1);
    }

    #[test]
    fn test_sleeping_disabled_by_default() {
        let mut sim = Simulation::default();
        sim.add_force_effect(Box::new(Gravity::default()));
        sim.add_body(ground()).unwrap();
        let ball = sim.add_body(ball_at(Vec3::new(0.0, 0.5, 0.0))).unwrap();
        for _ in 0..240 {
            sim.step().unwrap();
        }
        assert!(!sim.body(ball).unwrap().is_sleeping());
    }

    #[test]
    fn test_disabled_force_effect() {
        let mut sim = Simulation::default();
        let gravity = sim.add_force_effect(Box::new(Gravity::default()));
        let ball = sim.add_body(ball_at(Vec3::ZERO)).unwrap();
        assert!(sim.set_force_effect_enabled(gravity, false));
        sim.step().unwrap();
        assert_eq!(sim.body(ball).unwrap().linear_velocity, Vec3::ZERO);

        assert!(sim.remove_force_effect(gravity).is_some());
        assert!(!sim.set_force_effect_enabled(gravity, true));
    }

    #[test]
    fn test_synchronized_contacts_follow_final_poses() {
        let mut settings = SimulationSettings::default();
        settings.synchronize_collision_domain = true;
        let mut sim = Simulation::new(settings).unwrap();
        sim.add_body(ground()).unwrap();
        // Starts clear of the ground and moves into it within one step
        let ball = sim
            .add_body(ball_at(Vec3::new(0.0, 0.6, 0.0)).with_linear_velocity(Vec3::new(0.0, -6.0, 0.0)))
            .unwrap();
        sim.update(sim.settings().fixed_time_step).unwrap();
        assert!(sim.body(ball).unwrap().position().y < 0.6);
        assert_eq!(sim.contacts_of_body(ball).count(), 1);
    }
}
