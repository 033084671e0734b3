//! Non-penetration and friction rows for contact points.

use crate::collision::Contact;
use crate::dynamics::RigidBody;
use crate::math::utils::tangent_basis;
use crate::settings::SolverSettings;

use super::row::{separation_bias, ConstraintRow, Jacobian};

/// Rows per contact: the normal row followed by two friction rows.
pub const ROWS_PER_CONTACT: usize = 3;

/// Friction and restitution of a body pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaterial {
    pub friction: f32,
    pub restitution: f32,
}

impl ContactMaterial {
    /// Geometric mean of the frictions, larger of the restitutions.
    pub fn combine(a: &RigidBody, b: &RigidBody) -> Self {
        Self {
            friction: (a.friction.max(0.0) * b.friction.max(0.0)).sqrt(),
            restitution: a.restitution.max(b.restitution).clamp(0.0, 1.0),
        }
    }
}

/// Appends the rows for one contact to `out`.
///
/// The contact normal points from B toward A, so a positive normal impulse
/// pushes A along the normal. Friction rows reference the normal row by its
/// index in `out`.
pub fn contact_rows(
    contact: &Contact,
    a: &RigidBody,
    b: &RigidBody,
    material: ContactMaterial,
    dt: f32,
    settings: &SolverSettings,
    out: &mut Vec<ConstraintRow>,
) {
    let normal = contact.normal;
    let r_a = contact.position - a.position();
    let r_b = contact.position - b.position();

    let jacobian = Jacobian::point(normal, r_a, r_b);
    let mut bias = separation_bias(settings.allowed_penetration - contact.depth, dt, settings);

    // Bounce only for impacts faster than the threshold
    let approach = jacobian.velocity(a.linear_velocity, a.angular_velocity, b.linear_velocity, b.angular_velocity);
    if approach < -settings.restitution_threshold {
        bias = bias.max(-material.restitution * approach);
    }

    let normal_row = out.len();
    out.push(ConstraintRow::inequality(jacobian, bias).with_impulse(contact.normal_impulse));

    let (t1, t2) = tangent_basis(normal);
    for (tangent, impulse) in [t1, t2].into_iter().zip(contact.tangent_impulse) {
        let row = ConstraintRow::equality(Jacobian::point(tangent, r_a, r_b), 0.0)
            .with_friction(normal_row, material.friction)
            .with_impulse(impulse);
        out.push(row);
    }
}

/// Copies solved impulses from `rows` (as laid out by [`contact_rows`])
/// back into the contact.
pub fn store_contact_impulses(contact: &mut Contact, rows: &[ConstraintRow]) {
    if let [normal, t1, t2] = rows {
        contact.normal_impulse = normal.impulse;
        contact.tangent_impulse = [t1.impulse, t2.impulse];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::ContactId;
    use crate::geometry::Shape;
    use crate::math::Vec3;
    use approx::assert_relative_eq;

    fn ball_at(position: Vec3) -> RigidBody {
        RigidBody::dynamic(Shape::sphere(0.5).unwrap(), 1.0)
            .unwrap()
            .with_position(position)
    }

    #[test]
    fn test_material_combination() {
        let a = ball_at(Vec3::ZERO).with_friction(0.4).with_restitution(0.1);
        let b = ball_at(Vec3::ZERO).with_friction(0.9).with_restitution(0.7);
        let material = ContactMaterial::combine(&a, &b);
        assert_relative_eq!(material.friction, 0.6, epsilon = 1e-6);
        assert_relative_eq!(material.restitution, 0.7);
    }

    #[test]
    fn test_contact_rows_layout() {
        let a = ball_at(Vec3::new(0.0, 0.45, 0.0));
        let b = RigidBody::fixed(Shape::cuboid(Vec3::new(5.0, 0.5, 5.0)).unwrap()).with_position(Vec3::new(0.0, -0.5, 0.0));
        let mut contact = Contact::new(Vec3::new(0.0, -0.025, 0.0), Vec3::Y, 0.05, ContactId::default());
        contact.normal_impulse = 0.3;
        contact.tangent_impulse = [0.1, f32::NAN];

        let settings = SolverSettings::default();
        let mut rows = vec![ConstraintRow::equality(Jacobian::default(), 0.0)];
        contact_rows(&contact, &a, &b, ContactMaterial::combine(&a, &b), 0.1, &settings, &mut rows);

        assert_eq!(rows.len(), 1 + ROWS_PER_CONTACT);
        let normal = rows[1];
        assert_eq!(normal.min_impulse, 0.0);
        assert_relative_eq!(normal.impulse, 0.3);
        // Penetration beyond the slop pushes A up
        assert_relative_eq!(normal.bias, 0.2 * 0.04 / 0.1, epsilon = 1e-5);
        assert_eq!(rows[2].friction.map(|f| f.normal_row), Some(1));
        assert_eq!(rows[3].impulse, 0.0);
    }

    #[test]
    fn test_restitution_above_threshold() {
        let a = ball_at(Vec3::new(0.0, 0.5, 0.0))
            .with_restitution(0.5)
            .with_linear_velocity(Vec3::new(0.0, -4.0, 0.0));
        let b = RigidBody::fixed(Shape::plane(Vec3::Y, 0.0).unwrap());
        let contact = Contact::new(Vec3::ZERO, Vec3::Y, 0.0, ContactId::default());

        let settings = SolverSettings::default();
        let mut rows = Vec::new();
        contact_rows(&contact, &a, &b, ContactMaterial::combine(&a, &b), 0.1, &settings, &mut rows);
        assert_relative_eq!(rows[0].bias, 2.0, epsilon = 1e-5);

        let slow = a.clone().with_linear_velocity(Vec3::new(0.0, -0.5, 0.0));
        rows.clear();
        contact_rows(&contact, &slow, &b, ContactMaterial::combine(&slow, &b), 0.1, &settings, &mut rows);
        assert!(rows[0].bias < 1.0);
    }

    #[test]
    fn test_store_impulses() {
        let mut contact = Contact::new(Vec3::ZERO, Vec3::Y, 0.0, ContactId::default());
        let rows = [
            ConstraintRow::inequality(Jacobian::default(), 0.0).with_impulse(1.5),
            ConstraintRow::equality(Jacobian::default(), 0.0).with_impulse(-0.2),
            ConstraintRow::equality(Jacobian::default(), 0.0).with_impulse(0.4),
        ];
        store_contact_impulses(&mut contact, &rows);
        assert_eq!(contact.normal_impulse, 1.5);
        assert_eq!(contact.tangent_impulse, [-0.2, 0.4]);
    }
}
