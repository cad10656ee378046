use crate::body::Body;
use crate::math::LENGTH_EPSILON;
use crate::narrowphase::Manifold;

/// Penetration below this is left uncorrected to reduce jitter.
pub const PENETRATION_SLOP: f32 = 0.01;
/// Fraction of the remaining penetration corrected per step.
pub const BAUMGARTE: f32 = 0.2;
/// Scale of the optional angular positional correction.
const ANGULAR_CORRECTION: f32 = 0.05;

/// Apply the normal and friction impulses for one manifold. Returns true
/// when an impulse was applied, so the world can wake the pair.
pub fn apply_impulses(a: &mut Body, b: &mut Body, m: &Manifold) -> bool {
    let inv_mass_a = a.effective_inv_mass();
    let inv_mass_b = b.effective_inv_mass();
    let inv_inertia_a = a.effective_inv_inertia();
    let inv_inertia_b = b.effective_inv_inertia();
    if inv_mass_a + inv_mass_b == 0.0 {
        return false;
    }

    let normal = m.normal;
    let ra = m.contact_point - a.center;
    let rb = m.contact_point - b.center;

    let relative = b.velocity_at(m.contact_point) - a.velocity_at(m.contact_point);
    let vn = relative.dot(normal);
    if vn >= 0.0 {
        // Separating or resting along the normal.
        return false;
    }

    let ra_cross_n = ra.perp_dot(normal);
    let rb_cross_n = rb.perp_dot(normal);
    let k = inv_mass_a
        + inv_mass_b
        + ra_cross_n * ra_cross_n * inv_inertia_a
        + rb_cross_n * rb_cross_n * inv_inertia_b;
    if k < LENGTH_EPSILON {
        return false;
    }

    let restitution = a.restitution.min(b.restitution);
    let j = -(1.0 + restitution) * vn / k;
    let impulse = normal * j;
    a.linear -= impulse * inv_mass_a;
    a.angular -= ra_cross_n * j * inv_inertia_a;
    b.linear += impulse * inv_mass_b;
    b.angular += rb_cross_n * j * inv_inertia_b;

    // Friction along the tangent of the pre-impulse relative velocity,
    // clamped to the Coulomb cone. The tangent direction is fixed before
    // any impulse is applied.
    let tangent = relative - normal * vn;
    let tangent_len = tangent.length();
    if tangent_len > LENGTH_EPSILON {
        let tangent = tangent / tangent_len;
        let ra_cross_t = ra.perp_dot(tangent);
        let rb_cross_t = rb.perp_dot(tangent);
        let kt = inv_mass_a
            + inv_mass_b
            + ra_cross_t * ra_cross_t * inv_inertia_a
            + rb_cross_t * rb_cross_t * inv_inertia_b;
        if kt > LENGTH_EPSILON {
            let mu = (a.friction * b.friction).sqrt();
            let max_friction = mu * j.abs();
            let jt = (-relative.dot(tangent) / kt).clamp(-max_friction, max_friction);
            let friction_impulse = tangent * jt;
            a.linear -= friction_impulse * inv_mass_a;
            a.angular -= ra_cross_t * jt * inv_inertia_a;
            b.linear += friction_impulse * inv_mass_b;
            b.angular += rb_cross_t * jt * inv_inertia_b;
        }
    }

    true
}

/// Baumgarte positional correction for one manifold. Locked bodies stay
/// put; the optional angular pass nudges rotations for tall, thin contacts.
pub fn correct_positions(a: &mut Body, b: &mut Body, m: &Manifold, angular: bool) {
    let inv_mass_a = a.effective_inv_mass();
    let inv_mass_b = b.effective_inv_mass();
    let inv_sum = inv_mass_a + inv_mass_b;
    if inv_sum == 0.0 {
        return;
    }

    let depth = (m.penetration - PENETRATION_SLOP).max(0.0);
    if depth == 0.0 {
        return;
    }

    let correction = m.normal * (depth * BAUMGARTE / inv_sum);
    a.center -= correction * inv_mass_a;
    b.center += correction * inv_mass_b;

    if angular {
        let ra = m.contact_point - a.center;
        let rb = m.contact_point - b.center;
        a.angle -= ra.perp_dot(m.normal) * depth * ANGULAR_CORRECTION * a.effective_inv_inertia();
        b.angle += rb.perp_dot(m.normal) * depth * ANGULAR_CORRECTION * b.effective_inv_inertia();
    }
}
