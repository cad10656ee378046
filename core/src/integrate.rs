use glam::Vec2;

use crate::body::Body;

/// Component-sum linear speed below which a body is snapped to rest.
const LINEAR_REST_THRESHOLD: f32 = 0.01;
/// Angular speed below which rotation is snapped to rest.
const ANGULAR_REST_THRESHOLD: f32 = 0.001;
/// Per-step angular velocity damping.
const ANGULAR_DAMPING: f32 = 0.999;

/// Advance velocities from gravity and the accumulated force/torque.
/// Accumulators are cleared whether or not the body moves.
pub fn integrate_velocity(body: &mut Body, gravity: Vec2, dt: f32) {
    if body.locked || body.sleeping {
        body.force = Vec2::ZERO;
        body.torque = 0.0;
        return;
    }
    body.linear += (gravity + body.force * body.inv_mass) * dt;
    body.angular += body.torque * body.effective_inv_inertia() * dt;
    body.force = Vec2::ZERO;
    body.torque = 0.0;
}

/// Advance poses from velocities, snap near-rest velocities to zero and
/// apply angular damping.
pub fn integrate_pose(body: &mut Body, dt: f32) {
    if body.locked || body.sleeping {
        return;
    }
    body.center += body.linear * dt;
    body.angle += body.angular * dt;
    if body.linear.x.abs() + body.linear.y.abs() < LINEAR_REST_THRESHOLD {
        body.linear = Vec2::ZERO;
    }
    if body.angular.abs() < ANGULAR_REST_THRESHOLD {
        body.angular = 0.0;
    }
    body.angular *= ANGULAR_DAMPING;
}
