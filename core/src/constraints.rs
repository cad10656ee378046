use glam::Vec2;
use slotmap::new_key_type;

use crate::body::{Body, BodyHandle};
use crate::math::{self, LENGTH_EPSILON};

new_key_type! {
    /// Stable handle to a constraint owned by the world.
    pub struct ConstraintHandle;
}

const WELD_POSITION_BIAS: f32 = 0.23;
const WELD_ANGLE_BIAS: f32 = 0.20;
const WELD_MAX_BIAS_VELOCITY: f32 = 400.0;
const WELD_BREAK_DISTANCE_SQ: f32 = 30.0;
const WELD_BREAK_ANGLE: f32 = 0.5;

const AXIS_POSITION_BIAS: f32 = 0.05;
const AXIS_MAX_BIAS_VELOCITY: f32 = 300.0;
const AXIS_SLOP: f32 = 0.03;

const SPRING_BREAK_DISTANCE: f32 = 80.0;

/// Optional rotational spring between the two bodies' relative angle and
/// its value at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AngularSpring {
    pub frequency: f32,
    pub damping_ratio: f32,
}

/// Parameters of a damped spring constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpringParams {
    pub rest_length: f32,
    /// Lower clamp on the target length; 0 disables.
    pub min_length: f32,
    /// Upper clamp on the target length; 0 disables.
    pub max_length: f32,
    /// Oscillation frequency in Hz, must be positive.
    pub frequency: f32,
    /// Damping ratio in [0, 1].
    pub damping_ratio: f32,
    pub angular: Option<AngularSpring>,
}

/// Type-specific behavior of a constraint.
#[derive(Debug, Clone, Copy)]
pub enum ConstraintKind {
    /// Anchors held coincident and the initial relative angle preserved.
    Weld { initial_angle: f32 },
    /// Anchors held coincident, rotation free (revolute).
    Axis,
    /// Damped spring toward a rest length, optionally with an angular
    /// spring over the initial relative angle.
    Spring {
        params: SpringParams,
        /// Fallback direction when the anchors collapse onto each other.
        initial_axis: Vec2,
        initial_angle: f32,
    },
}

/// A two-body constraint solved by sequential impulses with soft biasing.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub a: BodyHandle,
    pub b: BodyHandle,
    /// Anchor in `a`'s local frame.
    pub anchor_a: Vec2,
    /// Anchor in `b`'s local frame.
    pub anchor_b: Vec2,
    pub kind: ConstraintKind,
    pub can_break: bool,
    pub broken: bool,
}

impl Constraint {
    pub fn links(&self, handle: BodyHandle) -> bool {
        self.a == handle || self.b == handle
    }

    pub fn other(&self, handle: BodyHandle) -> Option<BodyHandle> {
        if self.a == handle {
            Some(self.b)
        } else if self.b == handle {
            Some(self.a)
        } else {
            None
        }
    }

    /// Solve one iteration at velocity level. Springs apply their soft
    /// impulse only on the first iteration of the step; rigid kinds solve
    /// every iteration. Returns true when the constraint broke this call.
    pub(crate) fn solve(
        &mut self,
        a: &mut Body,
        b: &mut Body,
        dt: f32,
        iteration: usize,
    ) -> bool {
        if self.broken || dt <= 0.0 {
            return false;
        }
        let world_a = a.center + math::rotate(self.anchor_a, a.angle);
        let world_b = b.center + math::rotate(self.anchor_b, b.angle);
        match self.kind {
            ConstraintKind::Weld { initial_angle } => {
                self.solve_weld(a, b, world_a, world_b, initial_angle, dt)
            }
            ConstraintKind::Axis => {
                self.solve_axis(a, b, world_a, world_b, dt);
                false
            }
            ConstraintKind::Spring {
                params,
                initial_axis,
                initial_angle,
            } => self.solve_spring(a, b, world_a, world_b, params, initial_axis, initial_angle, dt, iteration),
        }
    }

    fn solve_weld(
        &mut self,
        a: &mut Body,
        b: &mut Body,
        world_a: Vec2,
        world_b: Vec2,
        initial_angle: f32,
        dt: f32,
    ) -> bool {
        let position_error = world_b - world_a;
        let angle_error = math::wrap_angle(b.angle - a.angle - initial_angle);

        if self.can_break
            && (position_error.length_squared() > WELD_BREAK_DISTANCE_SQ
                || angle_error.abs() > WELD_BREAK_ANGLE)
        {
            self.broken = true;
            return true;
        }

        solve_translation_axis(
            a, b, world_a, world_b, Vec2::X, position_error.x,
            WELD_POSITION_BIAS, WELD_MAX_BIAS_VELOCITY, dt,
        );
        solve_translation_axis(
            a, b, world_a, world_b, Vec2::Y, position_error.y,
            WELD_POSITION_BIAS, WELD_MAX_BIAS_VELOCITY, dt,
        );

        let inv_inertia_a = a.effective_inv_inertia();
        let inv_inertia_b = b.effective_inv_inertia();
        let k_angular = inv_inertia_a + inv_inertia_b;
        if k_angular > LENGTH_EPSILON {
            let bias = (WELD_ANGLE_BIAS * angle_error / dt)
                .clamp(-WELD_MAX_BIAS_VELOCITY, WELD_MAX_BIAS_VELOCITY);
            let relative_spin = b.angular - a.angular;
            let lambda = -(relative_spin + bias) / k_angular;
            a.angular -= lambda * inv_inertia_a;
            b.angular += lambda * inv_inertia_b;
        }
        false
    }

    fn solve_axis(&mut self, a: &mut Body, b: &mut Body, world_a: Vec2, world_b: Vec2, dt: f32) {
        let position_error = world_b - world_a;
        // Below the slop the translation is not corrected, only damped.
        let corrected = if position_error.length() < AXIS_SLOP {
            Vec2::ZERO
        } else {
            position_error
        };
        solve_translation_axis(
            a, b, world_a, world_b, Vec2::X, corrected.x,
            AXIS_POSITION_BIAS, AXIS_MAX_BIAS_VELOCITY, dt,
        );
        solve_translation_axis(
            a, b, world_a, world_b, Vec2::Y, corrected.y,
            AXIS_POSITION_BIAS, AXIS_MAX_BIAS_VELOCITY, dt,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_spring(
        &mut self,
        a: &mut Body,
        b: &mut Body,
        world_a: Vec2,
        world_b: Vec2,
        params: SpringParams,
        initial_axis: Vec2,
        initial_angle: f32,
        dt: f32,
        iteration: usize,
    ) -> bool {
        // The spring-damper impulse already accounts for the whole step;
        // applying it on every solver iteration would overdrive it.
        if iteration != 0 {
            return false;
        }

        let delta = world_b - world_a;
        let length = delta.length();
        let axis = if length > LENGTH_EPSILON {
            delta / length
        } else {
            initial_axis
        };

        let mut target = params.rest_length;
        if params.min_length > 0.0 {
            target = target.max(params.min_length);
        }
        if params.max_length > 0.0 {
            target = target.min(params.max_length);
        }
        let position_error = length - target;

        if self.can_break && position_error.abs() > SPRING_BREAK_DISTANCE {
            self.broken = true;
            return true;
        }

        let inv_mass_a = a.effective_inv_mass();
        let inv_mass_b = b.effective_inv_mass();
        let inv_inertia_a = a.effective_inv_inertia();
        let inv_inertia_b = b.effective_inv_inertia();

        let ra = world_a - a.center;
        let rb = world_b - b.center;
        let ra_cross = ra.perp_dot(axis);
        let rb_cross = rb.perp_dot(axis);
        let k = inv_mass_a
            + inv_mass_b
            + ra_cross * ra_cross * inv_inertia_a
            + rb_cross * rb_cross * inv_inertia_b;
        if k > LENGTH_EPSILON {
            let (gamma, beta) = soft_coefficients(1.0 / k, params.frequency, params.damping_ratio, dt);
            let velocity = (b.velocity_at(world_b) - a.velocity_at(world_a)).dot(axis);
            let lambda = -(velocity + beta / dt * position_error) / (k + gamma);
            let impulse = axis * lambda;
            a.linear -= impulse * inv_mass_a;
            a.angular -= ra_cross * lambda * inv_inertia_a;
            b.linear += impulse * inv_mass_b;
            b.angular += rb_cross * lambda * inv_inertia_b;
        }

        if let Some(angular) = params.angular {
            let k_angular = inv_inertia_a + inv_inertia_b;
            if k_angular > LENGTH_EPSILON {
                let (gamma, beta) =
                    soft_coefficients(1.0 / k_angular, angular.frequency, angular.damping_ratio, dt);
                let angle_error = math::wrap_angle(b.angle - a.angle - initial_angle);
                let relative_spin = b.angular - a.angular;
                let lambda = -(relative_spin + beta / dt * angle_error) / (k_angular + gamma);
                a.angular -= lambda * inv_inertia_a;
                b.angular += lambda * inv_inertia_b;
            }
        }
        false
    }
}

/// Soft-constraint coefficients for a spring-damper of the given effective
/// mass: returns `(gamma, beta)`.
fn soft_coefficients(effective_mass: f32, frequency: f32, damping_ratio: f32, dt: f32) -> (f32, f32) {
    let omega = 2.0 * std::f32::consts::PI * frequency;
    let stiffness = effective_mass * omega * omega;
    let damping = 2.0 * effective_mass * damping_ratio * omega;
    let d = damping + dt * stiffness;
    if d < LENGTH_EPSILON {
        return (0.0, 0.0);
    }
    (1.0 / (dt * d), dt * stiffness / d)
}

/// Rigid translation solve along one world axis: velocity error plus a
/// clamped Baumgarte bias, distributed linearly and angularly.
#[allow(clippy::too_many_arguments)]
fn solve_translation_axis(
    a: &mut Body,
    b: &mut Body,
    world_a: Vec2,
    world_b: Vec2,
    axis: Vec2,
    error: f32,
    bias_factor: f32,
    max_bias: f32,
    dt: f32,
) {
    let inv_mass_a = a.effective_inv_mass();
    let inv_mass_b = b.effective_inv_mass();
    let inv_inertia_a = a.effective_inv_inertia();
    let inv_inertia_b = b.effective_inv_inertia();

    let ra = world_a - a.center;
    let rb = world_b - b.center;
    let ra_cross = ra.perp_dot(axis);
    let rb_cross = rb.perp_dot(axis);
    let k = inv_mass_a
        + inv_mass_b
        + ra_cross * ra_cross * inv_inertia_a
        + rb_cross * rb_cross * inv_inertia_b;
    if k < LENGTH_EPSILON {
        return;
    }

    let velocity_error = (b.velocity_at(world_b) - a.velocity_at(world_a)).dot(axis);
    let bias = (bias_factor * error / dt).clamp(-max_bias, max_bias);
    let lambda = -(velocity_error + bias) / k;
    let impulse = axis * lambda;
    a.linear -= impulse * inv_mass_a;
    a.angular -= ra_cross * lambda * inv_inertia_a;
    b.linear += impulse * inv_mass_b;
    b.angular += rb_cross * lambda * inv_inertia_b;
}
