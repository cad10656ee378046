use std::collections::{HashMap, HashSet};

use glam::Vec2;
use slotmap::new_key_type;

use crate::error::Error;
use crate::math::Aabb;
use crate::shape::Shape;

new_key_type! {
    /// Stable handle to a body owned by the world. Handles stay valid until
    /// the body is removed; afterwards they are rejected as stale.
    pub struct BodyHandle;
}

/// Friction applied to bodies unless overridden with
/// [`crate::world::World::set_friction`].
pub const DEFAULT_FRICTION: f32 = 0.5;

/// Contact recorded against another body for the current step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactInfo {
    pub point: Vec2,
    pub normal: Vec2,
}

/// A rigid body: a shape plus pose, velocities, material and mass data.
///
/// Locked bodies behave as infinitely heavy; their stored mass is kept but
/// the effective inverse mass and inertia read as zero.
#[derive(Debug, Clone)]
pub struct Body {
    pub handle: BodyHandle,
    pub shape: Shape,
    pub center: Vec2,
    /// Radians, counter-clockwise positive.
    pub angle: f32,
    pub linear: Vec2,
    pub angular: f32,
    pub restitution: f32,
    pub friction: f32,
    pub mass: f32,
    pub inv_mass: f32,
    pub inertia: f32,
    pub inv_inertia: f32,
    pub locked: bool,
    pub can_rotate: bool,
    pub can_sleep: bool,
    pub sleeping: bool,
    pub sleep_timer: f32,
    /// Cached world bounds, refreshed whenever the body moves or rotates.
    pub aabb: Aabb,
    /// Force accumulated until the next velocity integration.
    pub force: Vec2,
    pub torque: f32,
    /// Bodies touched this step, with the contact point and the normal
    /// pointing away from this body.
    pub contacts: HashMap<BodyHandle, ContactInfo>,
    /// Bodies linked by a constraint; contact resolution between connected
    /// bodies is suppressed.
    pub connections: HashSet<BodyHandle>,
}

impl Body {
    /// Build a body from a validated shape. A zero mass defaults to the
    /// shape area (compounds sum their children instead).
    pub(crate) fn new(
        shape: Shape,
        center: Vec2,
        restitution: f32,
        locked: bool,
        mass: f32,
        can_rotate: bool,
    ) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&restitution) {
            return Err(Error::ParameterOutOfRange("restitution must be within [0, 1]"));
        }
        if mass < 0.0 {
            return Err(Error::InvalidMass(mass));
        }
        let mass = if mass == 0.0 {
            match &shape {
                Shape::Compound { children } => children.iter().map(|c| c.mass).sum(),
                _ => shape.area(),
            }
        } else {
            mass
        };
        let inertia = shape.moment_of_inertia(mass);
        let aabb = shape.aabb(center, 0.0);
        Ok(Self {
            handle: BodyHandle::default(),
            shape,
            center,
            angle: 0.0,
            linear: Vec2::ZERO,
            angular: 0.0,
            restitution,
            friction: DEFAULT_FRICTION,
            mass,
            inv_mass: 1.0 / mass,
            inertia,
            inv_inertia: if inertia > 0.0 { 1.0 / inertia } else { 0.0 },
            locked,
            can_rotate,
            can_sleep: true,
            sleeping: false,
            sleep_timer: 0.0,
            aabb,
            force: Vec2::ZERO,
            torque: 0.0,
            contacts: HashMap::new(),
            connections: HashSet::new(),
        })
    }

    /// Inverse mass as the solver sees it: zero for locked bodies.
    pub fn effective_inv_mass(&self) -> f32 {
        if self.locked { 0.0 } else { self.inv_mass }
    }

    /// Inverse inertia as the solver sees it: zero for locked bodies and
    /// bodies that cannot rotate.
    pub fn effective_inv_inertia(&self) -> f32 {
        if self.locked || !self.can_rotate {
            0.0
        } else {
            self.inv_inertia
        }
    }

    /// Linear plus rotational kinetic energy.
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.linear.length_squared()
            + 0.5 * self.inertia * self.angular * self.angular
    }

    /// Velocity of the world point `point` carried by this body.
    pub fn velocity_at(&self, point: Vec2) -> Vec2 {
        self.linear + (point - self.center).perp() * self.angular
    }

    pub(crate) fn wake(&mut self) {
        self.sleeping = false;
        self.sleep_timer = 0.0;
    }

    pub(crate) fn update_aabb(&mut self) {
        self.aabb = self.shape.aabb(self.center, self.angle);
    }
}
