use std::collections::HashSet;

use glam::Vec2;
use log::debug;
use slotmap::SlotMap;

use crate::body::{Body, BodyHandle, ContactInfo};
use crate::broadphase::SpatialHash;
use crate::constraints::{Constraint, ConstraintHandle, ConstraintKind, SpringParams};
use crate::error::Error;
use crate::events::{ConstraintBroken, ContactAdded, ContactRemoved, EventSinks};
use crate::integrate::{integrate_pose, integrate_velocity};
use crate::math::{self, Aabb, LENGTH_EPSILON};
use crate::narrowphase::{self, Manifold};
use crate::resolve;
use crate::shape::{CompoundChild, Shape};
use crate::sleep;

/// Tunables captured at world construction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldConfig {
    pub gravity: Vec2,
    pub gravity_scale: f32,
    pub time_scale: f32,
    /// Solver iterations per step.
    pub iterations: usize,
    /// Kinetic energy below which a body counts as quiet. Empirical; scale
    /// it with your masses and speeds.
    pub sleep_energy_threshold: f32,
    /// Continuous quiet seconds before a body may sleep.
    pub sleep_time: f32,
    /// Bodies whose center leaves these bounds are queued for removal.
    pub bounds: Aabb,
    /// Enable the experimental angular positional correction.
    pub angular_correction: bool,
    /// Broad-phase grid cell size.
    pub cell_size: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, 9.8),
            gravity_scale: 1.0,
            time_scale: 1.0,
            iterations: 8,
            sleep_energy_threshold: 1.0,
            sleep_time: 0.5,
            bounds: Aabb::new(Vec2::splat(-2000.0), Vec2::splat(2000.0)),
            angular_correction: false,
            cell_size: 64.0,
        }
    }
}

/// Closest surface hit returned by [`World::raycast`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub body: BodyHandle,
    pub point: Vec2,
    pub distance: f32,
}

/// The simulation: owns bodies and constraints, advances them with
/// [`World::tick`].
///
/// Destruction is deferred through a removal queue serviced at the start of
/// the next step, so handles observed during a step stay valid until it
/// completes.
pub struct World {
    bodies: SlotMap<BodyHandle, Body>,
    constraints: SlotMap<ConstraintHandle, Constraint>,
    config: WorldConfig,
    paused: bool,
    removal_queue: Vec<BodyHandle>,
    constraint_removal_queue: Vec<ConstraintHandle>,
    broadphase: SpatialHash,
    manifolds: Vec<Manifold>,
    events: EventSinks,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            broadphase: SpatialHash::new(config.cell_size),
            config,
            paused: false,
            removal_queue: Vec::new(),
            constraint_removal_queue: Vec::new(),
            manifolds: Vec::new(),
            events: EventSinks::default(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.config.time_scale = time_scale;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    // ------------------------------------------------------------------
    // Body management
    // ------------------------------------------------------------------

    pub fn create_circle(
        &mut self,
        center: Vec2,
        radius: f32,
        restitution: f32,
        locked: bool,
        mass: f32,
    ) -> Result<BodyHandle, Error> {
        let shape = Shape::circle(radius)?;
        self.insert_body(shape, center, restitution, locked, mass, true)
    }

    /// Create a box from two opposite corners, given in any order.
    pub fn create_box(
        &mut self,
        min: Vec2,
        max: Vec2,
        restitution: f32,
        locked: bool,
        mass: f32,
    ) -> Result<BodyHandle, Error> {
        let bounds = Aabb::new(min, max);
        let shape = Shape::rect(bounds.width(), bounds.height())?;
        self.insert_body(shape, bounds.center(), restitution, locked, mass, true)
    }

    pub fn create_polygon(
        &mut self,
        center: Vec2,
        vertices: Vec<Vec2>,
        restitution: f32,
        locked: bool,
        mass: f32,
        can_rotate: bool,
    ) -> Result<BodyHandle, Error> {
        let shape = Shape::polygon(vertices)?;
        self.insert_body(shape, center, restitution, locked, mass, can_rotate)
    }

    /// Create a compound body; its mass is the sum of the children's.
    pub fn create_compound(
        &mut self,
        center: Vec2,
        children: Vec<CompoundChild>,
        restitution: f32,
        locked: bool,
    ) -> Result<BodyHandle, Error> {
        let shape = Shape::compound(children)?;
        self.insert_body(shape, center, restitution, locked, 0.0, true)
    }

    fn insert_body(
        &mut self,
        shape: Shape,
        center: Vec2,
        restitution: f32,
        locked: bool,
        mass: f32,
        can_rotate: bool,
    ) -> Result<BodyHandle, Error> {
        let body = Body::new(shape, center, restitution, locked, mass, can_rotate)?;
        let handle = self.bodies.insert_with_key(|key| {
            let mut body = body;
            body.handle = key;
            body
        });
        Ok(handle)
    }

    /// Queue a body for removal; it disappears at the start of the next
    /// step, together with any constraints that reference it.
    pub fn destroy(&mut self, handle: BodyHandle) -> Result<(), Error> {
        if !self.bodies.contains_key(handle) {
            return Err(Error::StaleHandle);
        }
        if !self.removal_queue.contains(&handle) {
            self.removal_queue.push(handle);
        }
        Ok(())
    }

    pub fn set_velocity(
        &mut self,
        handle: BodyHandle,
        linear: Vec2,
        angular: f32,
    ) -> Result<(), Error> {
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.linear = linear;
        body.angular = angular;
        body.wake();
        Ok(())
    }

    /// Apply a linear impulse at the center of mass. Locked bodies wake but
    /// keep zero velocity.
    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec2) -> Result<(), Error> {
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.linear += impulse * body.effective_inv_mass();
        body.wake();
        Ok(())
    }

    /// Accumulate a force consumed by the next velocity integration.
    pub fn apply_force(&mut self, handle: BodyHandle, force: Vec2) -> Result<(), Error> {
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.force += force;
        body.wake();
        Ok(())
    }

    pub fn apply_torque(&mut self, handle: BodyHandle, torque: f32) -> Result<(), Error> {
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.torque += torque;
        body.wake();
        Ok(())
    }

    /// Teleport a body, refreshing its cached AABB.
    pub fn set_position(&mut self, handle: BodyHandle, center: Vec2) -> Result<(), Error> {
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.center = center;
        body.wake();
        body.update_aabb();
        Ok(())
    }

    pub fn set_angle(&mut self, handle: BodyHandle, angle: f32) -> Result<(), Error> {
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.angle = angle;
        body.wake();
        body.update_aabb();
        Ok(())
    }

    pub fn wake(&mut self, handle: BodyHandle) -> Result<(), Error> {
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.wake();
        Ok(())
    }

    /// Freeze a body in place with effectively infinite mass.
    pub fn lock(&mut self, handle: BodyHandle) -> Result<(), Error> {
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.locked = true;
        body.linear = Vec2::ZERO;
        body.angular = 0.0;
        body.wake();
        Ok(())
    }

    pub fn unlock(&mut self, handle: BodyHandle) -> Result<(), Error> {
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.locked = false;
        body.wake();
        Ok(())
    }

    pub fn set_friction(&mut self, handle: BodyHandle, friction: f32) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&friction) {
            return Err(Error::ParameterOutOfRange("friction must be within [0, 1]"));
        }
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.friction = friction;
        Ok(())
    }

    pub fn set_restitution(&mut self, handle: BodyHandle, restitution: f32) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&restitution) {
            return Err(Error::ParameterOutOfRange("restitution must be within [0, 1]"));
        }
        let body = self.bodies.get_mut(handle).ok_or(Error::StaleHandle)?;
        body.restitution = restitution;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Constraint management
    // ------------------------------------------------------------------

    /// Weld two bodies: anchors held coincident and the current relative
    /// angle preserved.
    pub fn add_weld(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        anchor_a: Vec2,
        anchor_b: Vec2,
        can_break: bool,
    ) -> Result<ConstraintHandle, Error> {
        let (angle_a, angle_b) = self.constraint_endpoints(a, b)?;
        self.install_constraint(Constraint {
            a,
            b,
            anchor_a,
            anchor_b,
            kind: ConstraintKind::Weld {
                initial_angle: angle_b - angle_a,
            },
            can_break,
            broken: false,
        })
    }

    /// Revolute joint: anchors held coincident, rotation free.
    pub fn add_axis(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> Result<ConstraintHandle, Error> {
        self.constraint_endpoints(a, b)?;
        self.install_constraint(Constraint {
            a,
            b,
            anchor_a,
            anchor_b,
            kind: ConstraintKind::Axis,
            can_break: false,
            broken: false,
        })
    }

    pub fn add_spring(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        anchor_a: Vec2,
        anchor_b: Vec2,
        params: SpringParams,
        can_break: bool,
    ) -> Result<ConstraintHandle, Error> {
        if params.frequency <= 0.0 {
            return Err(Error::ParameterOutOfRange("spring frequency must be positive"));
        }
        if !(0.0..=1.0).contains(&params.damping_ratio) {
            return Err(Error::ParameterOutOfRange("damping ratio must be within [0, 1]"));
        }
        if let Some(angular) = params.angular {
            if angular.frequency <= 0.0 {
                return Err(Error::ParameterOutOfRange(
                    "angular spring frequency must be positive",
                ));
            }
            if !(0.0..=1.0).contains(&angular.damping_ratio) {
                return Err(Error::ParameterOutOfRange(
                    "angular damping ratio must be within [0, 1]",
                ));
            }
        }
        let (angle_a, angle_b) = self.constraint_endpoints(a, b)?;
        let world_a = {
            let body = &self.bodies[a];
            body.center + math::rotate(anchor_a, body.angle)
        };
        let world_b = {
            let body = &self.bodies[b];
            body.center + math::rotate(anchor_b, body.angle)
        };
        self.install_constraint(Constraint {
            a,
            b,
            anchor_a,
            anchor_b,
            kind: ConstraintKind::Spring {
                params,
                initial_axis: math::normalize_or(world_b - world_a, Vec2::X),
                initial_angle: angle_b - angle_a,
            },
            can_break,
            broken: false,
        })
    }

    fn constraint_endpoints(&self, a: BodyHandle, b: BodyHandle) -> Result<(f32, f32), Error> {
        if a == b {
            return Err(Error::ParameterOutOfRange(
                "constraint requires two distinct bodies",
            ));
        }
        let body_a = self.bodies.get(a).ok_or(Error::StaleHandle)?;
        let body_b = self.bodies.get(b).ok_or(Error::StaleHandle)?;
        Ok((body_a.angle, body_b.angle))
    }

    /// Register the pair in both connection sets and keep both bodies from
    /// sleeping while constrained.
    fn install_constraint(&mut self, constraint: Constraint) -> Result<ConstraintHandle, Error> {
        let (a, b) = (constraint.a, constraint.b);
        if let Some(body) = self.bodies.get_mut(a) {
            body.connections.insert(b);
            body.can_sleep = false;
            body.wake();
        }
        if let Some(body) = self.bodies.get_mut(b) {
            body.connections.insert(a);
            body.can_sleep = false;
            body.wake();
        }
        Ok(self.constraints.insert(constraint))
    }

    /// Queue a constraint for removal at the start of the next step.
    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Result<(), Error> {
        if !self.constraints.contains_key(handle) {
            return Err(Error::StaleHandle);
        }
        if !self.constraint_removal_queue.contains(&handle) {
            self.constraint_removal_queue.push(handle);
        }
        Ok(())
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(handle)
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintHandle, &Constraint)> {
        self.constraints.iter()
    }

    /// Bodies in `root`'s constraint assembly that are no longer reachable
    /// through unbroken constraints — the parts that have fallen off.
    pub fn detached_parts(&self, root: BodyHandle) -> Result<Vec<BodyHandle>, Error> {
        if !self.bodies.contains_key(root) {
            return Err(Error::StaleHandle);
        }
        let assembly = self.constraint_component(root, false);
        let attached = self.constraint_component(root, true);
        Ok(assembly
            .into_iter()
            .filter(|h| !attached.contains(h))
            .collect())
    }

    /// BFS over the constraint graph from `root`, optionally skipping
    /// broken edges.
    fn constraint_component(&self, root: BodyHandle, skip_broken: bool) -> Vec<BodyHandle> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::from([root]);
        visited.insert(root);
        while let Some(current) = queue.pop_front() {
            order.push(current);
            for (_, constraint) in self.constraints.iter() {
                if skip_broken && constraint.broken {
                    continue;
                }
                if let Some(other) = constraint.other(current) {
                    if visited.insert(other) {
                        queue.push_back(other);
                    }
                }
            }
        }
        order
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn on_contact_added(&mut self, callback: impl FnMut(&ContactAdded) + 'static) {
        self.events.on_contact_added = Some(Box::new(callback));
    }

    pub fn on_contact_removed(&mut self, callback: impl FnMut(&ContactRemoved) + 'static) {
        self.events.on_contact_removed = Some(Box::new(callback));
    }

    pub fn on_constraint_broken(&mut self, callback: impl FnMut(&ConstraintBroken) + 'static) {
        self.events.on_constraint_broken = Some(Box::new(callback));
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies.iter()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// First body whose shape contains the world point.
    pub fn body_at_point(&self, point: Vec2) -> Option<BodyHandle> {
        self.bodies
            .iter()
            .find(|(_, body)| body.shape.contains(point, body.center, body.angle))
            .map(|(handle, _)| handle)
    }

    /// All bodies whose cached AABB overlaps the query box.
    pub fn query_aabb(&self, aabb: Aabb) -> Vec<BodyHandle> {
        self.bodies
            .iter()
            .filter(|(_, body)| body.aabb.overlaps(&aabb))
            .map(|(handle, _)| handle)
            .collect()
    }

    /// Closest surface hit along a ray, within `max_dist` of `origin`.
    pub fn raycast(&self, origin: Vec2, dir: Vec2, max_dist: f32) -> Option<RayHit> {
        let len = dir.length();
        if len < LENGTH_EPSILON {
            return None;
        }
        let dir = dir / len;
        let mut closest: Option<RayHit> = None;
        for (handle, body) in self.bodies.iter() {
            if let Some(t) = ray_shape(&body.shape, body.center, body.angle, origin, dir) {
                if t >= 0.0 && t <= max_dist && closest.map_or(true, |c| t < c.distance) {
                    closest = Some(RayHit {
                        body: handle,
                        point: origin + dir * t,
                        distance: t,
                    });
                }
            }
        }
        closest
    }

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Advance the simulation by `dt` seconds (scaled by the world's time
    /// scale; a no-op while paused).
    pub fn tick(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        let dt = dt * self.config.time_scale;
        if dt <= 0.0 {
            return;
        }

        self.service_removals();

        let gravity = self.config.gravity * self.config.gravity_scale;
        for (_, body) in self.bodies.iter_mut() {
            integrate_velocity(body, gravity, dt);
        }

        let pairs = self.broad_phase();
        self.narrow_phase(&pairs);
        self.update_contact_sets();

        for iteration in 0..self.config.iterations {
            self.solve_velocity_iteration(dt, iteration);
        }

        self.correct_positions();

        for (_, body) in self.bodies.iter_mut() {
            integrate_pose(body, dt);
            body.update_aabb();
        }

        sleep::update_sleep(
            &mut self.bodies,
            &self.manifolds,
            self.config.sleep_energy_threshold,
            self.config.sleep_time,
            dt,
        );

        self.evict_out_of_bounds();
    }

    fn service_removals(&mut self) {
        let queued = std::mem::take(&mut self.constraint_removal_queue);
        for handle in queued {
            self.uninstall_constraint(handle);
        }

        let queued = std::mem::take(&mut self.removal_queue);
        for handle in queued {
            if self.bodies.remove(handle).is_none() {
                continue;
            }
            let dead: Vec<ConstraintHandle> = self
                .constraints
                .iter()
                .filter(|(_, c)| c.links(handle))
                .map(|(ch, _)| ch)
                .collect();
            for ch in dead {
                self.uninstall_constraint(ch);
            }
            for (_, body) in self.bodies.iter_mut() {
                body.contacts.remove(&handle);
                body.connections.remove(&handle);
            }
            debug!("body {handle:?} removed");
        }
    }

    fn uninstall_constraint(&mut self, handle: ConstraintHandle) {
        let Some(constraint) = self.constraints.remove(handle) else {
            return;
        };
        let (a, b) = (constraint.a, constraint.b);
        let pair_still_linked = self
            .constraints
            .values()
            .any(|c| (c.a == a && c.b == b) || (c.a == b && c.b == a));
        if !pair_still_linked {
            if let Some(body) = self.bodies.get_mut(a) {
                body.connections.remove(&b);
            }
            if let Some(body) = self.bodies.get_mut(b) {
                body.connections.remove(&a);
            }
        }
        for endpoint in [a, b] {
            let constrained = self.constraints.values().any(|c| c.links(endpoint));
            if !constrained {
                if let Some(body) = self.bodies.get_mut(endpoint) {
                    body.can_sleep = true;
                }
            }
        }
    }

    /// Candidate pairs: AABBs overlap, not both sleeping, not linked by a
    /// constraint.
    fn broad_phase(&mut self) -> Vec<(BodyHandle, BodyHandle)> {
        self.broadphase.clear();
        for (handle, body) in self.bodies.iter() {
            self.broadphase.insert(handle, &body.aabb);
        }
        let mut pairs = self.broadphase.pairs();
        pairs.retain(|&(a, b)| {
            let (Some(body_a), Some(body_b)) = (self.bodies.get(a), self.bodies.get(b)) else {
                return false;
            };
            if body_a.sleeping && body_b.sleeping {
                return false;
            }
            if body_a.connections.contains(&b) {
                return false;
            }
            body_a.aabb.overlaps(&body_b.aabb)
        });
        pairs
    }

    fn narrow_phase(&mut self, pairs: &[(BodyHandle, BodyHandle)]) {
        self.manifolds.clear();
        for &(a, b) in pairs {
            let (Some(body_a), Some(body_b)) = (self.bodies.get(a), self.bodies.get(b)) else {
                continue;
            };
            if let Some(manifold) = narrowphase::collide(body_a, body_b) {
                self.manifolds.push(manifold);
            }
        }
    }

    /// Refresh per-body contact maps from this step's manifolds and fire
    /// added events, then removed events. Pairs where both bodies sleep are
    /// not re-tested, so their entries persist without events.
    fn update_contact_sets(&mut self) {
        let mut previous: HashSet<(BodyHandle, BodyHandle)> = HashSet::new();
        for (handle, body) in self.bodies.iter() {
            for &other in body.contacts.keys() {
                previous.insert(ordered(handle, other));
            }
        }

        let asleep: HashSet<BodyHandle> = self
            .bodies
            .iter()
            .filter(|(_, body)| body.sleeping)
            .map(|(handle, _)| handle)
            .collect();
        for (_, body) in self.bodies.iter_mut() {
            if body.sleeping {
                body.contacts.retain(|other, _| asleep.contains(other));
            } else {
                body.contacts.clear();
            }
        }

        for m in &self.manifolds {
            if let Some(body) = self.bodies.get_mut(m.a) {
                body.contacts.insert(
                    m.b,
                    ContactInfo { point: m.contact_point, normal: m.normal },
                );
            }
            if let Some(body) = self.bodies.get_mut(m.b) {
                body.contacts.insert(
                    m.a,
                    ContactInfo { point: m.contact_point, normal: -m.normal },
                );
            }
        }

        let mut current: HashSet<(BodyHandle, BodyHandle)> = HashSet::new();
        for (handle, body) in self.bodies.iter() {
            for &other in body.contacts.keys() {
                current.insert(ordered(handle, other));
            }
        }

        for &(a, b) in current.difference(&previous) {
            let info = self
                .bodies
                .get(a)
                .and_then(|body| body.contacts.get(&b).copied());
            if let (Some(info), Some(callback)) = (info, self.events.on_contact_added.as_mut()) {
                callback(&ContactAdded { a, b, point: info.point, normal: info.normal });
            }
        }
        for &(a, b) in previous.difference(&current) {
            if let Some(callback) = self.events.on_contact_removed.as_mut() {
                callback(&ContactRemoved { a, b });
            }
        }
    }

    /// One Gauss-Seidel round: contact impulses for every manifold, then
    /// every active constraint.
    fn solve_velocity_iteration(&mut self, dt: f32, iteration: usize) {
        let manifolds = std::mem::take(&mut self.manifolds);
        for m in &manifolds {
            let Some([a, b]) = self.bodies.get_disjoint_mut([m.a, m.b]) else {
                continue;
            };
            if resolve::apply_impulses(a, b, m) {
                a.wake();
                b.wake();
            }
        }
        self.manifolds = manifolds;

        let handles: Vec<ConstraintHandle> = self.constraints.keys().collect();
        let mut newly_broken = Vec::new();
        for handle in handles {
            let Some(constraint) = self.constraints.get_mut(handle) else {
                continue;
            };
            if constraint.broken {
                continue;
            }
            let Some([a, b]) = self.bodies.get_disjoint_mut([constraint.a, constraint.b]) else {
                continue;
            };
            if constraint.solve(a, b, dt, iteration) {
                newly_broken.push(handle);
            }
        }
        for handle in newly_broken {
            debug!("constraint {handle:?} broke");
            if let Some(callback) = self.events.on_constraint_broken.as_mut() {
                callback(&ConstraintBroken { constraint: handle });
            }
        }
    }

    fn correct_positions(&mut self) {
        let manifolds = std::mem::take(&mut self.manifolds);
        for m in &manifolds {
            let Some([a, b]) = self.bodies.get_disjoint_mut([m.a, m.b]) else {
                continue;
            };
            resolve::correct_positions(a, b, m, self.config.angular_correction);
        }
        self.manifolds = manifolds;
    }

    fn evict_out_of_bounds(&mut self) {
        let bounds = self.config.bounds;
        let out: Vec<BodyHandle> = self
            .bodies
            .iter()
            .filter(|(_, body)| !bounds.contains_point(body.center))
            .map(|(handle, _)| handle)
            .collect();
        for handle in out {
            debug!("body {handle:?} left the world bounds, removing");
            if !self.removal_queue.contains(&handle) {
                self.removal_queue.push(handle);
            }
        }
    }
}

fn ordered(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
    if a <= b { (a, b) } else { (b, a) }
}

// ---------------------------------------------------------------------
// Ray tests
// ---------------------------------------------------------------------

fn ray_shape(shape: &Shape, center: Vec2, angle: f32, origin: Vec2, dir: Vec2) -> Option<f32> {
    match shape {
        Shape::Circle { radius } => ray_circle(origin, dir, center, *radius),
        Shape::Box { width, height } => {
            // Cast in the box's local frame; rotation preserves distances.
            let local_origin = math::rotate(origin - center, -angle);
            let local_dir = math::rotate(dir, -angle);
            ray_half_extents(local_origin, local_dir, Vec2::new(width * 0.5, height * 0.5))
        }
        Shape::Polygon { .. } => {
            let verts = shape.transformed_vertices(center, angle);
            let n = verts.len();
            let mut closest: Option<f32> = None;
            for i in 0..n {
                if let Some(t) = ray_segment(origin, dir, verts[i], verts[(i + 1) % n]) {
                    if closest.map_or(true, |c| t < c) {
                        closest = Some(t);
                    }
                }
            }
            closest
        }
        Shape::Compound { children } => {
            let mut closest: Option<f32> = None;
            for child in children {
                let child_center = center + math::rotate(child.offset, angle);
                if let Some(t) =
                    ray_shape(&child.shape, child_center, angle + child.angle, origin, dir)
                {
                    if closest.map_or(true, |c| t < c) {
                        closest = Some(t);
                    }
                }
            }
            closest
        }
    }
}

fn ray_circle(origin: Vec2, dir: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let f = origin - center;
    let b = 2.0 * f.dot(dir);
    let c = f.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let t1 = (-b - sqrt_d) * 0.5;
    let t2 = (-b + sqrt_d) * 0.5;
    if t1 >= 0.0 {
        Some(t1)
    } else if t2 >= 0.0 {
        Some(t2)
    } else {
        None
    }
}

/// Slab test against `[-half, half]` in each axis.
fn ray_half_extents(origin: Vec2, dir: Vec2, half: Vec2) -> Option<f32> {
    let (mut t_min, mut t_max) = if dir.x.abs() < LENGTH_EPSILON {
        if origin.x.abs() > half.x {
            return None;
        }
        (f32::MIN, f32::MAX)
    } else {
        let inv = 1.0 / dir.x;
        let t1 = (-half.x - origin.x) * inv;
        let t2 = (half.x - origin.x) * inv;
        (t1.min(t2), t1.max(t2))
    };

    let (ty_min, ty_max) = if dir.y.abs() < LENGTH_EPSILON {
        if origin.y.abs() > half.y {
            return None;
        }
        (f32::MIN, f32::MAX)
    } else {
        let inv = 1.0 / dir.y;
        let t1 = (-half.y - origin.y) * inv;
        let t2 = (half.y - origin.y) * inv;
        (t1.min(t2), t1.max(t2))
    };

    t_min = t_min.max(ty_min);
    t_max = t_max.min(ty_max);
    if t_min > t_max || t_max < 0.0 {
        return None;
    }
    Some(if t_min >= 0.0 { t_min } else { t_max })
}

fn ray_segment(origin: Vec2, dir: Vec2, a: Vec2, b: Vec2) -> Option<f32> {
    let edge = b - a;
    let denom = dir.perp_dot(edge);
    if denom.abs() < LENGTH_EPSILON {
        return None;
    }
    let to_a = a - origin;
    let t = to_a.perp_dot(edge) / denom;
    let u = to_a.perp_dot(dir) / denom;
    if t >= 0.0 && (0.0..=1.0).contains(&u) {
        Some(t)
    } else {
        None
    }
}
