use std::collections::HashSet;

use glam::Vec2;
use log::trace;
use slotmap::SlotMap;

use crate::body::{Body, BodyHandle};
use crate::narrowphase::Manifold;

/// Update sleep state for all bodies from their kinetic energy and the
/// step's contacts.
///
/// A `can_sleep` body falls asleep after staying below the energy threshold
/// for `sleep_time` continuous seconds, unless it touches an awake body.
/// Contact with an awake body wakes sleepers. Locked bodies are always awake
/// but are never wake sources.
pub fn update_sleep(
    bodies: &mut SlotMap<BodyHandle, Body>,
    manifolds: &[Manifold],
    energy_threshold: f32,
    sleep_time: f32,
    dt: f32,
) {
    // Bodies currently touching an awake, unlocked partner.
    let mut touching_awake: HashSet<BodyHandle> = HashSet::new();
    for m in manifolds {
        if is_awake(bodies, m.b) {
            touching_awake.insert(m.a);
        }
        if is_awake(bodies, m.a) {
            touching_awake.insert(m.b);
        }
    }

    for (handle, body) in bodies.iter_mut() {
        if body.locked || body.sleeping || !body.can_sleep {
            continue;
        }
        if body.kinetic_energy() < energy_threshold {
            body.sleep_timer += dt;
            if body.sleep_timer > sleep_time && !touching_awake.contains(&handle) {
                trace!("body {handle:?} falling asleep");
                body.sleeping = true;
                body.linear = Vec2::ZERO;
                body.angular = 0.0;
            }
        } else {
            body.sleep_timer = 0.0;
        }
    }

    for m in manifolds {
        wake_from_contact(bodies, m.a, m.b);
        wake_from_contact(bodies, m.b, m.a);
    }
}

fn is_awake(bodies: &SlotMap<BodyHandle, Body>, handle: BodyHandle) -> bool {
    bodies.get(handle).is_some_and(|b| !b.sleeping && !b.locked)
}

fn wake_from_contact(
    bodies: &mut SlotMap<BodyHandle, Body>,
    target: BodyHandle,
    partner: BodyHandle,
) {
    if !is_awake(bodies, partner) {
        return;
    }
    if let Some(body) = bodies.get_mut(target) {
        if body.sleeping {
            trace!("body {target:?} woken by contact");
            body.wake();
        }
    }
}
