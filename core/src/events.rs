use glam::Vec2;

use crate::body::BodyHandle;
use crate::constraints::ConstraintHandle;

/// A pair entered the contact set this step. The normal points from `a`
/// toward `b`.
#[derive(Debug, Clone, Copy)]
pub struct ContactAdded {
    pub a: BodyHandle,
    pub b: BodyHandle,
    pub point: Vec2,
    pub normal: Vec2,
}

/// A pair left the contact set this step.
#[derive(Debug, Clone, Copy)]
pub struct ContactRemoved {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

/// A breakable constraint crossed its break threshold. Fires once, on the
/// transition; the broken constraint stays in the world until removed.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintBroken {
    pub constraint: ConstraintHandle,
}

/// Callback sinks invoked synchronously inside `tick` at deterministic
/// points. Handlers receive event data only and cannot reach back into the
/// world; callers wanting to create or destroy from a handler record the
/// intent and apply it after `tick` returns.
#[derive(Default)]
pub(crate) struct EventSinks {
    pub on_contact_added: Option<Box<dyn FnMut(&ContactAdded)>>,
    pub on_contact_removed: Option<Box<dyn FnMut(&ContactRemoved)>>,
    pub on_constraint_broken: Option<Box<dyn FnMut(&ConstraintBroken)>>,
}
