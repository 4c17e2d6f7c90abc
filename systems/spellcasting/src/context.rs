use glam::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use runecast_core::{
    services::SpellWorld, EndReason, Entity, EntityHandle, Event, SpellHandle, SpellKind,
};

use crate::registry::SpellRegistry;

/// Collaborators borrowed for the duration of one registry operation.
pub(crate) struct Frame<'a> {
    pub(crate) world: &'a mut dyn SpellWorld,
    pub(crate) rng: &'a mut ChaCha8Rng,
    pub(crate) events: &'a mut Vec<Event>,
}

/// Everything a spell may touch while one of its lifecycle hooks runs.
pub(crate) struct SpellContext<'a> {
    pub(crate) world: &'a mut dyn SpellWorld,
    pub(crate) rng: &'a mut ChaCha8Rng,
    pub(crate) events: &'a mut Vec<Event>,
    pub(crate) registry: &'a mut SpellRegistry,
}

impl SpellContext<'_> {
    /// Uniform draw in `[low, high)`; collapses to `low` for empty ranges.
    pub(crate) fn random(&mut self, low: f32, high: f32) -> f32 {
        if high > low {
            self.rng.gen_range(low..high)
        } else {
            low
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub(crate) fn unit(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    pub(crate) fn entity(&self, handle: EntityHandle) -> Option<&Entity> {
        self.world.entity(handle)
    }

    pub(crate) fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.world.entity_mut(handle)
    }

    pub(crate) fn entity_pos(&self, handle: EntityHandle) -> Option<Vec3> {
        self.world.entity(handle).map(|entity| entity.pos)
    }

    /// Position of the player's feet; the origin if the player is missing.
    pub(crate) fn player_pos(&self) -> Vec3 {
        self.entity_pos(EntityHandle::PLAYER).unwrap_or(Vec3::ZERO)
    }

    pub(crate) fn end_by_caster(&mut self, caster: EntityHandle, kind: SpellKind) {
        let mut frame = Frame {
            world: &mut *self.world,
            rng: &mut *self.rng,
            events: &mut *self.events,
        };
        self.registry.end_by_caster(caster, kind, &mut frame);
    }

    pub(crate) fn end_by_target(&mut self, target: EntityHandle, kind: SpellKind) {
        let mut frame = Frame {
            world: &mut *self.world,
            rng: &mut *self.rng,
            events: &mut *self.events,
        };
        self.registry.end_by_target(target, kind, &mut frame);
    }

    pub(crate) fn end_spell(&mut self, handle: SpellHandle) -> bool {
        let mut frame = Frame {
            world: &mut *self.world,
            rng: &mut *self.rng,
            events: &mut *self.events,
        };
        self.registry
            .end_spell(handle, EndReason::Cancelled, &mut frame)
    }
}
