//! Spells that restore life, cure poison or feed the player.

use std::time::Duration;

use glam::Vec3;
use runecast_core::{EmitterHandle, EmitterKind, EntityFlags, EntityHandle, SoundId, SpellKind};

use super::{above, spell_light, FLICKER_LIFETIME};
use crate::{
    context::SpellContext,
    effects::{self, cue},
    instance::{SpellBehavior, SpellState},
};

const HEAL_RADIUS: f32 = 300.0;
const HEAL_JITTER: (f32, f32) = (0.8, 2.4);
const SPARKLE_FADE: Duration = Duration::from_millis(1500);

fn heal_light(pos: Vec3) -> runecast_core::DynamicLight {
    let mut light = spell_light(pos + above(50.0), Vec3::new(0.4, 0.4, 1.0), 2.3);
    light.duration = Some(FLICKER_LIFETIME);
    light
}

/// Heals living creatures around the anchor, strongest at the centre.
#[derive(Debug, Default)]
pub(crate) struct Heal {
    sparkles: Option<EmitterHandle>,
}

impl Heal {
    fn anchor(state: &SpellState, cx: &SpellContext<'_>) -> Option<Vec3> {
        if state.caster_is_player() {
            Some(cx.player_pos())
        } else {
            state.target.and_then(|target| cx.entity_pos(target))
        }
    }

    fn heal_around(state: &SpellState, cx: &mut SpellContext<'_>, dt: Duration) {
        let (controls_blocked, full_max_life) = {
            let player = cx.world.player();
            (player.controls_blocked, player.full_max_life)
        };
        for handle in cx.world.entity_handles() {
            let Some(entity) = cx.entity(handle) else {
                continue;
            };
            let eligible = entity
                .flags
                .contains(EntityFlags::IN_SCENE | EntityFlags::IN_TREAT_ZONE)
                && (entity.is_npc() || handle.is_player())
                && entity.is_alive();
            if !eligible {
                continue;
            }
            let distance = if handle == state.caster {
                0.0
            } else {
                state.position.distance(entity.pos)
            };
            if distance >= HEAL_RADIUS {
                continue;
            }
            let gain = cx.random(HEAL_JITTER.0, HEAL_JITTER.1)
                * state.level
                * (HEAL_RADIUS - distance)
                / HEAL_RADIUS
                * dt.as_secs_f32();
            if handle == EntityHandle::PLAYER && controls_blocked {
                continue;
            }
            let Some(entity) = cx.entity_mut(handle) else {
                continue;
            };
            let cap = if handle.is_player() {
                full_max_life
            } else {
                entity.life.max
            };
            entity.life.current = (entity.life.current + gain).min(cap);
        }
    }
}

impl SpellBehavior for Heal {
    fn can_launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) -> bool {
        !cx.registry
            .exists_any_instance_for_caster(SpellKind::Heal, state.caster)
    }

    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cue(cx.world, state, SoundId::Heal, state.caster_pos);
        state.has_duration = true;
        state.mana_per_second = 0.4 * state.level;
        state.duration = state.duration_or(3500);
        state.position = if state.caster_is_player() {
            cx.player_pos()
        } else {
            state.caster_pos
        };
        effects::attach_emitter(
            cx.world,
            &mut self.sparkles,
            EmitterKind::HealSparkles,
            state.position,
        );
        state.light = cx.world.acquire_light(heal_light(state.position));
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, dt: Duration) {
        if let Some(anchor) = Self::anchor(state, cx) {
            state.position = anchor;
        }
        if let Some(light) = effects::ensure_light(cx.world, &mut state.light, heal_light(state.position)) {
            *light = heal_light(state.position);
        }
        let alpha = effects::fade_out(state.elapsed, state.duration, SPARKLE_FADE);
        effects::update_emitter(cx.world, self.sparkles, state.position, alpha);
        Self::heal_around(state, cx, dt);
    }

    fn end(&mut self, _state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::release_emitter(cx.world, &mut self.sparkles);
    }
}

/// Draws poison out of the target.
#[derive(Debug, Default)]
pub(crate) struct CurePoison {
    sparkles: Option<EmitterHandle>,
}

impl SpellBehavior for CurePoison {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        state.target_self_if_player();
        let cure = state.level * 10.0;
        let target = state.target_or_caster();
        if let Some(entity) = cx.entity_mut(target) {
            if target.is_player() || entity.is_npc() {
                entity.poison -= entity.poison.min(cure);
            }
            let pos = entity.pos;
            state.position = pos;
            cue(cx.world, state, SoundId::CurePoison, pos);
        }
        state.duration = Duration::from_millis(3500);
        effects::attach_emitter(
            cx.world,
            &mut self.sparkles,
            EmitterKind::CurePoisonSparkles,
            state.position,
        );
        let mut light = spell_light(state.position + above(50.0), Vec3::new(0.0, 1.0, 0.0), 1.5);
        light.duration = Some(FLICKER_LIFETIME);
        state.light = cx.world.acquire_light(light);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        if let Some(pos) = cx.entity_pos(state.target_or_caster()) {
            state.position = pos;
        }
        if let Some(light) = effects::light_mut(cx.world, state.light) {
            light.pos = state.position + above(50.0);
        }
        let alpha = effects::fade_out(state.elapsed, state.duration, SPARKLE_FADE);
        effects::update_emitter(cx.world, self.sparkles, state.position, alpha);
    }

    fn end(&mut self, _state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::release_emitter(cx.world, &mut self.sparkles);
    }
}

/// Fills the player's stomach.
#[derive(Debug, Default)]
pub(crate) struct CreateFood {
    sparkles: Option<EmitterHandle>,
}

impl SpellBehavior for CreateFood {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cue(cx.world, state, SoundId::CreateFood, state.caster_pos);
        state.duration = state.duration_or(3500);
        if state.caster_is_player() || state.target == Some(EntityHandle::PLAYER) {
            cx.world.player_mut().hunger = 100.0;
        }
        state.position = cx.player_pos();
        effects::attach_emitter(
            cx.world,
            &mut self.sparkles,
            EmitterKind::CreateFoodSparkles,
            state.position,
        );
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        state.position = cx.player_pos();
        let alpha = effects::fade_out(state.elapsed, state.duration, SPARKLE_FADE);
        effects::update_emitter(cx.world, self.sparkles, state.position, alpha);
    }

    fn end(&mut self, _state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::release_emitter(cx.world, &mut self.sparkles);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::Vec3;
    use runecast_core::{
        services::{Entities, PlayerState},
        CastRequest, Entity, EntityFlags, EntityHandle, Pool, SpellKind,
    };
    use runecast_world::{query, World};

    use crate::{Spellcasting, SpellcastingConfig};

    fn poisoned_npc(world: &mut World, poison: f32) -> EntityHandle {
        world
            .add_entity(Entity {
                template: "rat".to_owned(),
                pos: Vec3::new(0.0, 0.0, 200.0),
                flags: EntityFlags::NPC | EntityFlags::IN_SCENE,
                life: Pool::full(10.0),
                poison,
                ..Entity::default()
            })
            .expect("entity slot")
    }

    #[test]
    fn cure_poison_removes_ten_per_level() {
        let mut world = World::new();
        let rat = poisoned_npc(&mut world, 50.0);
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let mut events = Vec::new();
        let _ = spells
            .cast(
                &mut world,
                CastRequest::new(SpellKind::CurePoison, rat, 3.0).with_target(rat),
                &mut events,
            )
            .expect("registry has room");
        assert_eq!(world.entity(rat).map(|entity| entity.poison), Some(20.0));
    }

    #[test]
    fn cure_poison_never_goes_negative() {
        let mut world = World::new();
        let rat = poisoned_npc(&mut world, 5.0);
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let mut events = Vec::new();
        let _ = spells
            .cast(
                &mut world,
                CastRequest::new(SpellKind::CurePoison, rat, 3.0).with_target(rat),
                &mut events,
            )
            .expect("registry has room");
        assert_eq!(world.entity(rat).map(|entity| entity.poison), Some(0.0));
    }

    #[test]
    fn create_food_fills_the_player() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let mut events = Vec::new();
        let _ = spells
            .cast(
                &mut world,
                CastRequest::new(SpellKind::CreateFood, EntityHandle::PLAYER, 1.0),
                &mut events,
            )
            .expect("registry has room");
        assert_eq!(world.player().hunger, 100.0);
        assert_eq!(query::live_emitter_count(&world), 1);

        spells.tick(&mut world, Duration::from_millis(3500), &mut events);
        assert!(spells.registry().is_empty());
        assert_eq!(query::live_emitter_count(&world), 0, "sparkles stop with the spell");
    }
}
