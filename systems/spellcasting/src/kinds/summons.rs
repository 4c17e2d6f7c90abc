//! Spells that bring something new into the world.

use std::time::Duration;

use glam::Vec3;
use runecast_core::{
    forward_xz, millis, services::ScriptEvent, Cylinder, DynamicLight, EmitterHandle, EmitterKind,
    EntityFlags, EntityHandle, EntitySpawn, EyeballState, LightHandle, ModelDraw, ModelId,
    Orientation, ParticleParams, SoundId, SpellKind,
};

use super::{above, ahead_of_caster, FLICKER_LIFETIME};
use crate::{
    context::SpellContext,
    effects::{self, cue},
    instance::{SpellBehavior, SpellState},
};

const RISE_DEAD_REACH: f32 = 300.0;
const FISSURE_DURATION_MS: u64 = 4300;
const SUMMON_DELAY: Duration = Duration::from_millis(3000);
const SUMMON_EXTENSION: Duration = Duration::from_millis(200);
const UNDEAD_TEMPLATE: &str = "undead_base";

/// Progress of the undead a RiseDead spell tries to raise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum SummonState {
    /// The fissure is still opening.
    #[default]
    Pending,
    /// The undead walks the world and belongs to the spell.
    Spawned(EntityHandle),
    /// The spot was blocked when the fissure opened.
    Failed,
}

/// Opens a fissure and raises an undead servant from it.
#[derive(Debug, Default)]
pub(crate) struct RiseDead {
    summon: SummonState,
    fissure: Option<EmitterHandle>,
    heading: f32,
}

impl RiseDead {
    fn summon_spot(state: &SpellState, cx: &SpellContext<'_>) -> Option<(Vec3, f32)> {
        let (spot, heading) = ahead_of_caster(cx, state.caster, RISE_DEAD_REACH)?;
        let ground = cx.world.find_ground_position(spot)?;
        Some((ground, heading))
    }

    fn raise(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let spot = state.position;
        cx.world.play_sound(SoundId::Electric, Some(spot));
        let blocked = cx
            .world
            .any_entity_in_cylinder(Cylinder::new(spot, 50.0, -200.0), None);
        if blocked {
            cx.world.play_sound(SoundId::MagicFizzle, Some(spot));
            self.summon = SummonState::Failed;
            state.terminate();
            return;
        }

        let Some(undead) = cx.world.spawn_entity(EntitySpawn {
            template: UNDEAD_TEMPLATE.to_owned(),
            pos: spot,
            orientation: Orientation::new(self.heading, 0.0),
            flags: EntityFlags::NPC | EntityFlags::NO_SAVE,
        }) else {
            self.summon = SummonState::Failed;
            state.terminate();
            return;
        };
        if let Some(entity) = cx.entity_mut(undead) {
            entity.summoner = Some(state.caster);
            entity.script_loaded = true;
        }
        for event in [ScriptEvent::Init, ScriptEvent::InitEnd, ScriptEvent::Summoned] {
            cx.world.send_script_event(undead, event);
        }
        self.summon = SummonState::Spawned(undead);
        effects::release_light(cx.world, &mut state.light, Some(Duration::from_millis(800)));
    }
}

impl SpellBehavior for RiseDead {
    fn can_launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) -> bool {
        cx.end_by_caster(state.caster, SpellKind::RiseDead);
        Self::summon_spot(state, cx).is_some()
    }

    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let Some((spot, heading)) = Self::summon_spot(state, cx) else {
            state.terminate();
            return;
        };
        self.heading = heading;
        state.position = spot;
        cue(cx.world, state, SoundId::RiseDeadStart, spot);
        state.has_duration = true;
        state.mana_per_second = 1.2;
        state.duration = Duration::from_millis(FISSURE_DURATION_MS);
        effects::attach_emitter(cx.world, &mut self.fissure, EmitterKind::RiseDeadFissure, spot);
        state.light = cx.world.acquire_light(DynamicLight {
            pos: spot + above(100.0),
            rgb: Vec3::ZERO,
            intensity: 1.3,
            fall_start: 380.0,
            fall_end: 450.0,
            duration: Some(FLICKER_LIFETIME),
        });
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        if self.summon == SummonState::Failed {
            return;
        }
        state.duration += SUMMON_EXTENSION;
        if self.summon == SummonState::Pending {
            let glow = DynamicLight {
                pos: state.position + above(100.0),
                rgb: Vec3::new(0.8, 0.2, 0.2),
                intensity: 3.0,
                fall_start: 400.0,
                fall_end: 500.0,
                duration: Some(Duration::from_millis(800)),
            };
            if let Some(light) = effects::ensure_light(cx.world, &mut state.light, glow) {
                *light = glow;
            }
        }
        let alpha = effects::fade_out(
            state.elapsed,
            Duration::from_millis(FISSURE_DURATION_MS),
            Duration::from_millis(1800),
        );
        effects::update_emitter(cx.world, self.fissure, state.position, alpha);

        if state.elapsed > SUMMON_DELAY && self.summon == SummonState::Pending {
            self.raise(state, cx);
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::release_emitter(cx.world, &mut self.fissure);
        if let SummonState::Spawned(undead) = self.summon {
            let owned = cx.entity(undead).map(|entity| {
                (
                    entity.pos,
                    entity.script_loaded && entity.flags.contains(EntityFlags::NO_SAVE),
                )
            });
            if let Some((pos, still_owned)) = owned.filter(|_| !undead.is_player()) {
                cx.world.play_sound(SoundId::Electric, Some(pos));
                if still_owned {
                    let flash = DynamicLight {
                        pos: pos + above(100.0),
                        rgb: Vec3::new(1.0, 0.8, 0.0),
                        intensity: cx.random(0.7, 2.7),
                        fall_start: 400.0,
                        fall_end: 600.0,
                        duration: Some(Duration::from_millis(600)),
                    };
                    let _ = cx.world.acquire_light(flash);
                    cx.world.destroy_entity(undead);
                }
            }
        }
        effects::release_light(cx.world, &mut state.light, Some(Duration::from_millis(500)));
    }

    fn spawned_entity(&self) -> Option<EntityHandle> {
        match self.summon {
            SummonState::Spawned(undead) => Some(undead),
            SummonState::Pending | SummonState::Failed => None,
        }
    }
}

const EYE_OPENING: Duration = Duration::from_millis(3000);
const EYE_REACH: f32 = 200.0;

/// Detaches the player's eye and sends it floating ahead.
#[derive(Debug, Default)]
pub(crate) struct FlyingEye {
    previous_mouse_look: bool,
    hand_lights: [Option<LightHandle>; 2],
}

impl FlyingEye {
    fn puff(cx: &mut SpellContext<'_>, pos: Vec3) {
        for _ in 0..12 {
            let jitter = Vec3::new(cx.random(-5.0, 5.0), cx.random(-5.0, 5.0), cx.random(-5.0, 5.0));
            let drift = Vec3::new(cx.random(-2.0, 2.0), cx.random(-2.0, 2.0), cx.random(-2.0, 2.0));
            let life = Duration::from_millis(cx.random(2000.0, 6000.0) as u64);
            let smoke = ParticleParams::at(pos + jitter, 28.0, life)
                .moving(drift)
                .tinted(Vec3::new(0.7, 0.7, 1.0));
            if !cx.world.spawn_particle(smoke) {
                break;
            }
        }
    }

    fn hand_light(pos: Vec3) -> DynamicLight {
        DynamicLight {
            pos,
            rgb: Vec3::new(0.7, 0.3, 1.0),
            intensity: 1.3,
            fall_start: 50.0,
            fall_end: 180.0,
            duration: None,
        }
    }
}

impl SpellBehavior for FlyingEye {
    fn can_launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) -> bool {
        if cx.world.player().eyeball.state != EyeballState::Gone {
            return false;
        }
        if cx
            .registry
            .exists_any_instance_for_caster(SpellKind::FlyingEye, state.caster)
        {
            return false;
        }
        state.target_self_if_player();
        state.target == Some(EntityHandle::PLAYER)
    }

    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        if !state.is_restoring() {
            cue(cx.world, state, SoundId::FlyingEyeIn, state.caster_pos);
        }
        state.duration = Duration::from_millis(1_000_000);
        state.has_duration = true;
        state.mana_per_second = 3.2;

        let orientation = cx
            .entity(EntityHandle::PLAYER)
            .map(|player| player.orientation)
            .unwrap_or_default();
        let pos = cx.player_pos() + forward_xz(orientation.heading) * EYE_REACH + Vec3::new(0.0, 50.0, 0.0);
        state.position = pos;

        let player = cx.world.player_mut();
        if state.elapsed > EYE_OPENING {
            player.eyeball.state = EyeballState::Open;
            player.eyeball.size = Vec3::ONE;
        } else {
            player.eyeball.state = EyeballState::Opening;
            player.eyeball.size = Vec3::splat(millis(state.elapsed) / millis(EYE_OPENING));
        }
        player.eyeball.pos = pos;
        player.eyeball.orientation = orientation;
        self.previous_mouse_look = player.mouse_look;
        player.mouse_look = true;
        player.true_mouse_look = true;

        Self::puff(cx, pos);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, dt: Duration) {
        let opening = state.elapsed <= EYE_OPENING;
        let eyeball = {
            let eyeball = &mut cx.world.player_mut().eyeball;
            eyeball.floating = (state.elapsed_ms() * 0.001).sin() * 10.0;
            if opening {
                eyeball.state = EyeballState::Opening;
                eyeball.size = Vec3::splat(millis(state.elapsed) / millis(EYE_OPENING));
                eyeball.orientation.heading += millis(dt) * 0.6;
            } else {
                eyeball.state = EyeballState::Open;
                eyeball.size = Vec3::ONE;
            }
            *eyeball
        };
        state.position = eyeball.pos;
        cx.world.draw_model(
            ModelDraw::new(ModelId::Eyeball, eyeball.pos + Vec3::new(0.0, eyeball.floating, 0.0))
                .oriented(eyeball.orientation)
                .scaled(eyeball.size),
        );

        let hands = cx
            .entity(EntityHandle::PLAYER)
            .map_or([None, None], |player| [player.hand, player.off_hand]);
        for (slot, hand) in self.hand_lights.iter_mut().zip(hands) {
            let Some(hand) = hand else {
                continue;
            };
            if let Some(light) = effects::ensure_light(cx.world, slot, Self::hand_light(hand)) {
                light.pos = hand;
            }
            for _ in 0..2 {
                let jitter = Vec3::new(cx.random(-1.0, 1.0), cx.random(-1.0, 1.0), cx.random(-1.0, 1.0));
                let drift = Vec3::new(0.1, 0.0, 0.1)
                    + Vec3::new(-0.2, -2.2, -0.2) * Vec3::new(cx.unit(), cx.unit(), cx.unit());
                let shade = Vec3::new(0.7, 0.3, 1.0) - Vec3::splat(0.1) * cx.unit();
                let life = Duration::from_millis(cx.random(1500.0, 3500.0) as u64);
                let wisp = ParticleParams::at(hand + jitter, 5.0, life)
                    .moving(drift)
                    .tinted(shade);
                if !cx.world.spawn_particle(wisp) {
                    break;
                }
            }
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let caster_pos = cx.entity_pos(state.caster).unwrap_or(state.caster_pos);
        cx.world.play_sound(SoundId::MagicFizzle, Some(caster_pos));
        cue(cx.world, state, SoundId::FlyingEyeOut, caster_pos);

        let pos = {
            let player = cx.world.player_mut();
            player.eyeball.state = EyeballState::Closing;
            player.mouse_look = self.previous_mouse_look;
            player.eyeball.pos
        };
        Self::puff(cx, pos);
        for slot in &mut self.hand_lights {
            effects::release_light(cx.world, slot, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::Vec3;
    use runecast_core::{
        services::{Entities, PlayerState, ScriptEvent},
        CastRequest, Entity, EntityFlags, EntityHandle, EyeballState, Pool, SoundId, SpellKind,
    };
    use runecast_world::{query, World};

    use crate::{CastOutcome, Spellcasting, SpellcastingConfig};

    fn raise_dead(spells: &mut Spellcasting, world: &mut World) -> runecast_core::SpellHandle {
        let mut events = Vec::new();
        match spells
            .cast(
                world,
                CastRequest::new(SpellKind::RiseDead, EntityHandle::PLAYER, 6.0),
                &mut events,
            )
            .expect("registry has room")
        {
            CastOutcome::Launched(handle) => handle,
            CastOutcome::Vetoed => panic!("ground in front of the player"),
        }
    }

    #[test]
    fn rise_dead_raises_an_owned_undead() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let spell = raise_dead(&mut spells, &mut world);

        let mut events = Vec::new();
        for _ in 0..40 {
            spells.tick(&mut world, Duration::from_millis(100), &mut events);
        }
        let undead = spells
            .registry()
            .get(spell)
            .and_then(|instance| instance.spawned_entity())
            .expect("undead raised after the fissure opened");
        let entity = world.entity(undead).expect("undead is alive");
        assert!(entity.is_npc());
        assert_eq!(entity.summoner, Some(EntityHandle::PLAYER));
        assert!(query::script_events(&world).contains(&(undead, ScriptEvent::Summoned)));
        assert!(
            spells.registry().get(spell).map(|instance| instance.state().remaining())
                > Some(Duration::ZERO),
            "spell keeps extending itself"
        );

        let _ = spells.end_spell(&mut world, spell, &mut events);
        assert!(!world.is_valid(undead), "owned undead leaves with the spell");
    }

    #[test]
    fn released_undead_survives_the_spell() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let spell = raise_dead(&mut spells, &mut world);
        let mut events = Vec::new();
        for _ in 0..31 {
            spells.tick(&mut world, Duration::from_millis(100), &mut events);
        }
        let undead = spells
            .registry()
            .get(spell)
            .and_then(|instance| instance.spawned_entity())
            .expect("undead raised");
        if let Some(entity) = world.entity_mut(undead) {
            entity.flags.remove(EntityFlags::NO_SAVE);
        }
        let _ = spells.end_spell(&mut world, spell, &mut events);
        assert!(world.is_valid(undead));
    }

    #[test]
    fn blocked_fissure_fizzles() {
        let mut world = World::new();
        let _ = world
            .add_entity(Entity {
                template: "crate".to_owned(),
                pos: Vec3::new(0.0, 0.0, 300.0),
                flags: EntityFlags::FIX | EntityFlags::IN_SCENE,
                life: Pool::full(10.0),
                height: -100.0,
                ..Entity::default()
            })
            .expect("entity slot");
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let spell = raise_dead(&mut spells, &mut world);
        let mut events = Vec::new();
        for _ in 0..31 {
            spells.tick(&mut world, Duration::from_millis(100), &mut events);
        }
        assert!(!spells.registry().contains(spell), "failed summon ends the spell");
    }

    #[test]
    fn flying_eye_opens_then_restores_mouse_look() {
        let mut world = World::new();
        world.player_mut().mouse_look = false;
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let mut events = Vec::new();
        let outcome = spells
            .cast(
                &mut world,
                CastRequest::new(SpellKind::FlyingEye, EntityHandle::PLAYER, 7.0),
                &mut events,
            )
            .expect("registry has room");
        let CastOutcome::Launched(eye) = outcome else {
            panic!("eye should launch");
        };
        assert!(world.player().mouse_look);
        assert_eq!(world.player().eyeball.state, EyeballState::Opening);

        spells.tick(&mut world, Duration::from_millis(3100), &mut events);
        assert_eq!(world.player().eyeball.state, EyeballState::Open);

        let again = spells
            .cast(
                &mut world,
                CastRequest::new(SpellKind::FlyingEye, EntityHandle::PLAYER, 7.0),
                &mut events,
            )
            .expect("registry has room");
        assert_eq!(again, CastOutcome::Vetoed, "only one eye at a time");

        assert!(spells.end_spell(&mut world, eye, &mut events));
        assert!(!world.player().mouse_look, "previous toggle restored");
        assert_eq!(world.player().eyeball.state, EyeballState::Closing);
    }

    #[test]
    fn restored_flying_eye_is_already_open() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let mut events = Vec::new();
        let outcome = spells
            .cast(
                &mut world,
                CastRequest::new(SpellKind::FlyingEye, EntityHandle::PLAYER, 7.0)
                    .restore_at(Duration::from_millis(4000)),
                &mut events,
            )
            .expect("registry has room");
        let CastOutcome::Launched(eye) = outcome else {
            panic!("restored eye should launch");
        };

        assert_eq!(world.player().eyeball.state, EyeballState::Open);
        assert_eq!(world.player().eyeball.size, Vec3::ONE);
        assert!(!query::played_cues(&world)
            .iter()
            .any(|played| played.cue == SoundId::FlyingEyeIn));
        let remaining = spells
            .registry()
            .get(eye)
            .map(|instance| instance.state().remaining());
        assert_eq!(remaining, Some(Duration::from_millis(1_000_000 - 4000)));

        spells.tick(&mut world, Duration::from_millis(16), &mut events);
        assert_eq!(world.player().eyeball.state, EyeballState::Open);
        assert_eq!(world.player().eyeball.size, Vec3::ONE);
    }
}
