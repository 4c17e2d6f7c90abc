//! Lasting enchantments placed on a single creature.

use std::{f32::consts::TAU, time::Duration};

use glam::Vec3;
use runecast_core::{
    front_position, DynamicLight, EntityFlags, EntityHandle, Halo, ModelDraw, ModelId,
    Orientation, ParticleParams, SoundId, SpellKind,
};

use super::{above, FLICKER_LIFETIME};
use crate::{
    context::SpellContext,
    effects::{self, cue, start_loop},
    instance::{SpellBehavior, SpellState},
};

const HALO_RADIUS: f32 = 45.0;
const ARMOR_HALO: Vec3 = Vec3::new(0.5, 0.5, 0.25);
const LOWER_ARMOR_HALO: Vec3 = Vec3::new(1.0, 0.05, 0.0);

/// Durations used while the player sustains a spell, effectively until cancelled.
const PLAYER_ARMOR_MS: u64 = 20_000_000;
const PLAYER_SPEED_MS: u64 = 200_000_000;
const PLAYER_SLOW_DOWN_MS: u64 = 10_000_000;
const PLAYER_LEVITATE_MS: u64 = 200_000_000;

const LEVITATE_BASE_RADIUS: f32 = 50.0;
const LEVITATE_LIFT: f32 = 150.0;

fn target_pos(state: &SpellState, cx: &SpellContext<'_>) -> Option<Vec3> {
    cx.entity_pos(state.target_or_caster())
}

fn restore_native_halo(cx: &mut SpellContext<'_>, handle: EntityHandle) {
    if let Some(entity) = cx.entity_mut(handle) {
        entity.halo = entity.native_halo;
    }
}

/// Lets the player see traps around them.
#[derive(Debug)]
pub(crate) struct DetectTrap;

impl SpellBehavior for DetectTrap {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cx.end_by_caster(state.caster, SpellKind::DetectTrap);
        if state.caster_is_player() {
            state.target = Some(state.caster);
            if state.plays_sound() {
                cx.world.play_sound(SoundId::Interface, None);
            }
            state.sound = start_loop(cx.world, state, SoundId::DetectTrapLoop, state.caster_pos, 1.0);
        }
        state.duration = Duration::from_millis(60_000);
        state.mana_per_second = 0.4;
        state.has_duration = true;
        state.add_target(state.target_or_caster());
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        if !state.caster_is_player() {
            return;
        }
        let Some(player) = cx.entity(EntityHandle::PLAYER) else {
            return;
        };
        state.position = front_position(player.pos, player.orientation.heading);
        effects::follow_loop(cx.world, state.sound, state.position);
    }
}

/// Protective halo that hardens the target's skin.
#[derive(Debug)]
pub(crate) struct Armor;

impl Armor {
    fn apply_halo(state: &SpellState, cx: &mut SpellContext<'_>) {
        if let Some(entity) = cx.entity_mut(state.target_or_caster()) {
            entity.halo = Halo::glowing(ARMOR_HALO, HALO_RADIUS);
        }
    }
}

impl SpellBehavior for Armor {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let requested = state.target_or_caster();
        cx.end_by_target(requested, SpellKind::Armor);
        cx.end_by_target(requested, SpellKind::LowerArmor);
        state.target_self_if_player();
        let target = state.target_or_caster();
        if target != requested {
            cx.end_by_target(target, SpellKind::Armor);
            cx.end_by_target(target, SpellKind::LowerArmor);
        }
        cx.end_by_caster(state.caster, SpellKind::LowerArmor);
        cx.end_by_caster(state.caster, SpellKind::FireProtection);
        cx.end_by_caster(state.caster, SpellKind::ColdProtection);

        let pos = target_pos(state, cx).unwrap_or(state.caster_pos);
        state.position = pos;
        cue(cx.world, state, SoundId::ArmorStart, pos);
        state.sound = start_loop(cx.world, state, SoundId::ArmorLoop, pos, 1.0);

        state.duration = if state.caster_is_player() {
            Duration::from_millis(PLAYER_ARMOR_MS)
        } else {
            state.duration_or(20_000)
        };
        state.has_duration = true;
        state.mana_per_second = 0.2 * state.level;
        Self::apply_halo(state, cx);
        state.add_target(target);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        Self::apply_halo(state, cx);
        if let Some(pos) = target_pos(state, cx) {
            state.position = pos;
            effects::follow_loop(cx.world, state.sound, pos);
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::stop_loop(cx.world, &mut state.sound);
        cx.world.play_sound(SoundId::ArmorEnd, Some(state.position));
        restore_native_halo(cx, state.target_or_caster());
    }
}

/// Whether a lower-armor spell put the halo on its target.
///
/// The spell starts out `Unknown` and only learns the answer once it has a
/// valid target. `Unknown` reverts the halo on end just like `Claimed`; it is
/// not settled whether that is the intended default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum HaloClaim {
    #[default]
    Unknown,
    Claimed,
    Untouched,
}

/// Curse halo that softens the target's skin.
#[derive(Debug, Default)]
pub(crate) struct LowerArmor {
    claim: HaloClaim,
}

impl LowerArmor {
    fn claim_halo(&mut self, state: &SpellState, cx: &mut SpellContext<'_>) -> bool {
        let Some(entity) = cx.entity_mut(state.target_or_caster()) else {
            return false;
        };
        if entity.halo.active {
            return false;
        }
        entity.halo = Halo::glowing(LOWER_ARMOR_HALO, HALO_RADIUS);
        self.claim = HaloClaim::Claimed;
        true
    }
}

impl SpellBehavior for LowerArmor {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let target = state.target_or_caster();
        cx.end_by_target(target, SpellKind::LowerArmor);
        cx.end_by_caster(state.caster, SpellKind::Armor);
        cx.end_by_target(target, SpellKind::Armor);
        cx.end_by_caster(state.caster, SpellKind::FireProtection);
        cx.end_by_caster(state.caster, SpellKind::ColdProtection);

        let pos = target_pos(state, cx).unwrap_or(state.caster_pos);
        state.position = pos;
        cue(cx.world, state, SoundId::LowerArmor, pos);
        state.sound = start_loop(cx.world, state, SoundId::LowerArmorLoop, pos, 1.0);

        state.duration = if state.caster_is_player() {
            Duration::from_millis(PLAYER_ARMOR_MS)
        } else {
            state.duration_or(20_000)
        };
        state.has_duration = true;
        state.mana_per_second = 0.2 * state.level;

        if cx.world.is_valid(target) && !self.claim_halo(state, cx) {
            self.claim = HaloClaim::Untouched;
        }
        state.add_target(target);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        let _ = self.claim_halo(state, cx);
        if let Some(pos) = target_pos(state, cx) {
            state.position = pos;
            effects::follow_loop(cx.world, state.sound, pos);
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cx.world.play_sound(SoundId::LowerArmorEnd, None);
        if self.claim != HaloClaim::Untouched {
            restore_native_halo(cx, state.target_or_caster());
        }
    }
}

#[derive(Debug)]
struct SpeedTrail {
    bone: usize,
    length: f32,
    size: f32,
    shade: f32,
}

/// Hastens the target, leaving ribbons behind its limbs.
#[derive(Debug, Default)]
pub(crate) struct Speed {
    trails: Vec<SpeedTrail>,
}

impl SpellBehavior for Speed {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        state.has_duration = true;
        state.mana_per_second = 2.0;
        state.target_self_if_player();
        let target = state.target_or_caster();
        let pos = target_pos(state, cx).unwrap_or(state.caster_pos);
        state.position = pos;
        cue(cx.world, state, SoundId::SpeedStart, pos);
        if target.is_player() {
            state.sound = start_loop(cx.world, state, SoundId::SpeedLoop, pos, 1.0);
        }
        state.duration = if state.caster_is_player() {
            Duration::from_millis(PLAYER_SPEED_MS)
        } else {
            state.duration_or(20_000)
        };

        let bones = cx
            .entity(target)
            .map_or(0, |entity| entity.bone_groups.len());
        for bone in (0..bones).step_by(2) {
            let shade = cx.random(0.05, 0.1);
            let size = cx.random(1.0, 1.5);
            let length = cx.random(130.0, 260.0).floor();
            self.trails.push(SpeedTrail {
                bone,
                length,
                size,
                shade,
            });
        }
        state.add_target(target);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        let Some(entity) = cx.entity(state.target_or_caster()) else {
            return;
        };
        let pos = entity.pos;
        let heads: Vec<(Vec3, &SpeedTrail)> = self
            .trails
            .iter()
            .filter_map(|trail| {
                entity
                    .bone_groups
                    .get(trail.bone)
                    .map(|head| (*head, trail))
            })
            .collect();
        for (head, trail) in heads {
            cx.world.draw_trail(runecast_core::TrailParams {
                head,
                length: trail.length,
                size: trail.size,
                rgb: Vec3::splat(trail.shade),
            });
        }
        state.position = pos;
        if state.caster_is_player() {
            effects::follow_loop(cx.world, state.sound, pos);
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::stop_loop(cx.world, &mut state.sound);
        cx.world.play_sound(SoundId::SpeedEnd, Some(state.position));
        self.trails.clear();
    }
}

/// Slows the target; a second cast on the same target lifts it instead.
#[derive(Debug)]
pub(crate) struct SlowDown;

impl SpellBehavior for SlowDown {
    fn can_launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) -> bool {
        let existing = cx
            .registry
            .spell_on_target(state.target_or_caster(), SpellKind::SlowDown);
        match existing {
            Some(handle) => {
                let _ = cx.end_spell(handle);
                false
            }
            None => true,
        }
    }

    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let pos = target_pos(state, cx).unwrap_or(state.caster_pos);
        state.position = pos;
        cue(cx.world, state, SoundId::SlowDown, pos);
        state.duration = if state.caster_is_player() {
            Duration::from_millis(PLAYER_SLOW_DOWN_MS)
        } else {
            state.duration_or(10_000)
        };
        state.has_duration = true;
        state.mana_per_second = 1.2;
        state.add_target(state.target_or_caster());
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        if let Some(pos) = target_pos(state, cx) {
            state.position = pos;
        }
    }

    fn end(&mut self, _state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cx.world.play_sound(SoundId::SlowDownEnd, None);
    }
}

/// Lifts the target off the ground.
#[derive(Debug, Default)]
pub(crate) struct Levitate;

impl Levitate {
    fn anchor(state: &SpellState, cx: &SpellContext<'_>) -> Option<Vec3> {
        if state.target_or_caster().is_player() {
            Some(cx.player_pos() + Vec3::new(0.0, LEVITATE_LIFT, 0.0))
        } else {
            target_pos(state, cx)
        }
    }

    fn spawn_dust(state: &SpellState, cx: &mut SpellContext<'_>) {
        let angle = cx.random(0.0, TAU);
        let rim = Vec3::new(angle.cos(), 0.0, angle.sin());
        let outward = cx.random(5.0, 10.0);
        let rise = cx.random(0.0, 3.0);
        let size = cx.random(30.0, 60.0);
        let particle = ParticleParams::at(
            state.position + rim * LEVITATE_BASE_RADIUS,
            size,
            Duration::from_millis(3000),
        )
        .moving(rim * outward + Vec3::new(0.0, rise, 0.0));
        let _ = cx.world.spawn_particle(particle);
    }
}

impl SpellBehavior for Levitate {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cx.end_by_caster(state.caster, SpellKind::Levitate);
        state.target_self_if_player();
        let target = state.target_or_caster();
        let target_feet = target_pos(state, cx).unwrap_or(state.caster_pos);
        cue(cx.world, state, SoundId::LevitateStart, target_feet);

        state.duration = state.duration_or(2_000_000_000);
        state.has_duration = true;
        state.mana_per_second = 1.0;
        if target.is_player() {
            state.duration = Duration::from_millis(PLAYER_LEVITATE_MS);
            cx.world.player_mut().levitating = true;
        }
        state.position = Self::anchor(state, cx).unwrap_or(target_feet);
        state.sound = start_loop(cx.world, state, SoundId::LevitateLoop, target_feet, 0.7);
        state.add_target(target);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        if let Some(anchor) = Self::anchor(state, cx) {
            state.position = anchor;
        }
        if state.target_or_caster().is_player() {
            cx.world.player_mut().levitating = true;
        }

        let ramp = (state.elapsed_ms() / 1000.0).min(1.0);
        let dust = if ramp < 1.0 { 3 } else { 10 };
        cx.world.draw_model(
            ModelDraw::new(ModelId::LevitateCone, state.position)
                .scaled(Vec3::new(1.0, ramp, 1.0)),
        );
        cx.world.draw_model(
            ModelDraw::new(ModelId::LevitateCone, state.position)
                .scaled(Vec3::new(1.5, 0.5 * ramp, 1.5)),
        );
        for _ in 0..dust {
            Self::spawn_dust(state, cx);
        }
        if let Some(pos) = target_pos(state, cx) {
            effects::follow_loop(cx.world, state.sound, pos);
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::stop_loop(cx.world, &mut state.sound);
        let pos = target_pos(state, cx).unwrap_or(state.position);
        cx.world.play_sound(SoundId::LevitateEnd, Some(pos));
        if state.target_or_caster().is_player() {
            cx.world.player_mut().levitating = false;
        }
    }
}

fn repel_light(pos: Vec3) -> DynamicLight {
    DynamicLight {
        pos: pos + above(50.0),
        rgb: Vec3::new(0.8, 0.8, 1.0),
        intensity: 2.3,
        fall_start: 150.0,
        fall_end: 350.0,
        duration: Some(FLICKER_LIFETIME),
    }
}

/// Ring of light that keeps undead at bay.
#[derive(Debug, Default)]
pub(crate) struct RepelUndead {
    heading: f32,
}

impl SpellBehavior for RepelUndead {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cx.end_by_caster(state.caster, SpellKind::RepelUndead);
        state.target_self_if_player();
        let target = state.target_or_caster();
        let pos = target_pos(state, cx).unwrap_or(state.caster_pos);
        cue(cx.world, state, SoundId::RepelUndead, pos);
        if target.is_player() {
            state.sound = start_loop(cx.world, state, SoundId::RepelUndeadLoop, pos, 1.0);
        }
        state.duration = state.duration_or(20_000_000);
        state.has_duration = true;
        state.mana_per_second = 1.0;
        state.position = cx.player_pos();
        self.heading = 0.0;
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        let Some(entity) = cx.entity(state.target_or_caster()) else {
            return;
        };
        state.position = entity.pos;
        self.heading = entity.orientation.heading;

        let pulse = (1.0 + (state.elapsed_ms() / 1000.0).sin()) * 0.5 + 1.1;
        cx.world.draw_model(
            ModelDraw::new(ModelId::RepelRing, state.position + above(5.0))
                .oriented(Orientation::new(self.heading, 0.0))
                .scaled(Vec3::splat(pulse))
                .tinted(Vec3::new(0.6, 0.6, 0.8)),
        );

        // Samples a flat disk around the feet. Whether a full sphere was
        // intended instead is still open.
        let radius = pulse * 100.0;
        for _ in 0..4 {
            let angle = cx.random(0.0, TAU);
            let distance = radius * cx.unit().sqrt();
            let offset = Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance);
            let velocity = Vec3::new(
                cx.random(-0.8, 0.8),
                cx.random(-4.0, 0.0),
                cx.random(-0.8, 0.8),
            );
            let lifetime = Duration::from_millis(cx.random(2600.0, 3200.0) as u64);
            let particle = ParticleParams::at(state.position + offset, 0.3, lifetime)
                .moving(velocity)
                .tinted(Vec3::new(0.4, 0.4, 0.6));
            if !cx.world.spawn_particle(particle) {
                break;
            }
        }

        if let Some(light) = effects::ensure_light(cx.world, &mut state.light, repel_light(state.position)) {
            light.pos = state.position + above(50.0);
        }
        if state.target_or_caster().is_player() {
            effects::follow_loop(cx.world, state.sound, state.position);
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::stop_loop(cx.world, &mut state.sound);
        effects::release_light(cx.world, &mut state.light, Some(Duration::from_millis(500)));
    }
}

/// Shared behaviour of the protection, invisibility and drain auras.
#[derive(Debug)]
pub(crate) struct SustainedAura;

impl SustainedAura {
    /// Kinds a new aura ends, as `(on caster, on target)`.
    fn cancels(kind: SpellKind) -> (&'static [SpellKind], &'static [SpellKind]) {
        const NONE: &[SpellKind] = &[];
        const FIRE_ON_CASTER: &[SpellKind] =
            &[SpellKind::Armor, SpellKind::LowerArmor, SpellKind::ColdProtection];
        const COLD_ON_CASTER: &[SpellKind] =
            &[SpellKind::Armor, SpellKind::LowerArmor, SpellKind::FireProtection];
        const LIFE_ON_CASTER: &[SpellKind] =
            &[SpellKind::Harm, SpellKind::ManaDrain, SpellKind::LifeDrain];
        const MANA_ON_CASTER: &[SpellKind] =
            &[SpellKind::Harm, SpellKind::LifeDrain, SpellKind::ManaDrain];
        const FIRE_ON_TARGET: &[SpellKind] = &[SpellKind::FireProtection];
        const COLD_ON_TARGET: &[SpellKind] = &[SpellKind::ColdProtection];
        const INVISIBILITY_ON_TARGET: &[SpellKind] = &[SpellKind::Invisibility];
        match kind {
            SpellKind::FireProtection => (FIRE_ON_CASTER, FIRE_ON_TARGET),
            SpellKind::ColdProtection => (COLD_ON_CASTER, COLD_ON_TARGET),
            SpellKind::LifeDrain => (LIFE_ON_CASTER, NONE),
            SpellKind::ManaDrain => (MANA_ON_CASTER, NONE),
            SpellKind::Invisibility => (NONE, INVISIBILITY_ON_TARGET),
            _ => (NONE, NONE),
        }
    }

    fn set_invisible(state: &SpellState, cx: &mut SpellContext<'_>, invisible: bool) {
        if state.kind != SpellKind::Invisibility {
            return;
        }
        if let Some(entity) = cx.entity_mut(state.target_or_caster()) {
            entity.flags.set(EntityFlags::INVISIBLE, invisible);
        }
    }
}

impl SpellBehavior for SustainedAura {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        state.target_self_if_player();
        let target = state.target_or_caster();
        let (on_caster, on_target) = Self::cancels(state.kind);
        for kind in on_caster {
            cx.end_by_caster(state.caster, *kind);
        }
        for kind in on_target {
            cx.end_by_target(target, *kind);
        }

        let pos = target_pos(state, cx).unwrap_or(state.caster_pos);
        state.position = pos;
        cue(cx.world, state, SoundId::AuraStart, pos);
        state.sound = start_loop(cx.world, state, SoundId::AuraLoop, pos, 1.0);
        state.duration = if state.caster_is_player() {
            Duration::from_millis(PLAYER_ARMOR_MS)
        } else {
            state.duration_or(20_000)
        };
        state.has_duration = true;
        state.mana_per_second = 1.0;
        Self::set_invisible(state, cx, true);
        state.add_target(target);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        Self::set_invisible(state, cx, true);
        if let Some(pos) = target_pos(state, cx) {
            state.position = pos;
            effects::follow_loop(cx.world, state.sound, pos);
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::stop_loop(cx.world, &mut state.sound);
        cx.world.play_sound(SoundId::AuraEnd, Some(state.position));
        Self::set_invisible(state, cx, false);
    }
}
