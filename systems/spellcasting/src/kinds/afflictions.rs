//! Hostile spells aimed at other creatures.

use std::{f32::consts::TAU, time::Duration};

use glam::Vec3;
use runecast_core::{
    direction_from, millis, DamageFlags, DamageHandle, DamageParams, DamageType, DynamicLight,
    Entity, EntityFlags, EntityHandle, ModelDraw, ModelId, Orientation, ParticleParams, SoundId,
    SpellKind,
};

use super::{above, FLICKER_LIFETIME};
use crate::{
    context::SpellContext,
    effects::{self, cue, start_loop},
    instance::{SpellBehavior, SpellState},
};

fn has_live_target(state: &SpellState, cx: &SpellContext<'_>) -> bool {
    state
        .target
        .is_some_and(|target| cx.world.is_valid(target))
}

const HARM_LIGHT_RELEASE: Duration = Duration::from_millis(600);
const CABAL_TINTS: [(f32, Vec3); 4] = [
    (0.0, Vec3::new(0.8, 0.4, 0.0)),
    (30.0, Vec3::new(0.5, 3.0, 0.0)),
    (60.0, Vec3::new(0.25, 0.1, 0.0)),
    (120.0, Vec3::new(0.15, 0.1, 0.0)),
];

/// Burning aura that hurts everything close to the caster.
#[derive(Debug, Default)]
pub(crate) struct Harm {
    zone: Option<DamageHandle>,
    spin: f32,
}

impl SpellBehavior for Harm {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cue(cx.world, state, SoundId::Harm, state.caster_pos);
        state.sound = cx
            .world
            .play_looped(SoundId::MagicalShield, state.caster_pos, 1.0);
        cx.end_by_caster(state.caster, SpellKind::LifeDrain);
        cx.end_by_caster(state.caster, SpellKind::ManaDrain);

        state.duration = state.duration_or(6_000_000);
        state.has_duration = true;
        state.mana_per_second = 0.4;

        self.zone = cx.world.create_damage_zone(
            DamageParams::new(
                state.caster_pos,
                150.0,
                4.0,
                DamageType::FAKEFIRE | DamageType::MAGICAL,
            )
            .from_source(state.caster)
            .with_flags(
                DamageFlags::DONT_HURT_SOURCE
                    | DamageFlags::FOLLOW_SOURCE
                    | DamageFlags::ADD_VISUAL_FX,
            )
            .lasting(state.duration),
        );
        state.light = cx.world.acquire_light(DynamicLight {
            pos: state.caster_pos,
            rgb: Vec3::new(1.0, 0.0, 0.0),
            intensity: 2.3,
            fall_start: 500.0,
            fall_end: 700.0,
            duration: None,
        });
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, dt: Duration) {
        let Some((pos, height)) = cx
            .entity(state.caster)
            .map(|caster| (caster.pos, caster.height))
        else {
            return;
        };
        let reach = if state.caster_is_player() {
            90.0
        } else {
            (height * 0.5).abs() + 30.0
        };
        let reference = pos + above(reach);
        state.position = reference;

        let clock = state.elapsed_ms();
        let pulse = (clock / 800.0 + reach.to_radians()).sin();
        let (red, green) = (cx.random(0.8, 1.0), cx.random(0.6, 0.8));
        if let Some(light) = effects::light_mut(cx.world, state.light) {
            light.pos = reference;
            light.rgb = Vec3::new(red, green, 0.0);
        }

        self.spin += millis(dt) * 0.1;
        let mut cabal = reference;
        for (lag, tint) in CABAL_TINTS {
            let bob = ((clock - lag) / 800.0).sin() * reach;
            cabal = reference + Vec3::new(0.0, bob, 0.0);
            cx.world.draw_model(
                ModelDraw::new(ModelId::Cabal, cabal)
                    .oriented(Orientation::new(self.spin, 0.0))
                    .scaled(Vec3::splat(pulse))
                    .tinted(tint),
            );
        }
        effects::follow_loop(cx.world, state.sound, cabal);
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        if let Some(zone) = self.zone.take() {
            cx.world.end_damage_zone(zone);
        }
        effects::release_light(cx.world, &mut state.light, Some(HARM_LIGHT_RELEASE));
        effects::stop_loop(cx.world, &mut state.sound);
    }
}

const DISPELL_RANGE: f32 = 1000.0;

/// Strips invisibility from creatures near the caster.
#[derive(Debug)]
pub(crate) struct DispellIllusion;

impl SpellBehavior for DispellIllusion {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cue(cx.world, state, SoundId::DispellIllusion, state.caster_pos);
        state.duration = Duration::from_millis(1000);

        let Some(origin) = cx.entity_pos(state.caster) else {
            return;
        };
        let revealed: Vec<_> = cx
            .registry
            .iter()
            .filter(|(_, spell)| spell.kind() == SpellKind::Invisibility)
            .filter(|(_, spell)| spell.state().level() <= state.level)
            .filter_map(|(handle, spell)| {
                let target = spell.state().target().filter(|target| *target != state.caster)?;
                Some((handle, target))
            })
            .collect();
        for (handle, target) in revealed {
            let close = cx
                .entity_pos(target)
                .is_some_and(|pos| pos.distance(origin) < DISPELL_RANGE);
            if close {
                let _ = cx.end_spell(handle);
            }
        }
    }
}

/// Freezes the target in place.
#[derive(Debug)]
pub(crate) struct Paralyse;

impl Paralyse {
    fn resistance(state: &SpellState, cx: &SpellContext<'_>, target: EntityHandle) -> f32 {
        if target.is_player() {
            let player = cx.world.player();
            if state.level <= player.level {
                return player.resist_magic;
            }
            return 0.0;
        }
        cx.entity(target)
            .filter(|entity| entity.is_npc())
            .map_or(0.0, |entity| entity.resist_magic)
    }
}

impl SpellBehavior for Paralyse {
    fn can_launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) -> bool {
        has_live_target(state, cx)
    }

    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let target = state.target_or_caster();
        let pos = cx.entity_pos(target).unwrap_or(state.caster_pos);
        state.position = pos;
        cue(cx.world, state, SoundId::Paralyse, pos);

        state.duration = state.duration_or(5000);
        let resist = Self::resistance(state, cx, target);
        if cx.random(0.0, 100.0) < resist {
            let factor = (1.0 - resist * 0.005).max(0.5);
            state.set_duration_ms(millis(state.duration) * factor);
        }

        if let Some(entity) = cx.entity_mut(target) {
            entity.flags.insert(EntityFlags::FREEZE_SCRIPT);
        }
        state.add_target(target);
        cx.world.interrupt_casting(target);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        if let Some(pos) = cx.entity_pos(state.target_or_caster()) {
            state.position = pos;
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        if let Some(entity) = cx.entity_mut(state.target_or_caster()) {
            entity.flags.remove(EntityFlags::FREEZE_SCRIPT);
        }
        cue(cx.world, state, SoundId::ParalyseEnd, state.position);
    }
}

const BOLT_REACH: f32 = 500.0;
const STRIKE_INTERVAL: Duration = Duration::from_millis(100);
const STRIKE_RADIUS: f32 = 40.0;

fn chest(entity: &Entity) -> Vec3 {
    entity.chest.unwrap_or(entity.pos + above(120.0))
}

/// Arc of lightning thrown from the caster's chest.
#[derive(Debug, Default)]
pub(crate) struct LightningStrike {
    next_strike: Duration,
    tip: Vec3,
}

impl LightningStrike {
    /// Origin of the bolt and the point it reaches.
    fn aim(state: &SpellState, cx: &SpellContext<'_>) -> Option<(Vec3, Vec3)> {
        let caster = cx.entity(state.caster)?;
        let from = caster.chest_or_pos();
        let free_aim = |heading: f32, elevation: f32| from + direction_from(elevation, heading) * BOLT_REACH;
        if state.caster_is_player() {
            let facing = caster.orientation;
            return Some((from, free_aim(facing.heading, facing.elevation)));
        }
        let foe = caster
            .target
            .filter(|target| *target != state.caster)
            .and_then(|target| cx.entity(target))
            .or_else(|| state.target.and_then(|target| cx.entity(target)));
        let to = match foe {
            Some(foe) => {
                let aim = chest(foe);
                let reach = from.distance(aim).min(BOLT_REACH);
                from + (aim - from).normalize_or_zero() * reach
            }
            None => free_aim(caster.orientation.heading, caster.orientation.elevation),
        };
        Some((from, to))
    }
}

impl SpellBehavior for LightningStrike {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        state.set_duration_ms(500.0 * state.level);
        self.next_strike = state.elapsed + STRIKE_INTERVAL;
        self.tip = state.caster_pos;
        cue(cx.world, state, SoundId::LightningStart, state.caster_pos);
        state.sound = start_loop(cx.world, state, SoundId::LightningLoop, state.caster_pos, 1.0);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        let Some((from, to)) = Self::aim(state, cx) else {
            return;
        };
        state.caster_pos = from;
        state.position = from;
        self.tip = to;
        let flicker = cx.random(0.8, 1.0);
        cx.world.draw_bolt(from, to, flicker);

        while state.elapsed >= self.next_strike {
            self.next_strike += STRIKE_INTERVAL;
            cx.world.apply_spheric_damage(
                DamageParams::new(
                    to,
                    STRIKE_RADIUS,
                    0.25 * state.level,
                    DamageType::LIGHTNING | DamageType::MAGICAL,
                )
                .from_source(state.caster)
                .with_flags(DamageFlags::DONT_HURT_SOURCE),
            );
        }
        if let Some(pos) = cx.entity_pos(state.caster) {
            effects::follow_loop(cx.world, state.sound, pos);
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let pos = cx.entity_pos(state.caster).unwrap_or(state.caster_pos);
        cx.world.play_sound(SoundId::Electric, Some(pos));
        effects::stop_loop(cx.world, &mut state.sound);
        cue(cx.world, state, SoundId::LightningEnd, pos);
    }
}

const CONFUSE_BASE: Vec3 = Vec3::new(0.4, 0.2, 0.4);
const CONFUSE_SPREAD: Vec3 = Vec3::new(0.4, 0.6, 0.4);

/// Butterflies circling the target's head scramble its judgement.
#[derive(Debug)]
pub(crate) struct Confuse;

impl Confuse {
    fn head(state: &SpellState, cx: &SpellContext<'_>) -> Option<Vec3> {
        let target = state.target_or_caster();
        let entity = cx.entity(target)?;
        if target.is_player() {
            Some(entity.pos)
        } else {
            Some(entity.pos + Vec3::new(0.0, entity.height - 30.0, 0.0))
        }
    }

    /// Draws colours until two neighbouring channels sit close together.
    fn sparkle_colour(cx: &mut SpellContext<'_>) -> Vec3 {
        loop {
            let c = CONFUSE_BASE + Vec3::new(cx.unit(), cx.unit(), cx.unit()) * CONFUSE_SPREAD;
            if (c.x - c.y).abs() <= 0.3 || (c.y - c.z).abs() <= 0.3 {
                return c * 0.8;
            }
        }
    }
}

impl SpellBehavior for Confuse {
    fn can_launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) -> bool {
        has_live_target(state, cx)
    }

    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let target = state.target_or_caster();
        let pos = cx.entity_pos(target).unwrap_or(state.caster_pos);
        cue(cx.world, state, SoundId::Confuse, pos);
        state.has_duration = true;
        state.mana_per_second = 1.5;
        state.duration = state.duration_or(5000);
        state.position = pos;
        state.add_target(target);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        let Some(head) = Self::head(state, cx) else {
            return;
        };
        state.position = head;
        let spin = -(state.elapsed_ms() / 500.0).to_degrees();
        cx.world.draw_model(
            ModelDraw::new(ModelId::Butterfly, head).oriented(Orientation::new(spin, 0.0)),
        );

        for _ in 0..6 {
            let angle = cx.random(0.0, TAU);
            let distance = 15.0 * cx.unit().sqrt();
            let offset = Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance);
            let rise = Vec3::new(0.0, cx.random(1.0, 4.0), 0.0);
            let life = Duration::from_millis(cx.random(2300.0, 3300.0) as u64);
            let rgb = Self::sparkle_colour(cx);
            let sparkle = ParticleParams::at(head + offset, 0.25, life)
                .moving(rise)
                .tinted(rgb);
            if !cx.world.spawn_particle(sparkle) {
                break;
            }
        }

        let tint = Vec3::new(cx.unit(), cx.unit(), cx.unit());
        let light = DynamicLight {
            pos: head,
            rgb: Vec3::new(0.3, 0.3, 0.5) + Vec3::new(0.2, 0.0, 0.2) * tint,
            intensity: 1.3,
            fall_start: 180.0,
            fall_end: 420.0,
            duration: Some(FLICKER_LIFETIME),
        };
        if let Some(slot) = effects::ensure_light(cx.world, &mut state.light, light) {
            *slot = light;
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::release_light(cx.world, &mut state.light, Some(Duration::from_millis(500)));
    }
}
