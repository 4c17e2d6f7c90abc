//! Missiles that travel away from the caster.

use std::time::Duration;

use glam::Vec3;
use runecast_core::{
    direction_from, elevation_towards, forward_xz, millis, DamageFlags, DamageHandle, DamageParams,
    DamageType, DynamicLight, LightHandle, ModelDraw, ModelId, Orientation, ParticleParams,
    QueryFilter, SoundId, Sphere,
};

use super::{above, FLICKER_LIFETIME};
use crate::{
    context::SpellContext,
    effects::{self, cue, start_loop},
    instance::{SpellBehavior, SpellState},
};

const FIREBALL_CHARGE: Duration = Duration::from_millis(2000);
const FIREBALL_SPEED: f32 = 0.0045;
const FIREBALL_LIGHT_RELEASE: Duration = Duration::from_millis(500);

/// Ball of fire held in the caster's hands, then hurled forward.
#[derive(Debug, Default)]
pub(crate) struct Fireball {
    motion: Vec3,
    exploded: bool,
}

impl Fireball {
    /// Where the ball sits in front of the caster, and the direction it would fly.
    fn aim(state: &SpellState, cx: &SpellContext<'_>) -> Option<(Vec3, Vec3)> {
        let caster = cx.entity(state.caster)?;
        let heading = caster.orientation.heading;
        let ahead = forward_xz(heading);
        if state.caster_is_player() {
            let pos = caster.chest_or_pos() + ahead * 60.0;
            return Some((pos, direction_from(caster.orientation.elevation, heading)));
        }
        let mut pos = caster.pos + ahead * 60.0;
        if caster.is_npc() {
            pos += ahead * 30.0 + above(80.0);
        }
        let elevation = caster
            .target
            .and_then(|target| cx.entity_pos(target))
            .map_or(0.0, |target| elevation_towards(pos, target + above(60.0)));
        Some((pos, direction_from(elevation, heading)))
    }

    fn light(pos: Vec3, flicker: Vec3) -> DynamicLight {
        DynamicLight {
            pos,
            rgb: Vec3::new(1.0, 0.6, 0.3) - Vec3::new(0.3, 0.1, 0.1) * flicker,
            intensity: 2.2,
            fall_start: 400.0,
            fall_end: 500.0,
            duration: None,
        }
    }

    fn explode(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        let pos = state.position;
        cx.world.spawn_explosion(pos, state.level);
        self.motion *= 0.5;
        self.exploded = true;
        cx.world.apply_spheric_damage(
            DamageParams::new(
                pos,
                30.0 * state.level,
                3.0 * state.level,
                DamageType::FIRE | DamageType::MAGICAL,
            )
            .from_source(state.caster),
        );
        state.terminate();
        cx.world.play_sound(SoundId::FireHit, Some(pos));
        cx.world.notify_audible(state.caster, pos);
    }
}

impl SpellBehavior for Fireball {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        state.duration = Duration::from_millis(6000);
        let (pos, direction) = match cx.entity(state.caster) {
            Some(caster) if state.caster_is_player() => {
                let heading = caster.orientation.heading;
                (
                    caster.hand_or_pos() + forward_xz(heading) * 60.0,
                    direction_from(caster.orientation.elevation, heading),
                )
            }
            _ => Self::aim(state, cx).unwrap_or((state.caster_pos, Vec3::Z)),
        };
        state.position = pos;
        self.motion = direction * 80.0;
        cue(cx.world, state, SoundId::FireLaunch, state.caster_pos);
        state.sound = start_loop(cx.world, state, SoundId::FireWind, state.caster_pos, 1.0);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, dt: Duration) {
        let charging = state.elapsed <= FIREBALL_CHARGE;
        if charging {
            if let Some((pos, direction)) = Self::aim(state, cx) {
                state.position = pos;
                self.motion = direction * 100.0;
            }
        }
        state.position += self.motion * (millis(dt) * FIREBALL_SPEED);

        let flicker = Vec3::new(cx.unit(), cx.unit(), cx.unit());
        let light = Self::light(state.position, flicker);
        if let Some(slot) = effects::ensure_light(cx.world, &mut state.light, light) {
            *slot = light;
        }

        if !charging {
            let tail = ParticleParams::at(state.position, state.level * 2.0, Duration::from_millis(300))
                .moving(self.motion * FIREBALL_SPEED)
                .tinted(Vec3::new(1.0, 0.6, 0.3));
            let _ = cx.world.spawn_particle(tail);
        } else if cx.unit() < 0.9 {
            let size = (state.elapsed_ms() / millis(FIREBALL_CHARGE) * 10.0).clamp(1.0, state.level.max(1.0));
            let tail = ParticleParams::at(state.position, size, Duration::from_millis(300))
                .tinted(Vec3::new(1.0, 0.6, 0.3));
            let _ = cx.world.spawn_particle(tail);
        }

        if !self.exploded {
            let sphere = Sphere::new(state.position, (state.level * 2.0).max(12.0));
            if cx
                .world
                .any_entity_in_sphere(sphere, Some(state.caster), QueryFilter::NO_SAME_GROUP)
            {
                self.explode(state, cx);
            }
        }
        effects::follow_loop(cx.world, state.sound, state.position);
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::stop_loop(cx.world, &mut state.sound);
        effects::release_light(cx.world, &mut state.light, Some(FIREBALL_LIGHT_RELEASE));
    }
}

const ICE_BASE_DURATION_MS: f32 = 4200.0;
const MAX_ICICLES: usize = 150;
const ICICLE_SPREAD: Vec3 = Vec3::new(80.0, 0.0, 80.0);

#[derive(Debug)]
struct Icicle {
    pos: Vec3,
    size: Vec3,
    size_max: Vec3,
    small: bool,
    zone: Option<DamageHandle>,
}

/// Row of ice spikes erupting in front of the caster.
#[derive(Debug)]
pub(crate) struct IceProjectile {
    icicles: Vec<Icicle>,
    fade: f32,
}

impl Default for IceProjectile {
    fn default() -> Self {
        Self {
            icicles: Vec::new(),
            fade: 1.0,
        }
    }
}

/// Fills `path[low..=high]` by recursive midpoint displacement.
fn displace_midpoints(path: &mut [Vec3], low: usize, high: usize, spread: Vec3, cx: &mut SpellContext<'_>) {
    if high <= low + 1 {
        return;
    }
    let mid = (low + high) / 2;
    let jitter = Vec3::new(
        cx.random(-spread.x, spread.x),
        cx.random(-spread.y, spread.y),
        cx.random(-spread.z, spread.z),
    );
    path[mid] = (path[low] + path[high]) * 0.5 + jitter;
    displace_midpoints(path, low, mid, spread, cx);
    displace_midpoints(path, mid, high, spread, cx);
}

impl SpellBehavior for IceProjectile {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cue(cx.world, state, SoundId::IceProjectileLaunch, state.caster_pos);

        let heading = cx
            .entity(state.caster)
            .map_or(0.0, |caster| caster.orientation.heading);
        let ahead = forward_xz(heading);
        let base = state.caster_pos + ahead * 150.0;

        let max = (30.0 + state.level * 5.2) as usize;
        let reach = (max as f32 * 15.0).clamp(200.0, 450.0);
        let start = base + above(100.0);
        let mut end = start + ahead * reach;
        if let Some(hit) = cx.world.line_of_sight(start, end) {
            end = hit + ahead * 20.0;
        }

        let travelled = start.distance(end);
        let fraction = travelled / reach;
        state.set_duration_ms(ICE_BASE_DURATION_MS * fraction);
        let count = ((fraction * max as f32) as usize).min(MAX_ICICLES);

        let last = count / 2;
        let mut path = vec![Vec3::ZERO; last + 1];
        path[0] = start + Vec3::new(0.0, 100.0, 0.0);
        path[last] = end + Vec3::new(0.0, 100.0, 0.0);
        displace_midpoints(&mut path, 0, last, ICICLE_SPREAD, cx);

        for index in 0..count {
            let small = cx.unit() >= 0.5;
            let (min_size, range) = if small {
                (Vec3::new(0.4, 0.3, 0.4), 40.0)
            } else {
                (Vec3::new(1.2, 1.0, 1.2), 80.0)
            };
            let size_max = Vec3::new(
                cx.random(-1.0, 1.0),
                cx.random(-1.0, 1.0) + 0.2,
                cx.random(-1.0, 1.0),
            )
            .max(min_size);
            let offset = Vec3::new(cx.random(-range, range), 0.0, cx.random(-range, range));
            let pos = path[index / 2] + offset;
            let zone = cx.world.create_damage_zone(
                DamageParams::new(pos, 60.0, 0.1 * state.level, DamageType::MAGICAL | DamageType::COLD)
                    .from_source(state.caster)
                    .with_flags(DamageFlags::DONT_HURT_SOURCE)
                    .lasting(state.duration),
            );
            self.icicles.push(Icicle {
                pos,
                size: Vec3::ZERO,
                size_max,
                small,
                zone,
            });
        }
        state.position = base;
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        let remaining = millis(state.remaining());
        if remaining < 1000.0 {
            self.fade = remaining / 1000.0;
            for icicle in &mut self.icicles {
                icicle.size.y *= self.fade;
            }
        }

        let count = self.icicles.len();
        let duration = millis(state.duration).max(1.0);
        let grown = ((count * 2) as f32 * state.elapsed_ms() / duration) as usize;
        let grown = grown.min(count);

        for icicle in self.icicles.iter_mut().take(grown) {
            icicle.size = (icicle.size + Vec3::splat(0.1)).clamp(Vec3::ZERO, icicle.size_max);
            let tint = (Vec3::new(0.7, 0.7, 0.9) * icicle.size_max.y * self.fade).min(Vec3::ONE);
            let model = if icicle.small {
                ModelId::IcicleSmall
            } else {
                ModelId::Icicle
            };
            cx.world.draw_model(
                ModelDraw::new(model, icicle.pos)
                    .oriented(Orientation::new(icicle.pos.x.to_radians().cos() * 360.0, 0.0))
                    .scaled(icicle.size)
                    .tinted(tint),
            );
        }

        for index in 0..count.min(grown + 1) {
            let pos = self.icicles[index].pos;
            let roll = cx.unit();
            let mist = if roll < 0.01 {
                let jitter = Vec3::new(cx.random(-5.0, 5.0), cx.random(-5.0, 5.0), cx.random(-5.0, 5.0));
                let drift = Vec3::new(cx.random(-2.0, 2.0), cx.random(-2.0, 2.0), cx.random(-2.0, 2.0));
                let life = cx.random(2000.0, 4000.0).min(remaining + cx.random(0.0, 500.0));
                Some(ParticleParams::at(pos + jitter, 20.0, Duration::from_millis(life as u64)).moving(drift))
            } else if roll > 0.095 {
                let jitter = Vec3::new(cx.random(-5.0, 5.0), cx.random(-5.0, 5.0), cx.random(-5.0, 5.0));
                let drift = Vec3::new(0.0, cx.random(-2.0, 2.0), 0.0);
                let life = cx.random(2000.0, 3000.0).min(remaining + cx.random(0.0, 500.0));
                Some(
                    ParticleParams::at(pos + jitter + above(50.0), 0.5, Duration::from_millis(life as u64))
                        .moving(drift),
                )
            } else {
                None
            };
            if let Some(particle) = mist {
                let _ = cx
                    .world
                    .spawn_particle(particle.tinted(Vec3::new(0.7, 0.7, 1.0)));
            }
        }
    }

    fn end(&mut self, _state: &mut SpellState, cx: &mut SpellContext<'_>) {
        for icicle in &mut self.icicles {
            if let Some(zone) = icicle.zone.take() {
                cx.world.end_damage_zone(zone);
            }
        }
    }
}

const POISON_BASE_LIFETIME_MS: u64 = 8000;
const POISON_DELAY: Duration = Duration::from_millis(1600);
const POISON_FLIGHT: Duration = Duration::from_millis(2000);
const POISON_SPEED: f32 = 0.25;
const POISON_LIGHT_RELEASE: Duration = Duration::from_millis(2000);

#[derive(Debug)]
struct PoisonBolt {
    pos: Vec3,
    heading: f32,
    lifetime: Duration,
    light: Option<LightHandle>,
}

/// Fan of poison clouds drifting away from the caster's hand.
#[derive(Debug, Default)]
pub(crate) struct PoisonProjectile {
    bolts: Vec<PoisonBolt>,
}

impl PoisonProjectile {
    fn light(pos: Vec3, intensity: f32) -> DynamicLight {
        DynamicLight {
            pos,
            rgb: Vec3::new(0.0, 1.0, 0.0),
            intensity: 2.3 * intensity,
            fall_start: 150.0,
            fall_end: 250.0,
            duration: Some(FLICKER_LIFETIME),
        }
    }

    fn spawn_fog(state: &SpellState, cx: &mut SpellContext<'_>, pos: Vec3, dt: Duration) {
        let power = state.level + 7.0;
        let attempts = ((millis(dt) / 4.0) as usize).max(1);
        for _ in 0..attempts {
            if cx.random(0.0, 2000.0) >= power {
                continue;
            }
            let offset = Vec3::new(
                cx.random(-100.0, 100.0),
                cx.random(-100.0, 100.0),
                cx.random(-100.0, 100.0),
            );
            let drift = Vec3::new(
                (1.0 - cx.unit()) * 0.2,
                (1.0 - cx.unit()) / 15.0,
                (1.0 - cx.unit()) * 0.2,
            );
            let size = (80.0 + cx.random(0.0, 160.0)) / 3.0;
            let life = Duration::from_millis(cx.random(4500.0, 9000.0) as u64);
            let rgb = Vec3::new(cx.random(0.0, 1.0 / 3.0), 1.0, cx.random(0.0, 0.1));
            let fog = ParticleParams::at(pos + offset, size, life)
                .moving(drift)
                .tinted(rgb);
            if !cx.world.spawn_particle(fog) {
                return;
            }
        }
    }
}

impl SpellBehavior for PoisonProjectile {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cue(cx.world, state, SoundId::PoisonProjectileLaunch, state.caster_pos);
        let (source, heading) = cx.entity(state.caster).map_or((state.caster_pos, 0.0), |caster| {
            (caster.hand_or_pos(), caster.orientation.heading)
        });
        let source = source + forward_xz(heading) * 90.0;

        let count = state.level.max(1.0).min(5.0) as usize;
        let mut longest = Duration::ZERO;
        for _ in 0..count {
            let spread = cx.random(-10.0, 10.0);
            let extra = cx.random(0.0, 5000.0) as u64;
            let lifetime = Duration::from_millis(POISON_BASE_LIFETIME_MS + extra);
            longest = longest.max(lifetime);
            let light = cx.world.acquire_light(Self::light(source, 1.0));
            self.bolts.push(PoisonBolt {
                pos: source,
                heading: heading + spread,
                lifetime,
                light,
            });
        }
        state.duration = longest + Duration::from_millis(1000);
        state.position = source;
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, dt: Duration) {
        let flying = state.elapsed <= POISON_FLIGHT;
        let poisoning = state.elapsed > POISON_DELAY;
        for index in 0..self.bolts.len() {
            let (pos, alive) = {
                let bolt = &mut self.bolts[index];
                if flying {
                    bolt.pos += forward_xz(bolt.heading) * (POISON_SPEED * millis(dt));
                }
                (bolt.pos, state.elapsed < bolt.lifetime)
            };
            if !alive {
                effects::release_light(cx.world, &mut self.bolts[index].light, Some(POISON_LIGHT_RELEASE));
                continue;
            }
            let remaining = self.bolts[index].lifetime.saturating_sub(state.elapsed);
            let glow = (millis(remaining) / 1000.0).min(1.0);
            let seed = Self::light(pos, glow);
            if let Some(light) = effects::ensure_light(cx.world, &mut self.bolts[index].light, seed) {
                *light = seed;
            }
            Self::spawn_fog(state, cx, pos, dt);
            if poisoning {
                let amount = (4.0 + state.level * 0.6) * dt.as_secs_f32();
                cx.world.apply_spheric_damage(
                    DamageParams::new(pos, 120.0, amount, DamageType::MAGICAL | DamageType::POISON)
                        .from_source(state.caster),
                );
            }
        }
        if let Some(first) = self.bolts.first() {
            state.position = first.pos;
        }
    }

    fn end(&mut self, _state: &mut SpellState, cx: &mut SpellContext<'_>) {
        for bolt in &mut self.bolts {
            effects::release_light(cx.world, &mut bolt.light, Some(POISON_LIGHT_RELEASE));
        }
        self.bolts.clear();
    }
}
