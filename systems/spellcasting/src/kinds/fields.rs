//! Spells anchored to a spot on the ground.

use std::time::Duration;

use glam::Vec3;
use runecast_core::{
    millis, services::ScriptEvent, DamageHandle, DamageParams, DamageType, DynamicLight,
    EmitterHandle, EmitterKind, EntityFlags, EntityHandle, EntitySpawn, ModelDraw, ModelId,
    Orientation, ParticleParams, QueryFilter, SoundId, SpellKind, Sphere,
};

use super::{above, ahead_of_caster, spell_light, FLICKER_LIFETIME};
use crate::{
    context::SpellContext,
    effects::{self, cue, start_loop},
    instance::{SpellBehavior, SpellState},
};

const RUNE_FILTER: QueryFilter = QueryFilter::NO_SAME_GROUP
    .union(QueryFilter::NO_BACKGROUND)
    .union(QueryFilter::NO_ITEM)
    .union(QueryFilter::NO_FIX)
    .union(QueryFilter::NO_DEAD);

/// Glyph on the floor that explodes when something steps close.
#[derive(Debug)]
pub(crate) struct RuneOfGuarding;

impl RuneOfGuarding {
    fn light(pos: Vec3, intensity: f32, fall_start: f32, fall_end: f32) -> DynamicLight {
        DynamicLight {
            pos: pos + above(50.0),
            rgb: Vec3::new(1.0, 0.2, 0.2),
            intensity,
            fall_start,
            fall_end,
            duration: Some(FLICKER_LIFETIME),
        }
    }

    fn draw(state: &SpellState, cx: &mut SpellContext<'_>) {
        let pos = state.position + above(20.0);
        let spin = state.elapsed_ms() * 0.01;
        let pulse = (state.elapsed_ms() * 0.015).sin();
        cx.world.draw_model(
            ModelDraw::new(ModelId::RuneHalo, pos)
                .oriented(Orientation::new(spin * 0.1, 0.0))
                .scaled(Vec3::new(1.0, -0.1, 1.0))
                .tinted(Vec3::new(0.4, 0.4, 0.6)),
        );
        cx.world.draw_model(
            ModelDraw::new(ModelId::RuneSeal, pos)
                .oriented(Orientation::new(spin, 0.0))
                .scaled(Vec3::splat(2.0 * (1.0 + 0.01 * pulse)))
                .tinted(Vec3::new(0.6, 0.0, 0.0)),
        );
        cx.world.draw_model(
            ModelDraw::new(ModelId::RuneGlyph, pos)
                .oriented(Orientation::new(spin, 0.0))
                .scaled(Vec3::splat(1.8 * (1.0 + 0.02 * pulse)))
                .tinted(Vec3::new(0.6, 0.3, 0.45)),
        );
        for _ in 0..4 {
            let offset = Vec3::new(cx.random(-40.0, 40.0), 0.0, cx.random(-40.0, 40.0));
            let drift = Vec3::new(
                cx.random(-0.8, 0.8),
                cx.random(-4.0, 0.0),
                cx.random(-0.8, 0.8),
            );
            let life = Duration::from_millis(cx.random(2600.0, 3200.0) as u64);
            let spark = ParticleParams::at(pos + offset, 0.3, life)
                .moving(drift)
                .tinted(Vec3::new(0.4, 0.4, 0.6));
            if !cx.world.spawn_particle(spark) {
                break;
            }
        }
    }
}

impl SpellBehavior for RuneOfGuarding {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cx.end_by_caster(state.caster, SpellKind::RuneOfGuarding);
        cue(cx.world, state, SoundId::RuneOfGuarding, state.caster_pos);
        state.duration = state.duration_or(99_999_999);
        state.position = state.caster_pos;
        state.light = cx
            .world
            .acquire_light(Self::light(state.position, 3.0, 400.0, 500.0));
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        let flicker = 0.7 + 2.3 * cx.random(0.85, 1.0);
        let glow = Self::light(state.position, flicker, 150.0, 350.0);
        if let Some(light) = effects::ensure_light(cx.world, &mut state.light, glow) {
            *light = glow;
        }
        Self::draw(state, cx);

        let trigger = Sphere::new(state.position, (state.level * 15.0).max(50.0));
        if !cx
            .world
            .any_entity_in_sphere(trigger, Some(state.caster), RUNE_FILTER)
        {
            return;
        }
        let pos = state.position;
        cx.world.spawn_explosion(pos, state.level);
        cx.world.apply_spheric_damage(
            DamageParams::new(
                pos,
                30.0 * state.level,
                4.0 * state.level,
                DamageType::FIRE | DamageType::MAGICAL,
            )
            .from_source(state.caster),
        );
        cx.world.play_sound(SoundId::RuneOfGuardingEnd, Some(pos));
        state.terminate();
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::release_light(cx.world, &mut state.light, Some(Duration::from_millis(500)));
    }
}

const DISARM_RADIUS: f32 = 400.0;

/// Weakens every rune near the player, dispelling those it exhausts.
#[derive(Debug)]
pub(crate) struct DisarmTrap;

impl SpellBehavior for DisarmTrap {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cue(cx.world, state, SoundId::DisarmTrap, state.caster_pos);
        state.duration = Duration::from_millis(1);

        let area = Sphere::new(cx.player_pos(), DISARM_RADIUS);
        for handle in cx.registry.handles_of_kind(SpellKind::RuneOfGuarding) {
            let exhausted = {
                let Some(rune) = cx.registry.get_mut(handle) else {
                    continue;
                };
                if !area.contains(rune.position()) {
                    continue;
                }
                let rune = rune.state_mut();
                rune.level -= state.level;
                rune.level <= 0.0
            };
            if exhausted {
                let _ = cx.end_spell(handle);
            }
        }
    }
}

const FIELD_REACH: f32 = 250.0;
const FIELD_HALF_EXTENT: f32 = 75.0;
const FIELD_FADE_IN: Duration = Duration::from_millis(1800);
const FIELD_FADE_OUT: Duration = Duration::from_millis(1000);
const FIELD_LIGHT_RELEASE: Duration = Duration::from_millis(800);

/// Solid magical cube the caster can stand on.
#[derive(Debug, Default)]
pub(crate) struct CreateField {
    prop: Option<EntityHandle>,
    clock: Duration,
}

impl CreateField {
    fn alpha(&self, duration: Duration) -> f32 {
        let fade_in = (millis(self.clock) / millis(FIELD_FADE_IN)).min(1.0);
        fade_in * effects::fade_out(self.clock, duration, FIELD_FADE_OUT)
    }
}

impl SpellBehavior for CreateField {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        self.clock = state.elapsed;
        state.duration = state.duration_or(800_000);
        state.has_duration = true;
        state.mana_per_second = 1.2;

        let Some((pos, heading)) = ahead_of_caster(cx, state.caster, FIELD_REACH) else {
            state.terminate();
            return;
        };
        if !state.is_restoring() {
            cue(cx.world, state, SoundId::CreateField, pos);
        }
        state.position = pos;

        self.prop = cx.world.spawn_entity(EntitySpawn {
            template: "field_cube".to_owned(),
            pos,
            orientation: Orientation::new(heading, 0.0),
            flags: EntityFlags::FIX | EntityFlags::FIELD | EntityFlags::NO_SAVE,
        });
        let Some(prop) = self.prop else {
            state.terminate();
            return;
        };
        if let Some(entity) = cx.entity_mut(prop) {
            entity.script_loaded = true;
            entity.summoner = Some(state.caster);
        }
        cx.world.send_script_event(prop, ScriptEvent::Init);
        state.light = cx.world.acquire_light(spell_light(
            pos + above(150.0),
            Vec3::new(0.8, 0.0, 1.0),
            3.0,
        ));
        if let Some(light) = effects::light_mut(cx.world, state.light) {
            light.fall_start = 400.0;
            light.fall_end = 500.0;
        }
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, dt: Duration) {
        let Some(prop) = self.prop.filter(|prop| cx.world.is_valid(*prop)) else {
            return;
        };
        self.clock += dt;
        if let Some(entity) = cx.entity_mut(prop) {
            entity.pos = state.position;
        }
        if cx
            .world
            .any_npc_on_platform(state.position, FIELD_HALF_EXTENT)
        {
            state.terminate();
        }
        let alpha = self.alpha(state.duration);
        cx.world.draw_model(
            ModelDraw::new(ModelId::FieldCube, state.position)
                .tinted(Vec3::new(0.8, 0.0, 1.0) * alpha),
        );
        if let Some(light) = effects::light_mut(cx.world, state.light) {
            light.intensity = 3.0 * alpha;
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        effects::release_light(cx.world, &mut state.light, Some(FIELD_LIGHT_RELEASE));
        if let Some(prop) = self.prop.take() {
            cx.world.destroy_entity(prop);
        }
    }

    fn spawned_entity(&self) -> Option<EntityHandle> {
        self.prop
    }
}

const FIELD_DAMAGE_RADIUS: f32 = 150.0;
const FIELD_DAMAGE_PER_SECOND: f32 = 10.0;
const FIELD_LIGHT_LIFETIME: Duration = Duration::from_millis(600);
const FIELD_VIEW_RADIUS: f32 = 350.0;

/// Where a damaging field lands and the zone that burns or freezes it.
fn open_field(
    state: &mut SpellState,
    cx: &mut SpellContext<'_>,
    kind: DamageType,
) -> Option<(Vec3, DamageHandle)> {
    state.duration = state.duration_or(100_000);
    state.has_duration = true;
    state.mana_per_second = 2.8;
    let (target, _) = ahead_of_caster(cx, state.caster, FIELD_REACH)?;
    let zone = cx.world.create_damage_zone(
        DamageParams::new(
            target,
            FIELD_DAMAGE_RADIUS,
            FIELD_DAMAGE_PER_SECOND,
            DamageType::MAGICAL | DamageType::FIELD | kind,
        )
        .from_source(state.caster)
        .lasting(state.duration),
    )?;
    Some((target, zone))
}

fn field_light(pos: Vec3, rgb: Vec3, cx: &mut SpellContext<'_>) -> DynamicLight {
    DynamicLight {
        pos: pos + above(120.0),
        rgb,
        intensity: 4.6,
        fall_start: cx.random(150.0, 180.0),
        fall_end: cx.random(290.0, 320.0),
        duration: Some(FIELD_LIGHT_LIFETIME),
    }
}

fn field_visible(pos: Vec3, cx: &SpellContext<'_>) -> bool {
    cx.world
        .sphere_visible(Sphere::new(pos + above(120.0), FIELD_VIEW_RADIUS))
}

/// Patch of ground set ablaze in front of the caster.
#[derive(Debug, Default)]
pub(crate) struct FireField {
    zone: Option<DamageHandle>,
    flames: Option<EmitterHandle>,
}

impl SpellBehavior for FireField {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cx.end_by_caster(state.caster, SpellKind::FireField);
        cue(cx.world, state, SoundId::FireFieldStart, state.caster_pos);
        let Some((target, zone)) = open_field(state, cx, DamageType::FIRE) else {
            state.terminate();
            return;
        };
        self.zone = Some(zone);
        state.position = target + above(10.0);
        state.sound = start_loop(cx.world, state, SoundId::FireFieldLoop, target, 1.0);
        effects::attach_emitter(
            cx.world,
            &mut self.flames,
            EmitterKind::FireFieldFlames,
            state.position,
        );
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, dt: Duration) {
        let rgb = Vec3::new(1.0 + cx.random(-0.1, 0.0), 0.8, 0.6);
        let seed = field_light(state.position, rgb, cx);
        if let Some(light) = effects::ensure_light(cx.world, &mut state.light, seed) {
            *light = seed;
        }
        if !field_visible(state.position, cx) {
            return;
        }
        effects::update_emitter(cx.world, self.flames, state.position, 1.0);
        let bursts = (millis(dt) / 8.0) as usize + 2;
        for _ in 0..bursts {
            let angle = cx.random(-std::f32::consts::PI, std::f32::consts::PI);
            let (sin, cos) = angle.sin_cos();
            let spread = Vec3::new(120.0 * sin, 15.0 * sin, 120.0 * cos)
                * Vec3::new(cx.unit(), cx.unit(), cx.unit());
            let drift = Vec3::new(2.0, 1.0, 2.0)
                + Vec3::new(-4.0, -8.0, -4.0) * Vec3::new(cx.unit(), cx.unit(), cx.unit());
            let life = Duration::from_millis(cx.random(500.0, 1500.0) as u64);
            let flame = ParticleParams::at(state.position + spread, 7.0, life)
                .moving(drift)
                .tinted(Vec3::new(1.0, 0.6, 0.3));
            if !cx.world.spawn_particle(flame) || !cx.world.spawn_particle(flame) {
                break;
            }
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        if let Some(zone) = self.zone.take() {
            cx.world.end_damage_zone(zone);
        }
        effects::release_emitter(cx.world, &mut self.flames);
        effects::stop_loop(cx.world, &mut state.sound);
        cue(cx.world, state, SoundId::FireFieldEnd, state.position);
    }
}

const ICE_FIELD_SPIKES: usize = 50;

#[derive(Debug)]
struct Spike {
    pos: Vec3,
    size: Vec3,
    size_max: Vec3,
    large: bool,
}

/// Bed of ice spikes that freezes whoever walks through it.
#[derive(Debug, Default)]
pub(crate) struct IceField {
    zone: Option<DamageHandle>,
    spikes: Vec<Spike>,
}

impl SpellBehavior for IceField {
    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        cx.end_by_caster(state.caster, SpellKind::IceField);
        cue(cx.world, state, SoundId::IceField, state.caster_pos);
        let Some((target, zone)) = open_field(state, cx, DamageType::COLD) else {
            state.terminate();
            return;
        };
        self.zone = Some(zone);
        state.position = target;

        for _ in 0..ICE_FIELD_SPIKES {
            let large = cx.unit() < 0.5;
            let (min_size, spread) = if large {
                (Vec3::new(1.2, 1.0, 1.2), 80.0)
            } else {
                (Vec3::new(0.4, 0.3, 0.4), 120.0)
            };
            let size_max =
                (Vec3::new(cx.unit(), cx.unit(), cx.unit()) + Vec3::new(0.0, 0.2, 0.0)).max(min_size);
            let pos = target
                + Vec3::new(cx.random(-spread, spread), 0.0, cx.random(-spread, spread));
            self.spikes.push(Spike {
                pos,
                size: Vec3::ZERO,
                size_max,
                large,
            });
        }
        state.sound = start_loop(cx.world, state, SoundId::IceFieldLoop, target, 1.0);
    }

    fn update(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>, _dt: Duration) {
        let rgb = Vec3::new(0.76, 0.76, 1.0 + cx.random(-0.1, 0.0));
        let seed = field_light(state.position, rgb, cx);
        if let Some(light) = effects::ensure_light(cx.world, &mut state.light, seed) {
            *light = seed;
        }
        if !field_visible(state.position, cx) {
            return;
        }
        for spike in &mut self.spikes {
            spike.size = (spike.size + Vec3::splat(0.1)).min(spike.size_max);
            let model = if spike.large {
                ModelId::Icicle
            } else {
                ModelId::IcicleSmall
            };
            let tint = (Vec3::new(0.7, 0.7, 0.9) * spike.size_max.y).min(Vec3::ONE);
            cx.world.draw_model(
                ModelDraw::new(model, Vec3::new(spike.pos.x, state.position.y, spike.pos.z))
                    .oriented(Orientation::new(spike.pos.x.to_radians().cos() * 360.0, 0.0))
                    .scaled(Vec3::new(spike.size.z, spike.size.y, spike.size.x))
                    .tinted(tint),
            );
        }
        for index in 0..ICE_FIELD_SPIKES / 2 {
            let Some(pos) = self.spikes.get(index).map(|spike| spike.pos) else {
                break;
            };
            let roll = cx.unit();
            let jitter = Vec3::new(cx.random(-5.0, 5.0), cx.random(-5.0, 5.0), cx.random(-5.0, 5.0));
            let life = Duration::from_millis(cx.random(2000.0, 6000.0) as u64);
            let particle = if roll < 0.01 {
                let drift = Vec3::new(cx.random(-2.0, 2.0), cx.random(-2.0, 2.0), cx.random(-2.0, 2.0));
                ParticleParams::at(pos + jitter, 20.0, life).moving(drift)
            } else if roll > 0.095 {
                let drift = Vec3::new(0.0, cx.random(-2.0, 2.0), 0.0);
                ParticleParams::at(pos + jitter + above(50.0), 0.5, life).moving(drift)
            } else {
                continue;
            };
            let _ = cx
                .world
                .spawn_particle(particle.tinted(Vec3::new(0.7, 0.7, 1.0)));
        }
    }

    fn end(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>) {
        if let Some(zone) = self.zone.take() {
            cx.world.end_damage_zone(zone);
        }
        effects::stop_loop(cx.world, &mut state.sound);
        cue(cx.world, state, SoundId::IceFieldEnd, state.position);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::Vec3;
    use runecast_core::{
        services::{Entities, ScriptEvent},
        CastRequest, Entity, EntityFlags, EntityHandle, Event, Pool, SpellKind,
    };
    use runecast_world::{query, World};

    use crate::{CastOutcome, Spellcasting, SpellcastingConfig};

    fn npc_at(world: &mut World, pos: Vec3) -> EntityHandle {
        world
            .add_entity(Entity {
                template: "goblin".to_owned(),
                pos,
                flags: EntityFlags::NPC | EntityFlags::IN_SCENE,
                life: Pool::full(100.0),
                mana: Pool::full(100.0),
                height: -170.0,
                ..Entity::default()
            })
            .expect("entity slot")
    }

    fn cast(spells: &mut Spellcasting, world: &mut World, request: CastRequest) -> CastOutcome {
        let mut events = Vec::new();
        spells
            .cast(world, request, &mut events)
            .expect("registry has room")
    }

    #[test]
    fn rune_explodes_once_when_approached() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let _ = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::RuneOfGuarding, EntityHandle::PLAYER, 2.0),
        );
        let mut events = Vec::new();
        spells.tick(&mut world, Duration::from_millis(16), &mut events);
        assert_eq!(spells.registry().len(), 1, "nothing near the rune yet");

        let _ = npc_at(&mut world, Vec3::new(0.0, 0.0, 20.0));
        spells.tick(&mut world, Duration::from_millis(16), &mut events);
        assert!(spells.registry().is_empty(), "rune is spent");
        let bursts = query::damage_bursts(&world);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].radius, 60.0);
        assert_eq!(bursts[0].amount, 8.0);
    }

    #[test]
    fn disarm_trap_drains_rune_levels() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let trapper = npc_at(&mut world, Vec3::new(0.0, 0.0, 300.0));
        let CastOutcome::Launched(rune) = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::RuneOfGuarding, trapper, 2.0),
        ) else {
            panic!("rune should launch");
        };

        let _ = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::DisarmTrap, EntityHandle::PLAYER, 1.0),
        );
        assert_eq!(
            spells.registry().get(rune).map(|spell| spell.state().level()),
            Some(1.0),
            "one level drained"
        );

        let _ = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::DisarmTrap, EntityHandle::PLAYER, 1.0),
        );
        assert!(!spells.registry().contains(rune), "exhausted rune is dispelled");
    }

    #[test]
    fn disarm_trap_ignores_distant_runes() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let trapper = npc_at(&mut world, Vec3::new(0.0, 0.0, 900.0));
        let CastOutcome::Launched(rune) = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::RuneOfGuarding, trapper, 1.0),
        ) else {
            panic!("rune should launch");
        };
        let _ = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::DisarmTrap, EntityHandle::PLAYER, 5.0),
        );
        assert_eq!(
            spells.registry().get(rune).map(|spell| spell.state().level()),
            Some(1.0)
        );
    }

    #[test]
    fn field_prop_is_owned_until_an_npc_climbs_on() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let CastOutcome::Launched(field) = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::CreateField, EntityHandle::PLAYER, 3.0),
        ) else {
            panic!("field should launch");
        };
        let prop = spells
            .registry()
            .get(field)
            .and_then(|spell| spell.spawned_entity())
            .expect("field prop spawned");
        let placed = world.entity(prop).map(|entity| entity.pos);
        assert_eq!(placed, Some(Vec3::new(0.0, 0.0, 250.0)));
        assert!(query::script_events(&world).contains(&(prop, ScriptEvent::Init)));

        let _ = npc_at(&mut world, Vec3::new(10.0, 0.0, 250.0));
        let mut events = Vec::new();
        spells.tick(&mut world, Duration::from_millis(16), &mut events);
        assert!(!spells.registry().contains(field));
        assert!(!world.is_valid(prop), "prop removed with the field");
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::SpellEnded { spell, .. } if *spell == field)));
    }

    #[test]
    fn recasting_a_fire_field_replaces_the_previous_one() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let CastOutcome::Launched(first) = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::FireField, EntityHandle::PLAYER, 7.0),
        ) else {
            panic!("field should launch");
        };
        assert_eq!(query::damage_zone_count(&world), 1);

        let _ = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::FireField, EntityHandle::PLAYER, 7.0),
        );
        assert!(!spells.registry().contains(first));
        assert_eq!(spells.registry().len(), 1);
        assert_eq!(query::damage_zone_count(&world), 1, "old zone was ended");
    }

    #[test]
    fn ice_field_zone_ends_with_the_spell() {
        let mut world = World::new();
        let mut spells = Spellcasting::new(&SpellcastingConfig::default());
        let CastOutcome::Launched(field) = cast(
            &mut spells,
            &mut world,
            CastRequest::new(SpellKind::IceField, EntityHandle::PLAYER, 7.0)
                .with_duration(Duration::from_millis(500)),
        ) else {
            panic!("field should launch");
        };
        let mut events = Vec::new();
        spells.tick(&mut world, Duration::from_millis(100), &mut events);
        assert!(!query::model_draws(&world).is_empty(), "spikes drawn near the player");
        spells.tick(&mut world, Duration::from_millis(400), &mut events);
        assert!(!spells.registry().contains(field));
        assert_eq!(query::damage_zone_count(&world), 0);
        assert!(query::active_loops(&world).is_empty());
    }
}
