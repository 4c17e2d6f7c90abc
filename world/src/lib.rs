#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the Runecast spell engine.
//!
//! The [`World`] owns the entity table, the player, and every bounded resource
//! pool spells draw from. It implements each collaborator trait of
//! [`runecast_core::services`], so the spellcasting system can run against it
//! directly. Hosts advance the world's own timers through [`apply`] and read
//! its state back through the [`query`] module.

mod audio;
mod damage;
mod lights;
mod render;

use std::time::Duration;

use glam::Vec3;
use runecast_core::{
    horizontal_distance,
    services::{
        DamageService, Entities, LightPool, PlayerState, Renderer, ScriptEvent, SoundSystem,
        SpatialQuery,
    },
    Command, Cylinder, DamageFlags, DamageHandle, DamageParams, DamageType, DynamicLight, Emitter,
    EmitterHandle, EmitterKind, Entity, EntityFlags, EntityHandle, EntitySpawn, Event,
    EyeballState, LightHandle, ModelDraw, ParticleParams, Player, Pool, QueryFilter, SoundHandle,
    SoundId, Sphere, TrailParams,
};
use serde::Deserialize;
use tracing::{debug, trace};

pub use audio::{LoopedSound, PlayedCue};
pub use render::{Bolt, Explosion};

use crate::{
    audio::Mixer,
    damage::DamageZones,
    lights::LightTable,
    render::RenderLog,
};

const PLAYER_TEMPLATE: &str = "player";
const PLAYER_HEIGHT: f32 = -170.0;
const NPC_HEIGHT: f32 = -165.0;
const PLATFORM_VERTICAL_REACH: f32 = 200.0;

/// Capacities and tuning of the reference world.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Number of dynamic light slots.
    pub light_capacity: usize,
    /// Number of looped sound channels.
    pub sound_channels: usize,
    /// Number of particle emitter slots.
    pub emitter_capacity: usize,
    /// Particles that may be spawned per frame.
    pub particle_budget: usize,
    /// Number of persistent damage zones.
    pub damage_zone_capacity: usize,
    /// Maximum number of entities including the player.
    pub entity_capacity: usize,
    /// Height of the flat ground plane.
    pub ground_level: f32,
    /// Collision radius of every entity.
    pub entity_radius: f32,
    /// Hit points given to entities spawned at runtime.
    pub spawned_life: f32,
    /// Distance from the player beyond which effects are culled.
    pub view_distance: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            light_capacity: 500,
            sound_channels: 64,
            emitter_capacity: 128,
            particle_budget: 2200,
            damage_zone_capacity: 200,
            entity_capacity: 256,
            ground_level: 0.0,
            entity_radius: 40.0,
            spawned_life: 50.0,
            view_distance: 4000.0,
        }
    }
}

#[derive(Debug)]
struct EntitySlot {
    generation: u32,
    entity: Option<Entity>,
}

/// Represents the authoritative Runecast world state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    entities: Vec<EntitySlot>,
    player: Player,
    lights: LightTable,
    mixer: Mixer,
    damage: DamageZones,
    render: RenderLog,
    obstacles: Vec<Sphere>,
    pits: Vec<Sphere>,
    script_events: Vec<(EntityHandle, ScriptEvent)>,
    audible: Vec<(EntityHandle, Vec3)>,
    tick_index: u64,
}

impl World {
    /// Creates a world with the default configuration and a player at the origin.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a world with explicit capacities and a player at the origin.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        let player_entity = Entity {
            template: PLAYER_TEMPLATE.to_owned(),
            flags: EntityFlags::IN_SCENE | EntityFlags::IN_TREAT_ZONE,
            life: Pool::full(100.0),
            mana: Pool::full(100.0),
            height: PLAYER_HEIGHT,
            ..Entity::default()
        };
        Self {
            entities: vec![EntitySlot {
                generation: 0,
                entity: Some(player_entity),
            }],
            player: Player::default(),
            lights: LightTable::new(config.light_capacity),
            mixer: Mixer::new(config.sound_channels),
            damage: DamageZones::new(config.damage_zone_capacity),
            render: RenderLog::new(config.particle_budget, config.emitter_capacity),
            obstacles: Vec::new(),
            pits: Vec::new(),
            script_events: Vec::new(),
            audible: Vec::new(),
            tick_index: 0,
            config,
        }
    }

    /// Inserts a fully described entity, returning `None` when the table is full.
    pub fn add_entity(&mut self, entity: Entity) -> Option<EntityHandle> {
        if let Some(index) = self
            .entities
            .iter()
            .skip(1)
            .position(|slot| slot.entity.is_none())
        {
            let index = index + 1;
            let slot = &mut self.entities[index];
            slot.entity = Some(entity);
            return Some(EntityHandle::new(index as u32, slot.generation));
        }
        if self.entities.len() >= self.config.entity_capacity {
            return None;
        }
        let index = self.entities.len();
        self.entities.push(EntitySlot {
            generation: 0,
            entity: Some(entity),
        });
        Some(EntityHandle::new(index as u32, 0))
    }

    /// Adds a solid sphere that blocks sight and occupies space.
    pub fn add_obstacle(&mut self, obstacle: Sphere) {
        self.obstacles.push(obstacle);
    }

    /// Removes the ground inside the provided horizontal disk.
    pub fn add_pit(&mut self, center: Vec3, radius: f32) {
        self.pits.push(Sphere::new(center, radius));
    }

    fn slot(&self, handle: EntityHandle) -> Option<&EntitySlot> {
        self.entities
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    fn live_entities(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.entity
                    .as_ref()
                    .map(|entity| (EntityHandle::new(index as u32, slot.generation), entity))
            })
    }

    fn overlaps_sphere(&self, entity: &Entity, sphere: Sphere) -> bool {
        let top = entity.pos.y + entity.height.min(0.0);
        let bottom = entity.pos.y + entity.height.max(0.0);
        let closest = Vec3::new(entity.pos.x, sphere.center.y.clamp(top, bottom), entity.pos.z);
        closest.distance(sphere.center) <= sphere.radius + self.config.entity_radius
    }

    fn damage_entities(&mut self, params: &DamageParams, scale: f32) {
        let amount = params.amount * scale;
        for (index, slot) in self.entities.iter_mut().enumerate() {
            let Some(entity) = slot.entity.as_mut() else {
                continue;
            };
            let handle = EntityHandle::new(index as u32, slot.generation);
            if params.flags.contains(DamageFlags::DONT_HURT_SOURCE)
                && params.source == Some(handle)
            {
                continue;
            }
            if entity.life.max <= 0.0 || entity.pos.distance(params.pos) > params.radius {
                continue;
            }
            if params.kind.contains(DamageType::POISON) {
                entity.poison += amount;
            } else {
                entity.life.current = (entity.life.current - amount).max(0.0);
            }
        }
    }

    fn advance(&mut self, dt: Duration) {
        self.tick_index = self.tick_index.saturating_add(1);
        self.render.begin_frame();
        self.lights.advance(dt);

        let entities = &self.entities;
        for zone in self.damage.zones_mut() {
            if !zone
                .params
                .flags
                .contains(DamageFlags::FOLLOW_SOURCE)
            {
                continue;
            }
            let source_pos = zone.params.source.and_then(|source| {
                entities
                    .get(source.index() as usize)
                    .filter(|slot| slot.generation == source.generation())
                    .and_then(|slot| slot.entity.as_ref())
                    .map(|entity| entity.pos)
            });
            if let Some(pos) = source_pos {
                zone.params.pos = pos;
            }
        }

        let active = self.damage.advance(dt);
        let seconds = dt.as_secs_f32();
        for params in &active {
            self.damage_entities(params, seconds);
        }

        if self.player.eyeball.state == EyeballState::Closing {
            self.player.eyeball.state = EyeballState::Gone;
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Entities for World {
    fn entity(&self, handle: EntityHandle) -> Option<&Entity> {
        self.slot(handle).and_then(|slot| slot.entity.as_ref())
    }

    fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.entities
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.entity.as_mut())
    }

    fn entity_handles(&self) -> Vec<EntityHandle> {
        self.live_entities().map(|(handle, _)| handle).collect()
    }

    fn spawn_entity(&mut self, spawn: EntitySpawn) -> Option<EntityHandle> {
        let is_npc = spawn.flags.contains(EntityFlags::NPC);
        let entity = Entity {
            template: spawn.template,
            pos: spawn.pos,
            orientation: spawn.orientation,
            flags: spawn.flags | EntityFlags::IN_SCENE,
            life: if is_npc {
                Pool::full(self.config.spawned_life)
            } else {
                Pool::default()
            },
            height: if is_npc { NPC_HEIGHT } else { 0.0 },
            ..Entity::default()
        };
        let handle = self.add_entity(entity);
        debug!(?handle, "spawned entity");
        handle
    }

    fn destroy_entity(&mut self, handle: EntityHandle) {
        if handle.is_player() {
            return;
        }
        let Some(slot) = self
            .entities
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
        else {
            return;
        };
        if slot.entity.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            debug!(?handle, "destroyed entity");
        }
    }

    fn send_script_event(&mut self, handle: EntityHandle, event: ScriptEvent) {
        if self.is_valid(handle) {
            self.script_events.push((handle, event));
        }
    }

    fn notify_audible(&mut self, source: EntityHandle, pos: Vec3) {
        self.audible.push((source, pos));
    }

    fn interrupt_casting(&mut self, handle: EntityHandle) {
        if let Some(entity) = self.entity_mut(handle) {
            entity.casting = false;
        }
    }
}

impl PlayerState for World {
    fn player(&self) -> &Player {
        &self.player
    }

    fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }
}

impl DamageService for World {
    fn apply_spheric_damage(&mut self, params: DamageParams) {
        self.damage.record_burst(params);
        self.damage_entities(&params, 1.0);
    }

    fn create_damage_zone(&mut self, params: DamageParams) -> Option<DamageHandle> {
        let handle = self.damage.create(params);
        if handle.is_none() {
            debug!("damage zone table exhausted");
        }
        handle
    }

    fn damage_zone_mut(&mut self, handle: DamageHandle) -> Option<&mut DamageParams> {
        self.damage.get_mut(handle)
    }

    fn end_damage_zone(&mut self, handle: DamageHandle) {
        self.damage.end(handle);
    }
}

impl SpatialQuery for World {
    fn any_entity_in_sphere(
        &self,
        sphere: Sphere,
        source: Option<EntityHandle>,
        filter: QueryFilter,
    ) -> bool {
        let source_group = source
            .and_then(|handle| self.entity(handle))
            .and_then(|entity| entity.group);
        self.live_entities().any(|(handle, entity)| {
            if Some(handle) == source {
                return false;
            }
            if filter.contains(QueryFilter::NO_SAME_GROUP)
                && source_group.is_some()
                && entity.group == source_group
            {
                return false;
            }
            if filter.contains(QueryFilter::NO_BACKGROUND)
                && entity.flags.contains(EntityFlags::BACKGROUND)
            {
                return false;
            }
            if filter.contains(QueryFilter::NO_ITEM) && entity.flags.contains(EntityFlags::ITEM) {
                return false;
            }
            if filter.contains(QueryFilter::NO_FIX) && entity.flags.contains(EntityFlags::FIX) {
                return false;
            }
            if filter.contains(QueryFilter::NO_DEAD) && entity.is_npc() && !entity.is_alive() {
                return false;
            }
            self.overlaps_sphere(entity, sphere)
        })
    }

    fn any_entity_in_cylinder(&self, cylinder: Cylinder, ignore: Option<EntityHandle>) -> bool {
        let (low, high) = if cylinder.height < 0.0 {
            (cylinder.origin.y + cylinder.height, cylinder.origin.y)
        } else {
            (cylinder.origin.y, cylinder.origin.y + cylinder.height)
        };
        let entity_hit = self.live_entities().any(|(handle, entity)| {
            if Some(handle) == ignore {
                return false;
            }
            let top = entity.pos.y + entity.height.min(0.0);
            let bottom = entity.pos.y + entity.height.max(0.0);
            bottom >= low
                && top <= high
                && horizontal_distance(entity.pos, cylinder.origin)
                    <= cylinder.radius + self.config.entity_radius
        });
        entity_hit
            || self.obstacles.iter().any(|obstacle| {
                obstacle.center.y + obstacle.radius >= low
                    && obstacle.center.y - obstacle.radius <= high
                    && horizontal_distance(obstacle.center, cylinder.origin)
                        <= cylinder.radius + obstacle.radius
            })
    }

    fn find_ground_position(&self, pos: Vec3) -> Option<Vec3> {
        if self
            .pits
            .iter()
            .any(|pit| horizontal_distance(pit.center, pos) <= pit.radius)
        {
            return None;
        }
        Some(Vec3::new(pos.x, self.config.ground_level, pos.z))
    }

    fn line_of_sight(&self, from: Vec3, to: Vec3) -> Option<Vec3> {
        let segment = to - from;
        let length_sq = segment.length_squared();
        if length_sq <= f32::EPSILON {
            return None;
        }
        self.obstacles
            .iter()
            .filter_map(|obstacle| {
                let offset = from - obstacle.center;
                let b = offset.dot(segment);
                let c = offset.length_squared() - obstacle.radius * obstacle.radius;
                let discriminant = b * b - length_sq * c;
                if discriminant < 0.0 {
                    return None;
                }
                let t = (-b - discriminant.sqrt()) / length_sq;
                (0.0..=1.0).contains(&t).then_some(t)
            })
            .min_by(f32::total_cmp)
            .map(|t| from + segment * t)
    }

    fn any_npc_on_platform(&self, center: Vec3, half_extent: f32) -> bool {
        self.live_entities().any(|(_, entity)| {
            entity.is_npc()
                && (entity.pos.x - center.x).abs() <= half_extent
                && (entity.pos.z - center.z).abs() <= half_extent
                && (entity.pos.y - center.y).abs() <= PLATFORM_VERTICAL_REACH
        })
    }

    fn sphere_visible(&self, sphere: Sphere) -> bool {
        let viewer = self
            .entity(EntityHandle::PLAYER)
            .map(|player| player.pos)
            .unwrap_or(Vec3::ZERO);
        viewer.distance(sphere.center) - sphere.radius <= self.config.view_distance
    }
}

impl LightPool for World {
    fn acquire_light(&mut self, light: DynamicLight) -> Option<LightHandle> {
        let handle = self.lights.acquire(light);
        if handle.is_none() {
            trace!("light pool exhausted");
        }
        handle
    }

    fn light_mut(&mut self, handle: LightHandle) -> Option<&mut DynamicLight> {
        self.lights.get_mut(handle)
    }

    fn is_light_valid(&self, handle: LightHandle) -> bool {
        self.lights.get(handle).is_some()
    }

    fn release_light(&mut self, handle: LightHandle) {
        self.lights.release(handle);
    }

    fn release_light_delayed(&mut self, handle: LightHandle, delay: Duration) {
        self.lights.release_delayed(handle, delay);
    }
}

impl SoundSystem for World {
    fn play_sound(&mut self, cue: SoundId, pos: Option<Vec3>) {
        self.mixer.play(cue, pos);
    }

    fn play_looped(&mut self, cue: SoundId, pos: Vec3, volume: f32) -> Option<SoundHandle> {
        let handle = self.mixer.start_loop(LoopedSound { cue, pos, volume });
        if handle.is_none() {
            trace!(?cue, "no free sound channel");
        }
        handle
    }

    fn set_sound_position(&mut self, handle: SoundHandle, pos: Vec3) {
        if let Some(sound) = self.mixer.get_mut(handle) {
            sound.pos = pos;
        }
    }

    fn stop_sound(&mut self, handle: SoundHandle) {
        self.mixer.stop(handle);
    }
}

impl Renderer for World {
    fn spawn_particle(&mut self, particle: ParticleParams) -> bool {
        self.render.spawn_particle(particle)
    }

    fn spawn_emitter(&mut self, kind: EmitterKind, pos: Vec3) -> Option<EmitterHandle> {
        self.render.spawn_emitter(kind, pos)
    }

    fn emitter_mut(&mut self, handle: EmitterHandle) -> Option<&mut Emitter> {
        self.render.emitter_mut(handle)
    }

    fn release_emitter(&mut self, handle: EmitterHandle) {
        self.render.release_emitter(handle);
    }

    fn draw_model(&mut self, draw: ModelDraw) {
        self.render.draw_model(draw);
    }

    fn draw_trail(&mut self, trail: TrailParams) {
        self.render.draw_trail(trail);
    }

    fn draw_bolt(&mut self, from: Vec3, to: Vec3, intensity: f32) {
        self.render.draw_bolt(Bolt {
            from,
            to,
            intensity,
        });
    }

    fn spawn_explosion(&mut self, pos: Vec3, scale: f32) {
        self.render
            .spawn_explosion(Explosion { pos, scale });
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Only clock advances concern the world itself; spell commands are executed
/// by the spellcasting system against the world's collaborator traits.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.advance(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::CastSpell { .. }
        | Command::EndSpell { .. }
        | Command::EndSpellsByCaster { .. }
        | Command::EndSpellsByTarget { .. } => {}
    }
}

/// Read-only queries over the world state.
pub mod query {
    use runecast_core::{
        services::ScriptEvent, DamageHandle, DamageParams, DynamicLight, Emitter, EmitterHandle,
        Entity, EntityHandle, LightHandle, ModelDraw, Player, SoundHandle, TrailParams,
    };

    use super::{Bolt, Explosion, LoopedSound, PlayedCue, World};

    /// Borrows a live entity.
    #[must_use]
    pub fn entity(world: &World, handle: EntityHandle) -> Option<&Entity> {
        world.slot(handle).and_then(|slot| slot.entity.as_ref())
    }

    /// Borrows the player's state.
    #[must_use]
    pub fn player(world: &World) -> &Player {
        &world.player
    }

    /// Borrows an owned light.
    #[must_use]
    pub fn light(world: &World, handle: LightHandle) -> Option<&DynamicLight> {
        world.lights.get(handle)
    }

    /// Number of lights currently owned by spells.
    #[must_use]
    pub fn owned_light_count(world: &World) -> usize {
        world.lights.owned_count()
    }

    /// Number of released lights still fading out.
    #[must_use]
    pub fn lingering_light_count(world: &World) -> usize {
        world.lights.lingering_count()
    }

    /// Every one-shot cue played so far.
    #[must_use]
    pub fn played_cues(world: &World) -> &[PlayedCue] {
        world.mixer.cues()
    }

    /// Looped cues currently playing.
    #[must_use]
    pub fn active_loops(world: &World) -> Vec<LoopedSound> {
        world.mixer.loops().copied().collect()
    }

    /// Borrows a playing loop.
    #[must_use]
    pub fn looped_sound(world: &World, handle: SoundHandle) -> Option<&LoopedSound> {
        world.mixer.get(handle)
    }

    /// Every one-shot spherical damage burst applied so far.
    #[must_use]
    pub fn damage_bursts(world: &World) -> &[DamageParams] {
        world.damage.bursts()
    }

    /// Borrows a live damage zone.
    #[must_use]
    pub fn damage_zone(world: &World, handle: DamageHandle) -> Option<&DamageParams> {
        world.damage.get(handle)
    }

    /// Number of live damage zones.
    #[must_use]
    pub fn damage_zone_count(world: &World) -> usize {
        world.damage.active_count()
    }

    /// Borrows a live emitter.
    #[must_use]
    pub fn emitter(world: &World, handle: EmitterHandle) -> Option<&Emitter> {
        world.render.emitter(handle)
    }

    /// Number of live emitters.
    #[must_use]
    pub fn live_emitter_count(world: &World) -> usize {
        world.render.live_emitters()
    }

    /// Meshes queued during the current frame.
    #[must_use]
    pub fn model_draws(world: &World) -> &[ModelDraw] {
        world.render.models()
    }

    /// Trails queued during the current frame.
    #[must_use]
    pub fn trails(world: &World) -> &[TrailParams] {
        world.render.trails()
    }

    /// Lightning bolts queued during the current frame.
    #[must_use]
    pub fn bolts(world: &World) -> &[Bolt] {
        world.render.bolts()
    }

    /// Every explosion spawned so far.
    #[must_use]
    pub fn explosions(world: &World) -> &[Explosion] {
        world.render.explosions()
    }

    /// Total number of particles spawned so far.
    #[must_use]
    pub fn particles_spawned(world: &World) -> usize {
        world.render.total_particles()
    }

    /// Script events delivered so far.
    #[must_use]
    pub fn script_events(world: &World) -> &[(EntityHandle, ScriptEvent)] {
        &world.script_events
    }

    /// Noises NPCs were notified about.
    #[must_use]
    pub fn audible_notifications(world: &World) -> &[(EntityHandle, glam::Vec3)] {
        &world.audible
    }

    /// Number of ticks the world has processed.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }
}
