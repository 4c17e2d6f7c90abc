//! Collaborator interfaces spells use to observe and mutate the world.
//!
//! Every handle-taking method tolerates stale or unknown handles: queries
//! return `None`/`false` and mutations become no-ops. Spells must re-check
//! validity each tick instead of caching references across frames.

use std::time::Duration;

use glam::Vec3;

use crate::{
    effects::{
        DamageParams, DynamicLight, Emitter, EmitterKind, ModelDraw, ParticleParams, QueryFilter,
        SoundId, TrailParams,
    },
    entity::{Entity, EntitySpawn, Player},
    Cylinder, DamageHandle, EmitterHandle, EntityHandle, LightHandle, SoundHandle, Sphere,
};

/// Script events spells deliver to entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptEvent {
    /// Entity scripts were attached.
    Init,
    /// Entity scripts finished initialising.
    InitEnd,
    /// Entity was summoned by a spell.
    Summoned,
}

/// Access to the entity table.
pub trait Entities {
    /// Reports whether the handle addresses a live entity.
    fn is_valid(&self, handle: EntityHandle) -> bool {
        self.entity(handle).is_some()
    }

    /// Borrows a live entity.
    fn entity(&self, handle: EntityHandle) -> Option<&Entity>;

    /// Mutably borrows a live entity.
    fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity>;

    /// Handles of every live entity in table order.
    fn entity_handles(&self) -> Vec<EntityHandle>;

    /// Creates a new entity, returning `None` when the table is full or the template is unknown.
    fn spawn_entity(&mut self, spawn: EntitySpawn) -> Option<EntityHandle>;

    /// Removes an entity from the world.
    fn destroy_entity(&mut self, handle: EntityHandle);

    /// Delivers a script event to an entity.
    fn send_script_event(&mut self, handle: EntityHandle, event: ScriptEvent);

    /// Lets NPCs near `pos` hear a noise made by `source`.
    fn notify_audible(&mut self, source: EntityHandle, pos: Vec3);

    /// Aborts the entity's current spell incantation.
    fn interrupt_casting(&mut self, handle: EntityHandle);
}

/// Explicit access to player-only state.
pub trait PlayerState {
    /// Borrows the player's state.
    fn player(&self) -> &Player;

    /// Mutably borrows the player's state.
    fn player_mut(&mut self) -> &mut Player;
}

/// Area damage and persistent damage zones.
pub trait DamageService {
    /// Applies a one-shot spherical damage burst.
    fn apply_spheric_damage(&mut self, params: DamageParams);

    /// Creates a zone that keeps damaging its area.
    fn create_damage_zone(&mut self, params: DamageParams) -> Option<DamageHandle>;

    /// Mutably borrows a live damage zone.
    fn damage_zone_mut(&mut self, handle: DamageHandle) -> Option<&mut DamageParams>;

    /// Stops a damage zone.
    fn end_damage_zone(&mut self, handle: DamageHandle);
}

/// Spatial queries over entities and level geometry.
pub trait SpatialQuery {
    /// Reports whether any entity other than `source` overlaps the sphere.
    fn any_entity_in_sphere(
        &self,
        sphere: Sphere,
        source: Option<EntityHandle>,
        filter: QueryFilter,
    ) -> bool;

    /// Reports whether any entity or obstacle other than `ignore` overlaps the cylinder.
    fn any_entity_in_cylinder(&self, cylinder: Cylinder, ignore: Option<EntityHandle>) -> bool;

    /// Projects a point onto the walkable ground below it.
    fn find_ground_position(&self, pos: Vec3) -> Option<Vec3>;

    /// Returns the first blocking point between two positions, or `None` when the path is clear.
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> Option<Vec3>;

    /// Reports whether any NPC stands on the square platform centred at `center`.
    fn any_npc_on_platform(&self, center: Vec3, half_extent: f32) -> bool;

    /// Reports whether the sphere is close enough to the viewer to be drawn.
    fn sphere_visible(&self, sphere: Sphere) -> bool;
}

/// Bounded pool of dynamic lights.
pub trait LightPool {
    /// Claims a free light slot initialised with `light`.
    fn acquire_light(&mut self, light: DynamicLight) -> Option<LightHandle>;

    /// Mutably borrows a claimed light.
    fn light_mut(&mut self, handle: LightHandle) -> Option<&mut DynamicLight>;

    /// Reports whether the handle still owns its slot.
    fn is_light_valid(&self, handle: LightHandle) -> bool;

    /// Frees the light immediately.
    fn release_light(&mut self, handle: LightHandle);

    /// Gives up ownership now and frees the slot after `delay`.
    fn release_light_delayed(&mut self, handle: LightHandle, delay: Duration);
}

/// Audio playback.
pub trait SoundSystem {
    /// Plays a one-shot cue, optionally positioned.
    fn play_sound(&mut self, cue: SoundId, pos: Option<Vec3>);

    /// Starts a looped cue, returning `None` when no channel is free.
    fn play_looped(&mut self, cue: SoundId, pos: Vec3, volume: f32) -> Option<SoundHandle>;

    /// Moves a looped cue.
    fn set_sound_position(&mut self, handle: SoundHandle, pos: Vec3);

    /// Stops a looped cue.
    fn stop_sound(&mut self, handle: SoundHandle);
}

/// Visual effects.
pub trait Renderer {
    /// Spawns a fire-and-forget particle, returning `false` when the budget is spent.
    fn spawn_particle(&mut self, particle: ParticleParams) -> bool;

    /// Starts a particle emitter.
    fn spawn_emitter(&mut self, kind: EmitterKind, pos: Vec3) -> Option<EmitterHandle>;

    /// Mutably borrows a live emitter.
    fn emitter_mut(&mut self, handle: EmitterHandle) -> Option<&mut Emitter>;

    /// Stops an emitter.
    fn release_emitter(&mut self, handle: EmitterHandle);

    /// Queues a mesh for the current frame.
    fn draw_model(&mut self, draw: ModelDraw);

    /// Queues a ribbon trail for the current frame.
    fn draw_trail(&mut self, trail: TrailParams);

    /// Queues a lightning bolt between two points for the current frame.
    fn draw_bolt(&mut self, from: Vec3, to: Vec3, intensity: f32);

    /// Spawns a fiery explosion.
    fn spawn_explosion(&mut self, pos: Vec3, scale: f32);
}

/// Every collaborator a spell may talk to.
pub trait SpellWorld:
    Entities + PlayerState + DamageService + SpatialQuery + LightPool + SoundSystem + Renderer
{
}

impl<T> SpellWorld for T where
    T: Entities
        + PlayerState
        + DamageService
        + SpatialQuery
        + LightPool
        + SoundSystem
        + Renderer
        + ?Sized
{
}
