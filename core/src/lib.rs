#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Runecast spell engine.
//!
//! This crate defines the message surface that connects hosts, the
//! authoritative world, and the spellcasting system. Hosts submit [`Command`]
//! values describing cast requests and clock advances, the spellcasting system
//! executes them against a [`services::SpellWorld`] and broadcasts [`Event`]
//! values describing every lifecycle transition. The collaborator traits in
//! [`services`] are the only way spells observe or mutate the world.

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub mod effects;
pub mod entity;
pub mod services;

pub use effects::{
    DamageFlags, DamageParams, DamageType, DynamicLight, Emitter, EmitterKind, ModelDraw, ModelId,
    ParticleParams, QueryFilter, SoundId, TrailParams,
};
pub use entity::{Entity, EntityFlags, EntitySpawn, Eyeball, EyeballState, Halo, Player, Pool};

macro_rules! generational_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $name {
            /// Creates a handle addressing the provided slot and generation.
            #[must_use]
            pub const fn new(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            /// Slot index addressed by the handle.
            #[must_use]
            pub const fn index(&self) -> u32 {
                self.index
            }

            /// Generation the slot carried when the handle was issued.
            #[must_use]
            pub const fn generation(&self) -> u32 {
                self.generation
            }
        }
    };
}

generational_handle!(
    /// Reference to an entity stored in the world's entity table.
    EntityHandle
);

impl EntityHandle {
    /// Handle reserved for the player-controlled entity.
    pub const PLAYER: Self = Self::new(0, 0);

    /// Reports whether the handle addresses the player-controlled entity.
    #[must_use]
    pub const fn is_player(&self) -> bool {
        self.index == 0 && self.generation == 0
    }
}

generational_handle!(
    /// Reference to a live spell instance held by the spell registry.
    SpellHandle
);

generational_handle!(
    /// Reference to a dynamic light slot.
    LightHandle
);

generational_handle!(
    /// Reference to a looped sound channel.
    SoundHandle
);

generational_handle!(
    /// Reference to a persistent damage zone.
    DamageHandle
);

generational_handle!(
    /// Reference to a particle emitter owned by a spell.
    EmitterHandle
);

/// Closed set of spell kinds the engine knows how to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpellKind {
    /// Heals living NPCs around the anchor, scaled by distance.
    Heal,
    /// Reveals traps around the player.
    DetectTrap,
    /// Protective halo that raises armour.
    Armor,
    /// Curse halo that lowers armour.
    LowerArmor,
    /// Damage aura that follows the caster.
    Harm,
    /// Speed boost with trails on the target.
    Speed,
    /// Ends nearby invisibility spells of equal or lower level.
    DispellIllusion,
    /// Charged fire projectile that explodes on contact.
    Fireball,
    /// Restores the player's hunger.
    CreateFood,
    /// Line of damaging icicles in front of the caster.
    IceProjectile,
    /// Stationary trap that explodes when something walks over it.
    RuneOfGuarding,
    /// Lets the target float above the ground.
    Levitate,
    /// Removes poison from the target.
    CurePoison,
    /// Ward that keeps undead away from the caster.
    RepelUndead,
    /// Fan of poisonous projectiles.
    PoisonProjectile,
    /// Raises an undead creature in front of the caster.
    RiseDead,
    /// Freezes the target's scripts.
    Paralyse,
    /// Spawns a blocking force field prop.
    CreateField,
    /// Weakens guarding runes around the player.
    DisarmTrap,
    /// Slows the target; casting it twice removes it.
    SlowDown,
    /// Detaches a floating eye the player looks through.
    FlyingEye,
    /// Burning field dealing damage over time.
    FireField,
    /// Frozen field dealing damage over time.
    IceField,
    /// Chained lightning bolt from the caster.
    LightningStrike,
    /// Confuses the target.
    Confuse,
    /// Sustained protection from fire damage.
    FireProtection,
    /// Sustained protection from cold damage.
    ColdProtection,
    /// Hides the target from sight.
    Invisibility,
    /// Drains life from the caster's enemies.
    LifeDrain,
    /// Drains mana from the caster's enemies.
    ManaDrain,
}

impl SpellKind {
    /// Every spell kind in declaration order.
    pub const ALL: [SpellKind; 30] = [
        SpellKind::Heal,
        SpellKind::DetectTrap,
        SpellKind::Armor,
        SpellKind::LowerArmor,
        SpellKind::Harm,
        SpellKind::Speed,
        SpellKind::DispellIllusion,
        SpellKind::Fireball,
        SpellKind::CreateFood,
        SpellKind::IceProjectile,
        SpellKind::RuneOfGuarding,
        SpellKind::Levitate,
        SpellKind::CurePoison,
        SpellKind::RepelUndead,
        SpellKind::PoisonProjectile,
        SpellKind::RiseDead,
        SpellKind::Paralyse,
        SpellKind::CreateField,
        SpellKind::DisarmTrap,
        SpellKind::SlowDown,
        SpellKind::FlyingEye,
        SpellKind::FireField,
        SpellKind::IceField,
        SpellKind::LightningStrike,
        SpellKind::Confuse,
        SpellKind::FireProtection,
        SpellKind::ColdProtection,
        SpellKind::Invisibility,
        SpellKind::LifeDrain,
        SpellKind::ManaDrain,
    ];

    /// Reports whether the kind is one of the sustained aura spells.
    #[must_use]
    pub const fn is_sustained_aura(self) -> bool {
        matches!(
            self,
            SpellKind::FireProtection
                | SpellKind::ColdProtection
                | SpellKind::Invisibility
                | SpellKind::LifeDrain
                | SpellKind::ManaDrain
        )
    }
}

bitflags::bitflags! {
    /// Cast-time modifiers attached to a [`CastRequest`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CastFlags: u8 {
        /// Suppresses one-shot and looped audio cues emitted at launch.
        const NO_SOUND = 1 << 0;
        /// Rebuilds a spell from persisted state at a non-zero elapsed offset.
        const RESTORE  = 1 << 1;
    }
}

/// Parameters describing a single cast handed to the spellcasting system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CastRequest {
    /// Kind of spell to launch.
    pub kind: SpellKind,
    /// Entity initiating the cast.
    pub caster: EntityHandle,
    /// Entity receiving the spell, when one was selected.
    pub target: Option<EntityHandle>,
    /// Potency of the spell.
    pub level: f32,
    /// Cast-time modifiers.
    pub flags: CastFlags,
    /// Explicit duration that overrides the per-kind default.
    pub launch_duration: Option<Duration>,
    /// Elapsed time the spell resumes from when [`CastFlags::RESTORE`] is set.
    pub restore_offset: Duration,
}

impl CastRequest {
    /// Creates a request with no target, no flags and the per-kind duration.
    #[must_use]
    pub fn new(kind: SpellKind, caster: EntityHandle, level: f32) -> Self {
        Self {
            kind,
            caster,
            target: None,
            level,
            flags: CastFlags::empty(),
            launch_duration: None,
            restore_offset: Duration::ZERO,
        }
    }

    /// Aims the spell at the provided entity.
    #[must_use]
    pub fn with_target(mut self, target: EntityHandle) -> Self {
        self.target = Some(target);
        self
    }

    /// Adds cast-time modifiers to the request.
    #[must_use]
    pub fn with_flags(mut self, flags: CastFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Overrides the per-kind default duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.launch_duration = Some(duration);
        self
    }

    /// Marks the request as a restore that resumes at the provided offset.
    #[must_use]
    pub fn restore_at(mut self, offset: Duration) -> Self {
        self.flags |= CastFlags::RESTORE;
        self.restore_offset = offset;
        self
    }

    /// Reports whether the request rebuilds a persisted spell.
    #[must_use]
    pub fn is_restore(&self) -> bool {
        self.flags.contains(CastFlags::RESTORE)
    }
}

/// Commands that express every permissible mutation of the spell engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Requests a new spell cast.
    CastSpell {
        /// Parameters of the cast.
        request: CastRequest,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Forces a live spell through its end sequence.
    EndSpell {
        /// Spell to terminate.
        spell: SpellHandle,
    },
    /// Ends every spell of a kind cast by the provided entity.
    EndSpellsByCaster {
        /// Entity that cast the spells.
        caster: EntityHandle,
        /// Kind of spell to terminate.
        kind: SpellKind,
    },
    /// Ends every spell of a kind affecting the provided entity.
    EndSpellsByTarget {
        /// Entity affected by the spells.
        target: EntityHandle,
        /// Kind of spell to terminate.
        kind: SpellKind,
    },
}

/// Reason a spell left the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    /// Elapsed time reached the spell's duration.
    Expired,
    /// Another spell or an explicit command terminated the spell.
    Cancelled,
    /// The caster could not pay the spell's upkeep.
    ManaDepleted,
    /// The caster left the world while the spell still cost upkeep.
    CasterLost,
}

/// Events broadcast after the spell engine processes commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a spell passed its guard and was registered.
    SpellLaunched {
        /// Handle assigned to the new spell.
        spell: SpellHandle,
        /// Kind of spell that launched.
        kind: SpellKind,
        /// Entity that cast the spell.
        caster: EntityHandle,
    },
    /// Reports that a spell's guard refused the cast.
    SpellVetoed {
        /// Kind of spell that was refused.
        kind: SpellKind,
        /// Entity that attempted the cast.
        caster: EntityHandle,
    },
    /// Reports that a cast could not be registered.
    SpellFizzled {
        /// Kind of spell that fizzled.
        kind: SpellKind,
        /// Entity that attempted the cast.
        caster: EntityHandle,
    },
    /// Confirms that a spell ran its end sequence and left the registry.
    SpellEnded {
        /// Handle the spell was registered under.
        spell: SpellHandle,
        /// Kind of spell that ended.
        kind: SpellKind,
        /// Why the spell ended.
        reason: EndReason,
    },
}

/// Heading and elevation of an entity, both expressed in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    /// Rotation around the vertical axis.
    pub heading: f32,
    /// Rotation above or below the horizon.
    pub elevation: f32,
}

impl Orientation {
    /// Creates an orientation from heading and elevation in degrees.
    #[must_use]
    pub const fn new(heading: f32, elevation: f32) -> Self {
        Self { heading, elevation }
    }

    /// Unit vector the orientation faces.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        direction_from(self.elevation, self.heading)
    }
}

/// Sphere used by spatial and damage queries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Centre of the sphere.
    pub center: Vec3,
    /// Radius of the sphere.
    pub radius: f32,
}

impl Sphere {
    /// Creates a sphere from its centre and radius.
    #[must_use]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Reports whether the point lies inside the sphere.
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }
}

/// Vertical cylinder used by occupancy checks.
///
/// The world is Y-down, so a negative `height` extends the cylinder upwards
/// from its `origin`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    /// Centre of the cylinder's base.
    pub origin: Vec3,
    /// Radius of the cylinder.
    pub radius: f32,
    /// Signed extent along the Y axis.
    pub height: f32,
}

impl Cylinder {
    /// Creates a cylinder from its base, radius and signed height.
    #[must_use]
    pub const fn new(origin: Vec3, radius: f32, height: f32) -> Self {
        Self {
            origin,
            radius,
            height,
        }
    }

    /// Reports whether the point lies inside the cylinder.
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        let (low, high) = if self.height < 0.0 {
            (self.origin.y + self.height, self.origin.y)
        } else {
            (self.origin.y, self.origin.y + self.height)
        };
        if point.y < low || point.y > high {
            return false;
        }
        horizontal_distance(self.origin, point) <= self.radius
    }
}

/// Unit vector on the XZ plane for a heading in degrees.
#[must_use]
pub fn forward_xz(heading: f32) -> Vec3 {
    let radians = heading.to_radians();
    Vec3::new(-radians.sin(), 0.0, radians.cos())
}

/// Unit vector for an elevation and heading in degrees.
///
/// Positive elevation points down because the world is Y-down.
#[must_use]
pub fn direction_from(elevation: f32, heading: f32) -> Vec3 {
    let heading = heading.to_radians();
    let elevation = elevation.to_radians();
    Vec3::new(
        -heading.sin() * elevation.cos(),
        elevation.sin(),
        heading.cos() * elevation.cos(),
    )
}

/// Elevation in degrees needed to aim from one point at another.
#[must_use]
pub fn elevation_towards(from: Vec3, to: Vec3) -> f32 {
    (to.y - from.y)
        .atan2(horizontal_distance(from, to))
        .to_degrees()
}

/// Heading in degrees needed to face from one point towards another.
#[must_use]
pub fn heading_towards(from: Vec3, to: Vec3) -> f32 {
    let delta = to - from;
    (-delta.x).atan2(delta.z).to_degrees()
}

/// Distance between two points ignoring the vertical axis.
#[must_use]
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

/// Position just in front of an entity at chest height.
#[must_use]
pub fn front_position(pos: Vec3, heading: f32) -> Vec3 {
    pos + forward_xz(heading) * 100.0 + Vec3::new(0.0, 100.0, 0.0)
}

/// Converts a duration to fractional milliseconds.
#[must_use]
pub fn millis(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}

/// Builds a duration from fractional milliseconds, clamping negatives to zero.
#[must_use]
pub fn from_millis(value: f32) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(f64::from(value) / 1000.0)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::{
        direction_from, elevation_towards, forward_xz, from_millis, heading_towards, millis,
        CastFlags, CastRequest, Cylinder, EntityHandle, SpellKind, Sphere,
    };
    use glam::Vec3;
    use serde::{de::DeserializeOwned, Serialize};
    use std::time::Duration;

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn cast_request_round_trips_through_bincode() {
        let request = CastRequest::new(SpellKind::CreateField, EntityHandle::new(3, 1), 4.0)
            .with_target(EntityHandle::PLAYER)
            .with_flags(CastFlags::NO_SOUND)
            .restore_at(Duration::from_millis(4000));
        assert_round_trip(&request);
    }

    #[test]
    fn restore_marks_the_request() {
        let request =
            CastRequest::new(SpellKind::FlyingEye, EntityHandle::PLAYER, 1.0).restore_at(
                Duration::from_millis(250),
            );
        assert!(request.is_restore());
        assert_eq!(request.restore_offset, Duration::from_millis(250));
        assert!(!CastRequest::new(SpellKind::Heal, EntityHandle::PLAYER, 1.0).is_restore());
    }

    #[test]
    fn player_handle_is_recognised() {
        assert!(EntityHandle::PLAYER.is_player());
        assert!(!EntityHandle::new(0, 1).is_player());
        assert!(!EntityHandle::new(4, 0).is_player());
    }

    #[test]
    fn forward_vector_follows_heading() {
        let ahead = forward_xz(0.0);
        assert!((ahead - Vec3::Z).length() < 1e-5, "heading 0 faces +Z");
        let quarter = forward_xz(90.0);
        assert!((quarter - Vec3::NEG_X).length() < 1e-5, "heading 90 faces -X");
    }

    #[test]
    fn elevation_and_heading_reconstruct_direction() {
        let from = Vec3::new(10.0, 0.0, 10.0);
        let to = Vec3::new(-40.0, -50.0, 60.0);
        let direction = direction_from(elevation_towards(from, to), heading_towards(from, to));
        let expected = (to - from).normalize();
        assert!(
            (direction - expected).length() < 1e-4,
            "direction {direction:?} should match {expected:?}"
        );
    }

    #[test]
    fn sustained_aura_kinds_are_flagged() {
        let auras: Vec<SpellKind> = SpellKind::ALL
            .iter()
            .copied()
            .filter(|kind| kind.is_sustained_aura())
            .collect();
        assert_eq!(auras.len(), 5);
        assert!(!SpellKind::Armor.is_sustained_aura());
    }

    #[test]
    fn cylinder_extends_upwards_with_negative_height() {
        let cylinder = Cylinder::new(Vec3::new(0.0, 100.0, 0.0), 50.0, -200.0);
        assert!(cylinder.contains(Vec3::new(10.0, 0.0, 10.0)));
        assert!(!cylinder.contains(Vec3::new(10.0, 150.0, 10.0)));
        assert!(!cylinder.contains(Vec3::new(60.0, 50.0, 0.0)));
    }

    #[test]
    fn sphere_contains_its_surface() {
        let sphere = Sphere::new(Vec3::ZERO, 10.0);
        assert!(sphere.contains(Vec3::new(10.0, 0.0, 0.0)));
        assert!(!sphere.contains(Vec3::new(10.1, 0.0, 0.0)));
    }

    #[test]
    fn millisecond_conversions_clamp_negative_values() {
        assert_eq!(from_millis(-5.0), Duration::ZERO);
        assert_eq!(from_millis(f32::NAN), Duration::ZERO);
        assert!((millis(Duration::from_millis(1500)) - 1500.0).abs() < 1e-3);
    }
}
