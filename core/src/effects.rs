//! Descriptors spells hand to the light, sound, damage and render collaborators.

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{EntityHandle, Orientation};

/// Dynamic light parameters stored in a light pool slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicLight {
    /// Position of the light.
    pub pos: Vec3,
    /// Colour of the light.
    pub rgb: Vec3,
    /// Brightness multiplier.
    pub intensity: f32,
    /// Distance at which the light starts to fade.
    pub fall_start: f32,
    /// Distance at which the light is fully faded.
    pub fall_end: f32,
    /// Lifetime after which the pool reclaims the slot on its own.
    pub duration: Option<Duration>,
}

impl Default for DynamicLight {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            rgb: Vec3::ONE,
            intensity: 1.0,
            fall_start: 100.0,
            fall_end: 200.0,
            duration: None,
        }
    }
}

/// Audio cues spells trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum SoundId {
    MagicFizzle,
    Interface,
    Heal,
    DetectTrapLoop,
    ArmorStart,
    ArmorLoop,
    ArmorEnd,
    LowerArmor,
    LowerArmorLoop,
    LowerArmorEnd,
    Harm,
    MagicalShield,
    SpeedStart,
    SpeedLoop,
    SpeedEnd,
    DispellIllusion,
    FireLaunch,
    FireWind,
    FireHit,
    CreateFood,
    IceProjectileLaunch,
    RuneOfGuarding,
    RuneOfGuardingEnd,
    LevitateStart,
    LevitateLoop,
    LevitateEnd,
    CurePoison,
    RepelUndead,
    RepelUndeadLoop,
    PoisonProjectileLaunch,
    RiseDeadStart,
    RiseDeadLoop,
    RiseDeadEnd,
    Electric,
    Paralyse,
    ParalyseEnd,
    CreateField,
    DisarmTrap,
    SlowDown,
    SlowDownLoop,
    SlowDownEnd,
    FlyingEyeIn,
    FlyingEyeOut,
    FireFieldStart,
    FireFieldLoop,
    FireFieldEnd,
    IceField,
    IceFieldLoop,
    IceFieldEnd,
    LightningStart,
    LightningLoop,
    LightningEnd,
    Confuse,
    AuraStart,
    AuraLoop,
    AuraEnd,
}

bitflags::bitflags! {
    /// Behaviour modifiers of a damage request.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DamageFlags: u8 {
        /// The source entity is never hurt.
        const DONT_HURT_SOURCE = 1 << 0;
        /// The zone moves with its source entity.
        const FOLLOW_SOURCE    = 1 << 1;
        /// Victims get a hit visual.
        const ADD_VISUAL_FX    = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Elemental classification of damage.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DamageType: u8 {
        /// Burning damage.
        const FIRE      = 1 << 0;
        /// Magical damage.
        const MAGICAL   = 1 << 1;
        /// Freezing damage.
        const COLD      = 1 << 2;
        /// Poisonous damage.
        const POISON    = 1 << 3;
        /// Damage from a spell field.
        const FIELD     = 1 << 4;
        /// Fire visuals without burning.
        const FAKEFIRE  = 1 << 5;
        /// Electrical damage.
        const LIGHTNING = 1 << 6;
    }
}

/// Area damage request, either one-shot or persistent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageParams {
    /// Centre of the damaged area.
    pub pos: Vec3,
    /// Radius of the damaged area.
    pub radius: f32,
    /// Damage dealt, per second for persistent zones.
    pub amount: f32,
    /// Lifetime of a persistent zone; `None` lasts until ended.
    pub duration: Option<Duration>,
    /// Entity credited with the damage.
    pub source: Option<EntityHandle>,
    /// Behaviour modifiers.
    pub flags: DamageFlags,
    /// Elemental classification.
    pub kind: DamageType,
}

impl DamageParams {
    /// Creates a request with no source, no flags and no lifetime.
    #[must_use]
    pub fn new(pos: Vec3, radius: f32, amount: f32, kind: DamageType) -> Self {
        Self {
            pos,
            radius,
            amount,
            duration: None,
            source: None,
            flags: DamageFlags::empty(),
            kind,
        }
    }

    /// Credits the damage to the provided entity.
    #[must_use]
    pub fn from_source(mut self, source: EntityHandle) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds behaviour modifiers.
    #[must_use]
    pub fn with_flags(mut self, flags: DamageFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Limits the lifetime of a persistent zone.
    #[must_use]
    pub fn lasting(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

bitflags::bitflags! {
    /// Exclusions applied by spatial occupancy queries.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct QueryFilter: u8 {
        /// Ignores entities sharing the source's faction group.
        const NO_SAME_GROUP = 1 << 0;
        /// Ignores background geometry.
        const NO_BACKGROUND = 1 << 1;
        /// Ignores items.
        const NO_ITEM       = 1 << 2;
        /// Ignores fixed props.
        const NO_FIX        = 1 << 3;
        /// Ignores dead entities.
        const NO_DEAD       = 1 << 4;
    }
}

/// Single short-lived particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleParams {
    /// Spawn position.
    pub pos: Vec3,
    /// Velocity in units per millisecond.
    pub velocity: Vec3,
    /// Drawn size.
    pub size: f32,
    /// Lifetime.
    pub lifetime: Duration,
    /// Colour.
    pub rgb: Vec3,
}

impl ParticleParams {
    /// Creates a still white particle.
    #[must_use]
    pub fn at(pos: Vec3, size: f32, lifetime: Duration) -> Self {
        Self {
            pos,
            velocity: Vec3::ZERO,
            size,
            lifetime,
            rgb: Vec3::ONE,
        }
    }

    /// Sets the particle's velocity.
    #[must_use]
    pub fn moving(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Sets the particle's colour.
    #[must_use]
    pub fn tinted(mut self, rgb: Vec3) -> Self {
        self.rgb = rgb;
        self
    }
}

/// Particle emitters spells keep alive across frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EmitterKind {
    HealSparkles,
    CurePoisonSparkles,
    CreateFoodSparkles,
    FireFieldFlames,
    RiseDeadFissure,
}

/// Emitter state stored by the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emitter {
    /// Effect emitted.
    pub kind: EmitterKind,
    /// Emission point.
    pub pos: Vec3,
    /// Opacity from 0 to 1.
    pub alpha: f32,
}

/// Meshes spells draw each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ModelId {
    Cabal,
    RepelRing,
    Icicle,
    IcicleSmall,
    LevitateCone,
    FieldCube,
    Butterfly,
    Eyeball,
    RuneHalo,
    RuneSeal,
    RuneGlyph,
}

/// Single mesh draw request for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelDraw {
    /// Mesh to draw.
    pub model: ModelId,
    /// Position of the mesh.
    pub pos: Vec3,
    /// Rotation of the mesh.
    pub orientation: Orientation,
    /// Scale per axis.
    pub scale: Vec3,
    /// Tint.
    pub rgb: Vec3,
}

impl ModelDraw {
    /// Creates an untinted, unscaled draw.
    #[must_use]
    pub fn new(model: ModelId, pos: Vec3) -> Self {
        Self {
            model,
            pos,
            orientation: Orientation::default(),
            scale: Vec3::ONE,
            rgb: Vec3::ONE,
        }
    }

    /// Sets the draw's rotation.
    #[must_use]
    pub fn oriented(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets the draw's scale.
    #[must_use]
    pub fn scaled(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the draw's tint.
    #[must_use]
    pub fn tinted(mut self, rgb: Vec3) -> Self {
        self.rgb = rgb;
        self
    }
}

/// Ribbon trail drawn behind a moving point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailParams {
    /// Head of the trail.
    pub head: Vec3,
    /// Length of the ribbon.
    pub length: f32,
    /// Width of the ribbon.
    pub size: f32,
    /// Colour of the ribbon.
    pub rgb: Vec3,
}
