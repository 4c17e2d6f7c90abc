//! Entity and player data exposed to spells through the collaborator traits.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{EntityHandle, Orientation};

bitflags::bitflags! {
    /// Classification and status flags carried by every entity.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EntityFlags: u16 {
        /// Entity is a non-player character with scripts and stats.
        const NPC           = 1 << 0;
        /// Entity is a fixed prop such as a door or a field.
        const FIX           = 1 << 1;
        /// Entity is an item lying in the world.
        const ITEM          = 1 << 2;
        /// Entity's scripts are frozen.
        const FREEZE_SCRIPT = 1 << 3;
        /// Entity is transient and must not be written to save games.
        const NO_SAVE       = 1 << 4;
        /// Entity is a spell-created force field.
        const FIELD         = 1 << 5;
        /// Entity is part of the loaded scene.
        const IN_SCENE      = 1 << 6;
        /// Entity is inside the active treatment zone around the player.
        const IN_TREAT_ZONE = 1 << 7;
        /// Entity is hidden from sight.
        const INVISIBLE     = 1 << 8;
        /// Entity belongs to the static background.
        const BACKGROUND    = 1 << 9;
    }
}

/// Current and maximum value of a replenishable stat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Current value.
    pub current: f32,
    /// Upper bound of `current`.
    pub max: f32,
}

impl Pool {
    /// Creates a full pool with the provided capacity.
    #[must_use]
    pub const fn full(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Adds to the pool without exceeding its maximum.
    pub fn restore(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }

    /// Removes from the pool, returning `false` without changes if too little remains.
    pub fn spend(&mut self, amount: f32) -> bool {
        if amount > self.current {
            return false;
        }
        self.current -= amount;
        true
    }
}

/// Coloured glow drawn around an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Halo {
    /// Whether the halo is drawn.
    pub active: bool,
    /// Colour of the halo.
    pub color: Vec3,
    /// Radius of the halo.
    pub radius: f32,
}

impl Halo {
    /// Creates an active halo.
    #[must_use]
    pub const fn glowing(color: Vec3, radius: f32) -> Self {
        Self {
            active: true,
            color,
            radius,
        }
    }
}

/// Mutable state of an entity stored in the world's entity table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entity {
    /// Template the entity was created from.
    pub template: String,
    /// Position of the entity's feet.
    pub pos: Vec3,
    /// Facing of the entity.
    pub orientation: Orientation,
    /// Classification and status flags.
    pub flags: EntityFlags,
    /// Faction group used to filter friendly fire.
    pub group: Option<u32>,
    /// Hit points.
    pub life: Pool,
    /// Mana points.
    pub mana: Pool,
    /// Accumulated poison.
    pub poison: f32,
    /// Chance in percent to resist hostile magic.
    pub resist_magic: f32,
    /// Halo currently drawn.
    pub halo: Halo,
    /// Halo restored when temporary halos end.
    pub native_halo: Halo,
    /// Whether the entity's scripts were loaded by a spell rather than the level.
    pub script_loaded: bool,
    /// Entity that summoned this one.
    pub summoner: Option<EntityHandle>,
    /// Entity this one is currently fighting.
    pub target: Option<EntityHandle>,
    /// Signed height of the entity's collision cylinder.
    pub height: f32,
    /// World positions of the entity's bone groups.
    pub bone_groups: Vec<Vec3>,
    /// World position of the primary hand attach point.
    pub hand: Option<Vec3>,
    /// World position of the left hand attach point.
    pub off_hand: Option<Vec3>,
    /// World position of the chest group.
    pub chest: Option<Vec3>,
    /// Whether the entity is in the middle of casting.
    pub casting: bool,
}

impl Entity {
    /// Reports whether the entity is an NPC.
    #[must_use]
    pub fn is_npc(&self) -> bool {
        self.flags.contains(EntityFlags::NPC)
    }

    /// Reports whether the entity has hit points left.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.life.current > 0.0
    }

    /// Position where spells hold their hand-cast effects.
    #[must_use]
    pub fn hand_or_pos(&self) -> Vec3 {
        self.hand.unwrap_or(self.pos)
    }

    /// Position of the chest, falling back to the feet.
    #[must_use]
    pub fn chest_or_pos(&self) -> Vec3 {
        self.chest.unwrap_or(self.pos)
    }
}

/// Parameters for spawning a new entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySpawn {
    /// Template to instantiate.
    pub template: String,
    /// Position of the new entity.
    pub pos: Vec3,
    /// Facing of the new entity.
    pub orientation: Orientation,
    /// Initial flags.
    pub flags: EntityFlags,
}

/// Lifecycle of the detached flying eye.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EyeballState {
    /// No eye exists.
    #[default]
    Gone,
    /// The eye is opening.
    Opening,
    /// The eye is floating and the view is routed through it.
    Open,
    /// The eye is closing and will disappear.
    Closing,
}

/// Detached eye the player can look through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Eyeball {
    /// Current lifecycle step.
    pub state: EyeballState,
    /// Position of the eye.
    pub pos: Vec3,
    /// Facing of the eye.
    pub orientation: Orientation,
    /// Vertical bobbing offset.
    pub floating: f32,
    /// Drawn scale of the eye.
    pub size: Vec3,
}

/// Player-only state spells read and write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Satiation from 0 to 100.
    pub hunger: f32,
    /// Whether the player floats.
    pub levitating: bool,
    /// Character level.
    pub level: f32,
    /// Chance in percent to resist hostile magic.
    pub resist_magic: f32,
    /// Whether mouse-look is toggled on.
    pub mouse_look: bool,
    /// Whether the player prefers permanent mouse-look.
    pub true_mouse_look: bool,
    /// Whether controls are blocked by a cinematic or menu.
    pub controls_blocked: bool,
    /// Maximum life including every modifier.
    pub full_max_life: f32,
    /// Detached eye state.
    pub eyeball: Eyeball,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            hunger: 50.0,
            levitating: false,
            level: 1.0,
            resist_magic: 0.0,
            mouse_look: false,
            true_mouse_look: false,
            controls_blocked: false,
            full_max_life: 100.0,
            eyeball: Eyeball::default(),
        }
    }
}
