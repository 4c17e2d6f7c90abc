//! Behaviour of every spell kind, grouped by what the spells do.

pub(crate) mod afflictions;
pub(crate) mod fields;
pub(crate) mod projectiles;
pub(crate) mod restoration;
pub(crate) mod summons;
pub(crate) mod wards;

use std::time::Duration;

use glam::Vec3;
use runecast_core::{forward_xz, DynamicLight, EntityHandle};

use crate::context::SpellContext;

/// Lights handed out with a lifetime expire in the pool unless re-acquired.
const FLICKER_LIFETIME: Duration = Duration::from_millis(200);

/// Light template with the fall-off most spells use.
fn spell_light(pos: Vec3, rgb: Vec3, intensity: f32) -> DynamicLight {
    DynamicLight {
        pos,
        rgb,
        intensity,
        fall_start: 200.0,
        fall_end: 350.0,
        duration: None,
    }
}

/// Offset that lifts an effect above an entity's feet in the Y-down world.
fn above(height: f32) -> Vec3 {
    Vec3::new(0.0, -height, 0.0)
}

/// Point `reach` units in front of a walking caster, or under a static one.
fn ahead_of_caster(cx: &SpellContext<'_>, caster: EntityHandle, reach: f32) -> Option<(Vec3, f32)> {
    let entity = cx.entity(caster)?;
    let heading = entity.orientation.heading;
    if caster.is_player() || entity.is_npc() {
        Some((entity.pos + forward_xz(heading) * reach, heading))
    } else {
        Some((entity.pos, heading))
    }
}
