//! Handle helpers shared by the spell kinds.
//!
//! Every helper checks the handle against its pool before touching it, so a
//! slot recycled by the pool or never granted degrades to a no-op.

use std::time::Duration;

use glam::Vec3;
use runecast_core::{
    services::SpellWorld, DynamicLight, EmitterHandle, EmitterKind, LightHandle, SoundHandle,
    SoundId,
};

use tracing::debug;

use crate::instance::SpellState;

/// Returns the light held in `slot`, acquiring a fresh one from `seed` when the
/// previous handle was never granted or has been reclaimed.
pub(crate) fn ensure_light<'w>(
    world: &'w mut dyn SpellWorld,
    slot: &mut Option<LightHandle>,
    seed: DynamicLight,
) -> Option<&'w mut DynamicLight> {
    if !slot.is_some_and(|handle| world.is_light_valid(handle)) {
        *slot = world.acquire_light(seed);
    }
    let handle = (*slot)?;
    world.light_mut(handle)
}

/// Borrows the light in `slot` without acquiring a new one.
pub(crate) fn light_mut<'w>(
    world: &'w mut dyn SpellWorld,
    slot: Option<LightHandle>,
) -> Option<&'w mut DynamicLight> {
    world.light_mut(slot?)
}

/// Gives up the light in `slot`, fading it out over `delay` when provided.
pub(crate) fn release_light(
    world: &mut dyn SpellWorld,
    slot: &mut Option<LightHandle>,
    delay: Option<Duration>,
) {
    let Some(handle) = slot.take() else {
        return;
    };
    if !world.is_light_valid(handle) {
        return;
    }
    match delay {
        Some(delay) => world.release_light_delayed(handle, delay),
        None => world.release_light(handle),
    }
}

/// Stops the loop in `slot`.
pub(crate) fn stop_loop(world: &mut dyn SpellWorld, slot: &mut Option<SoundHandle>) {
    if let Some(handle) = slot.take() {
        world.stop_sound(handle);
    }
}

pub(crate) fn follow_loop(world: &mut dyn SpellWorld, slot: Option<SoundHandle>, pos: Vec3) {
    if let Some(handle) = slot {
        world.set_sound_position(handle, pos);
    }
}

/// Plays a one-shot cue unless the cast was muted.
pub(crate) fn cue(world: &mut dyn SpellWorld, state: &SpellState, cue: SoundId, pos: Vec3) {
    if state.plays_sound() {
        world.play_sound(cue, Some(pos));
    }
}

/// Starts a loop unless the cast was muted.
pub(crate) fn start_loop(
    world: &mut dyn SpellWorld,
    state: &SpellState,
    cue: SoundId,
    pos: Vec3,
    volume: f32,
) -> Option<SoundHandle> {
    if state.plays_sound() {
        world.play_looped(cue, pos, volume)
    } else {
        None
    }
}

/// Starts `kind` at `pos` in `slot`, giving back whatever emitter the slot held.
///
/// The slot stays empty when the renderer has no emitter left.
pub(crate) fn attach_emitter(
    world: &mut dyn SpellWorld,
    slot: &mut Option<EmitterHandle>,
    kind: EmitterKind,
    pos: Vec3,
) {
    release_emitter(world, slot);
    *slot = world.spawn_emitter(kind, pos);
    if slot.is_none() {
        debug!(?kind, "emitter pool exhausted");
    }
}

/// Moves and fades the emitter in `slot`.
pub(crate) fn update_emitter(
    world: &mut dyn SpellWorld,
    slot: Option<EmitterHandle>,
    pos: Vec3,
    alpha: f32,
) {
    let Some(emitter) = slot.and_then(|handle| world.emitter_mut(handle)) else {
        return;
    };
    emitter.pos = pos;
    emitter.alpha = alpha.clamp(0.0, 1.0);
}

pub(crate) fn release_emitter(world: &mut dyn SpellWorld, slot: &mut Option<EmitterHandle>) {
    if let Some(handle) = slot.take() {
        world.release_emitter(handle);
    }
}

/// Opacity of an effect fading out over the last `window` of `duration`.
pub(crate) fn fade_out(elapsed: Duration, duration: Duration, window: Duration) -> f32 {
    let remaining = duration.saturating_sub(elapsed);
    if remaining >= window || window.is_zero() {
        1.0
    } else {
        remaining.as_secs_f32() / window.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::Vec3;
    use runecast_core::EmitterKind;
    use runecast_world::{query, World, WorldConfig};

    use super::{attach_emitter, fade_out, release_emitter};

    #[test]
    fn fade_holds_until_the_window_opens() {
        let duration = Duration::from_millis(3500);
        let window = Duration::from_millis(1500);
        assert_eq!(fade_out(Duration::from_millis(1000), duration, window), 1.0);
        let half = fade_out(Duration::from_millis(2750), duration, window);
        assert!((half - 0.5).abs() < 1e-4, "halfway through the fade: {half}");
        assert_eq!(fade_out(duration, duration, window), 0.0);
    }

    #[test]
    fn attaching_twice_keeps_a_single_emitter() {
        let mut world = World::new();
        let mut slot = None;
        attach_emitter(&mut world, &mut slot, EmitterKind::HealSparkles, Vec3::ZERO);
        let first = slot;
        attach_emitter(&mut world, &mut slot, EmitterKind::HealSparkles, Vec3::X);
        assert_ne!(slot, first);
        assert_eq!(query::live_emitter_count(&world), 1);
        assert_eq!(
            slot.and_then(|handle| query::emitter(&world, handle)).map(|emitter| emitter.pos),
            Some(Vec3::X)
        );

        release_emitter(&mut world, &mut slot);
        assert_eq!(slot, None);
        assert_eq!(query::live_emitter_count(&world), 0);
    }

    #[test]
    fn exhausted_pool_leaves_the_slot_empty() {
        let mut world = World::with_config(WorldConfig {
            emitter_capacity: 0,
            ..WorldConfig::default()
        });
        let mut slot = None;
        attach_emitter(&mut world, &mut slot, EmitterKind::FireFieldFlames, Vec3::ZERO);
        assert_eq!(slot, None);
    }
}
