#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spell lifecycle driver for the Runecast engine.
//!
//! [`Spellcasting`] owns the bounded [`SpellRegistry`] and the random stream
//! shared by every spell. Casts run the kind's guard, launch it and register
//! the instance; every tick advances each live spell, drains its upkeep from
//! the caster and reaps the spells whose time ran out. All observable
//! transitions are reported as [`Event`] values.

mod config;
mod context;
mod effects;
mod instance;
mod kinds;
mod registry;

use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use runecast_core::{
    millis, services::SpellWorld, CastRequest, Command, EndReason, EntityHandle, Event,
    SpellHandle, SpellKind, SoundId,
};
use thiserror::Error;
use tracing::{debug, trace, warn};

pub use config::{ConfigError, SpellcastingConfig};
pub use instance::{SpellInstance, SpellState};
pub use registry::SpellRegistry;

use crate::context::{Frame, SpellContext};

/// Result of a cast that did not fail outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastOutcome {
    /// The spell launched and lives under the provided handle.
    Launched(SpellHandle),
    /// The spell's guard refused the cast.
    Vetoed,
}

/// Errors surfaced to whoever requested a cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CastError {
    /// Every registry slot is taken.
    #[error("spell registry is full ({capacity} spells)")]
    RegistryFull {
        /// Capacity of the registry.
        capacity: usize,
    },
}

/// Owns every live spell and drives their lifecycle.
#[derive(Debug)]
pub struct Spellcasting {
    registry: SpellRegistry,
    rng: ChaCha8Rng,
}

impl Spellcasting {
    /// Creates an empty spellcasting system.
    #[must_use]
    pub fn new(config: &SpellcastingConfig) -> Self {
        Self {
            registry: SpellRegistry::new(config.registry_capacity),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Live spells.
    #[must_use]
    pub fn registry(&self) -> &SpellRegistry {
        &self.registry
    }

    /// Executes a single command against the world.
    pub fn apply(
        &mut self,
        world: &mut dyn SpellWorld,
        command: Command,
        out_events: &mut Vec<Event>,
    ) -> Result<(), CastError> {
        match command {
            Command::CastSpell { request } => {
                let _ = self.cast(world, request, out_events)?;
            }
            Command::Tick { dt } => self.tick(world, dt, out_events),
            Command::EndSpell { spell } => {
                let _ = self.end_spell(world, spell, out_events);
            }
            Command::EndSpellsByCaster { caster, kind } => {
                self.end_by_caster(world, caster, kind, out_events);
            }
            Command::EndSpellsByTarget { target, kind } => {
                self.end_by_target(world, target, kind, out_events);
            }
        }
        Ok(())
    }

    /// Runs the guard, launches the spell and registers it.
    ///
    /// A vetoed cast plays the fizzle cue at the caster and is not an error.
    /// A cast that finds the registry full is ended before it ever updates.
    pub fn cast(
        &mut self,
        world: &mut dyn SpellWorld,
        request: CastRequest,
        out_events: &mut Vec<Event>,
    ) -> Result<CastOutcome, CastError> {
        let kind = request.kind;
        let caster = request.caster;
        let mut instance = SpellInstance::new(&request, world);

        let allowed = {
            let mut cx = SpellContext {
                world: &mut *world,
                rng: &mut self.rng,
                events: &mut *out_events,
                registry: &mut self.registry,
            };
            instance.can_launch(&mut cx)
        };
        if !allowed {
            world.play_sound(SoundId::MagicFizzle, Some(instance.state().caster_pos()));
            debug!(?kind, ?caster, "spell vetoed");
            out_events.push(Event::SpellVetoed { kind, caster });
            return Ok(CastOutcome::Vetoed);
        }

        if self.registry.is_full() {
            let capacity = self.registry.capacity();
            warn!(?kind, ?caster, capacity, "spell registry full, cast fizzles");
            world.play_sound(SoundId::MagicFizzle, Some(instance.state().caster_pos()));
            out_events.push(Event::SpellFizzled { kind, caster });
            return Err(CastError::RegistryFull { capacity });
        }

        {
            let mut cx = SpellContext {
                world: &mut *world,
                rng: &mut self.rng,
                events: &mut *out_events,
                registry: &mut self.registry,
            };
            instance.launch(&mut cx);
        }

        match self.registry.insert(instance) {
            Ok(spell) => {
                out_events.push(Event::SpellLaunched {
                    spell,
                    kind,
                    caster,
                });
                Ok(CastOutcome::Launched(spell))
            }
            Err(mut instance) => {
                let capacity = self.registry.capacity();
                warn!(?kind, ?caster, capacity, "no slot left after launch");
                let mut cx = SpellContext {
                    world: &mut *world,
                    rng: &mut self.rng,
                    events: &mut *out_events,
                    registry: &mut self.registry,
                };
                instance.end(&mut cx);
                out_events.push(Event::SpellFizzled { kind, caster });
                Err(CastError::RegistryFull { capacity })
            }
        }
    }

    /// Advances every live spell by `dt` and reaps the expired ones.
    pub fn tick(&mut self, world: &mut dyn SpellWorld, dt: Duration, out_events: &mut Vec<Event>) {
        for index in 0..self.registry.slot_count() {
            let Some((handle, mut instance)) = self.registry.begin_update(index) else {
                continue;
            };
            let outcome = self.advance(world, handle, &mut instance, dt, out_events);
            let mut frame = Frame {
                world: &mut *world,
                rng: &mut self.rng,
                events: &mut *out_events,
            };
            self.registry
                .finish_update(handle, instance, outcome, &mut frame);
        }
    }

    /// Forces a spell through its end sequence.
    pub fn end_spell(
        &mut self,
        world: &mut dyn SpellWorld,
        spell: SpellHandle,
        out_events: &mut Vec<Event>,
    ) -> bool {
        let mut frame = Frame {
            world,
            rng: &mut self.rng,
            events: out_events,
        };
        self.registry
            .end_spell(spell, EndReason::Cancelled, &mut frame)
    }

    /// Ends every spell of `kind` cast by `caster`.
    pub fn end_by_caster(
        &mut self,
        world: &mut dyn SpellWorld,
        caster: EntityHandle,
        kind: SpellKind,
        out_events: &mut Vec<Event>,
    ) {
        let mut frame = Frame {
            world,
            rng: &mut self.rng,
            events: out_events,
        };
        self.registry.end_by_caster(caster, kind, &mut frame);
    }

    /// Ends every spell of `kind` aimed at `target`.
    pub fn end_by_target(
        &mut self,
        world: &mut dyn SpellWorld,
        target: EntityHandle,
        kind: SpellKind,
        out_events: &mut Vec<Event>,
    ) {
        let mut frame = Frame {
            world,
            rng: &mut self.rng,
            events: out_events,
        };
        self.registry.end_by_target(target, kind, &mut frame);
    }

    fn advance(
        &mut self,
        world: &mut dyn SpellWorld,
        handle: SpellHandle,
        instance: &mut SpellInstance,
        dt: Duration,
        out_events: &mut Vec<Event>,
    ) -> Option<EndReason> {
        if instance.state().is_expired() {
            return Some(EndReason::Expired);
        }

        let state = instance.state_mut();
        state.elapsed = state.elapsed.saturating_add(dt);

        if let Some(reason) = pay_upkeep(world, instance.state(), dt) {
            return Some(reason);
        }

        {
            let mut cx = SpellContext {
                world: &mut *world,
                rng: &mut self.rng,
                events: &mut *out_events,
                registry: &mut self.registry,
            };
            instance.update(&mut cx, dt);
        }
        trace!(
            spell = ?handle,
            kind = ?instance.kind(),
            elapsed_ms = millis(instance.state().elapsed()),
            "spell updated"
        );

        instance
            .state()
            .is_expired()
            .then_some(EndReason::Expired)
    }
}

/// Drains this tick's upkeep from the caster's mana pool.
fn pay_upkeep(world: &mut dyn SpellWorld, state: &SpellState, dt: Duration) -> Option<EndReason> {
    let cost = state.mana_per_second() * dt.as_secs_f32();
    if !state.has_duration || cost <= 0.0 {
        return None;
    }
    let Some(caster) = world.entity_mut(state.caster()) else {
        return Some(EndReason::CasterLost);
    };
    if !state.caster().is_player() && !caster.is_npc() {
        return None;
    }
    if caster.mana.spend(cost) {
        None
    } else {
        debug!(kind = ?state.kind(), caster = ?state.caster(), "caster out of mana");
        Some(EndReason::ManaDepleted)
    }
}
