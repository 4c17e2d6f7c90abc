use std::mem;

use runecast_core::{EndReason, EntityHandle, Event, SpellHandle, SpellKind};
use tracing::debug;

use crate::{
    context::{Frame, SpellContext},
    instance::SpellInstance,
};

/// Bounded collection of live spell instances.
///
/// Instances are taken out of their slot while the driver updates them, so a
/// running spell can reach back into the registry to cancel its siblings.
#[derive(Debug)]
pub struct SpellRegistry {
    slots: Vec<Slot>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: SlotState,
}

#[derive(Debug)]
enum SlotState {
    Vacant,
    Live(Box<SpellInstance>),
    Running { cancelled: bool },
}

impl SpellRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                state: SlotState::Vacant,
            })
            .collect();
        Self { slots }
    }

    /// Maximum number of spells the registry holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live spells, including the one currently updating.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !matches!(slot.state, SlotState::Vacant))
            .count()
    }

    /// Reports whether no spell is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reports whether registering another spell would fail.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Reports whether the handle addresses a live spell.
    #[must_use]
    pub fn contains(&self, handle: SpellHandle) -> bool {
        self.slot(handle)
            .is_some_and(|slot| !matches!(slot.state, SlotState::Vacant))
    }

    /// Borrows a live spell that is not currently updating.
    #[must_use]
    pub fn get(&self, handle: SpellHandle) -> Option<&SpellInstance> {
        match &self.slot(handle)?.state {
            SlotState::Live(instance) => Some(&**instance),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, handle: SpellHandle) -> Option<&mut SpellInstance> {
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())?;
        match &mut slot.state {
            SlotState::Live(instance) => Some(&mut **instance),
            _ => None,
        }
    }

    /// Iterates over live spells in slot order, skipping empty slots.
    pub fn iter(&self) -> impl Iterator<Item = (SpellHandle, &SpellInstance)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.state {
                SlotState::Live(instance) => Some((
                    SpellHandle::new(index as u32, slot.generation),
                    &**instance,
                )),
                _ => None,
            })
    }

    /// Reports whether `caster` has a live spell of `kind`.
    #[must_use]
    pub fn exists_any_instance_for_caster(&self, kind: SpellKind, caster: EntityHandle) -> bool {
        self.iter().any(|(_, instance)| {
            instance.kind() == kind && instance.state().caster() == caster
        })
    }

    /// Finds a spell of `kind` whose affected-targets list contains `target`.
    #[must_use]
    pub fn spell_on_target(&self, target: EntityHandle, kind: SpellKind) -> Option<SpellHandle> {
        self.iter()
            .find(|(_, instance)| {
                instance.kind() == kind && instance.state().targets().contains(&target)
            })
            .map(|(handle, _)| handle)
    }

    /// Reports whether `target` is affected by any spell of `kind`.
    #[must_use]
    pub fn is_affected(&self, target: EntityHandle, kind: SpellKind) -> bool {
        self.spell_on_target(target, kind).is_some()
    }

    /// Handles of every live spell of `kind`.
    #[must_use]
    pub fn handles_of_kind(&self, kind: SpellKind) -> Vec<SpellHandle> {
        self.iter()
            .filter(|(_, instance)| instance.kind() == kind)
            .map(|(handle, _)| handle)
            .collect()
    }

    pub(crate) fn insert(&mut self, instance: SpellInstance) -> Result<SpellHandle, SpellInstance> {
        let Some((index, slot)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| matches!(slot.state, SlotState::Vacant))
        else {
            return Err(instance);
        };
        slot.state = SlotState::Live(Box::new(instance));
        Ok(SpellHandle::new(index as u32, slot.generation))
    }

    /// Forces a spell through its end sequence.
    ///
    /// A spell that is updating right now is only flagged; the driver ends it
    /// once its update returns.
    pub(crate) fn end_spell(
        &mut self,
        handle: SpellHandle,
        reason: EndReason,
        frame: &mut Frame<'_>,
    ) -> bool {
        let Some(slot) = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
        else {
            return false;
        };
        if let SlotState::Running { cancelled } = &mut slot.state {
            *cancelled = true;
            return true;
        }
        let SlotState::Live(instance) = mem::replace(&mut slot.state, SlotState::Vacant) else {
            return false;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.retire(handle, instance, reason, frame);
        true
    }

    pub(crate) fn end_by_caster(
        &mut self,
        caster: EntityHandle,
        kind: SpellKind,
        frame: &mut Frame<'_>,
    ) {
        let victims: Vec<SpellHandle> = self
            .iter()
            .filter(|(_, instance)| {
                instance.kind() == kind && instance.state().caster() == caster
            })
            .map(|(handle, _)| handle)
            .collect();
        for handle in victims {
            let _ = self.end_spell(handle, EndReason::Cancelled, frame);
        }
    }

    pub(crate) fn end_by_target(
        &mut self,
        target: EntityHandle,
        kind: SpellKind,
        frame: &mut Frame<'_>,
    ) {
        let victims: Vec<SpellHandle> = self
            .iter()
            .filter(|(_, instance)| {
                instance.kind() == kind && instance.state().target() == Some(target)
            })
            .map(|(handle, _)| handle)
            .collect();
        for handle in victims {
            let _ = self.end_spell(handle, EndReason::Cancelled, frame);
        }
    }

    /// Takes the instance in slot `index` out for updating.
    pub(crate) fn begin_update(&mut self, index: usize) -> Option<(SpellHandle, Box<SpellInstance>)> {
        let slot = self.slots.get_mut(index)?;
        if !matches!(slot.state, SlotState::Live(_)) {
            return None;
        }
        let SlotState::Live(instance) =
            mem::replace(&mut slot.state, SlotState::Running { cancelled: false })
        else {
            return None;
        };
        Some((SpellHandle::new(index as u32, slot.generation), instance))
    }

    /// Returns an updated instance to its slot, or ends it.
    pub(crate) fn finish_update(
        &mut self,
        handle: SpellHandle,
        instance: Box<SpellInstance>,
        outcome: Option<EndReason>,
        frame: &mut Frame<'_>,
    ) {
        let Some(slot) = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
        else {
            return;
        };
        let cancelled = matches!(slot.state, SlotState::Running { cancelled: true });
        let reason = match outcome {
            Some(reason) => Some(reason),
            None if cancelled => Some(EndReason::Cancelled),
            None => None,
        };
        match reason {
            None => slot.state = SlotState::Live(instance),
            Some(reason) => {
                slot.state = SlotState::Vacant;
                slot.generation = slot.generation.wrapping_add(1);
                self.retire(handle, instance, reason, frame);
            }
        }
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, handle: SpellHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    fn retire(
        &mut self,
        handle: SpellHandle,
        mut instance: Box<SpellInstance>,
        reason: EndReason,
        frame: &mut Frame<'_>,
    ) {
        let kind = instance.kind();
        {
            let mut cx = SpellContext {
                world: &mut *frame.world,
                rng: &mut *frame.rng,
                events: &mut *frame.events,
                registry: self,
            };
            instance.end(&mut cx);
        }
        debug!(spell = ?handle, ?kind, ?reason, "spell ended");
        frame.events.push(Event::SpellEnded {
            spell: handle,
            kind,
            reason,
        });
    }
}
