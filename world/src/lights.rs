use std::time::Duration;

use runecast_core::{DynamicLight, LightHandle};

#[derive(Debug)]
pub(crate) struct LightTable {
    slots: Vec<LightSlot>,
}

#[derive(Debug)]
struct LightSlot {
    generation: u32,
    state: LightState,
}

#[derive(Debug)]
enum LightState {
    Free,
    Owned {
        light: DynamicLight,
        expires_in: Option<Duration>,
    },
    Lingering {
        #[allow(dead_code)]
        light: DynamicLight,
        remaining: Duration,
    },
}

impl LightTable {
    pub(crate) fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| LightSlot {
                generation: 0,
                state: LightState::Free,
            })
            .collect();
        Self { slots }
    }

    pub(crate) fn acquire(&mut self, light: DynamicLight) -> Option<LightHandle> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| matches!(slot.state, LightState::Free))?;
        slot.state = LightState::Owned {
            light,
            expires_in: light.duration,
        };
        Some(LightHandle::new(index as u32, slot.generation))
    }

    pub(crate) fn get(&self, handle: LightHandle) -> Option<&DynamicLight> {
        match &self.slot(handle)?.state {
            LightState::Owned { light, .. } => Some(light),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, handle: LightHandle) -> Option<&mut DynamicLight> {
        match &mut self.slot_mut(handle)?.state {
            LightState::Owned { light, .. } => Some(light),
            _ => None,
        }
    }

    pub(crate) fn release(&mut self, handle: LightHandle) {
        if self.get(handle).is_none() {
            return;
        }
        if let Some(slot) = self.slot_mut(handle) {
            slot.state = LightState::Free;
            slot.generation = slot.generation.wrapping_add(1);
        }
    }

    pub(crate) fn release_delayed(&mut self, handle: LightHandle, delay: Duration) {
        let Some(slot) = self.slot_mut(handle) else {
            return;
        };
        let LightState::Owned { light, .. } = slot.state else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = if delay.is_zero() {
            LightState::Free
        } else {
            LightState::Lingering {
                light,
                remaining: delay,
            }
        };
    }

    pub(crate) fn advance(&mut self, dt: Duration) {
        for slot in &mut self.slots {
            let expired = match &mut slot.state {
                LightState::Free => false,
                LightState::Owned { expires_in, .. } => match expires_in {
                    Some(remaining) => {
                        *remaining = remaining.saturating_sub(dt);
                        remaining.is_zero()
                    }
                    None => false,
                },
                LightState::Lingering { remaining, .. } => {
                    *remaining = remaining.saturating_sub(dt);
                    remaining.is_zero()
                }
            };
            if expired {
                slot.state = LightState::Free;
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
    }

    pub(crate) fn owned_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.state, LightState::Owned { .. }))
            .count()
    }

    pub(crate) fn lingering_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.state, LightState::Lingering { .. }))
            .count()
    }

    fn slot(&self, handle: LightHandle) -> Option<&LightSlot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    fn slot_mut(&mut self, handle: LightHandle) -> Option<&mut LightSlot> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use runecast_core::DynamicLight;

    use super::LightTable;

    #[test]
    fn delayed_release_invalidates_handle_but_keeps_slot() {
        let mut table = LightTable::new(1);
        let handle = table.acquire(DynamicLight::default()).expect("free slot");
        table.release_delayed(handle, Duration::from_millis(500));

        assert!(table.get(handle).is_none(), "owner gave the handle up");
        assert!(
            table.acquire(DynamicLight::default()).is_none(),
            "slot stays reserved while fading"
        );

        table.advance(Duration::from_millis(499));
        assert_eq!(table.lingering_count(), 1);
        table.advance(Duration::from_millis(1));
        assert_eq!(table.lingering_count(), 0);

        let recycled = table.acquire(DynamicLight::default()).expect("slot freed");
        assert_ne!(recycled, handle, "recycled slot carries a new generation");
    }

    #[test]
    fn timed_lights_expire_on_their_own() {
        let mut table = LightTable::new(2);
        let flash = DynamicLight {
            duration: Some(Duration::from_millis(600)),
            ..DynamicLight::default()
        };
        let handle = table.acquire(flash).expect("free slot");
        table.advance(Duration::from_millis(600));
        assert!(table.get(handle).is_none());
        assert_eq!(table.owned_count(), 0);
    }

    #[test]
    fn stale_handles_are_ignored() {
        let mut table = LightTable::new(1);
        let handle = table.acquire(DynamicLight::default()).expect("free slot");
        table.release(handle);
        let replacement = table.acquire(DynamicLight::default()).expect("free slot");

        table.release(handle);
        table.release_delayed(handle, Duration::from_millis(100));
        assert!(table.get(replacement).is_some(), "stale release is a no-op");
    }
}
