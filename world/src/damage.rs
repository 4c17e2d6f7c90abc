use std::time::Duration;

use runecast_core::{DamageHandle, DamageParams};

#[derive(Debug)]
pub(crate) struct DamageZones {
    slots: Vec<ZoneSlot>,
    bursts: Vec<DamageParams>,
}

#[derive(Debug)]
struct ZoneSlot {
    generation: u32,
    zone: Option<Zone>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Zone {
    pub(crate) params: DamageParams,
    pub(crate) age: Duration,
}

impl DamageZones {
    pub(crate) fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| ZoneSlot {
                generation: 0,
                zone: None,
            })
            .collect();
        Self {
            slots,
            bursts: Vec::new(),
        }
    }

    pub(crate) fn record_burst(&mut self, params: DamageParams) {
        self.bursts.push(params);
    }

    pub(crate) fn bursts(&self) -> &[DamageParams] {
        &self.bursts
    }

    pub(crate) fn create(&mut self, params: DamageParams) -> Option<DamageHandle> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.zone.is_none())?;
        slot.zone = Some(Zone {
            params,
            age: Duration::ZERO,
        });
        Some(DamageHandle::new(index as u32, slot.generation))
    }

    pub(crate) fn get(&self, handle: DamageHandle) -> Option<&DamageParams> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.zone.as_ref())
            .map(|zone| &zone.params)
    }

    pub(crate) fn get_mut(&mut self, handle: DamageHandle) -> Option<&mut DamageParams> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.zone.as_mut())
            .map(|zone| &mut zone.params)
    }

    pub(crate) fn end(&mut self, handle: DamageHandle) {
        let Some(slot) = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
        else {
            return;
        };
        if slot.zone.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
        }
    }

    /// Ages every zone, drops the expired ones and returns the survivors' parameters.
    pub(crate) fn advance(&mut self, dt: Duration) -> Vec<DamageParams> {
        let mut active = Vec::new();
        for slot in &mut self.slots {
            let Some(zone) = slot.zone.as_mut() else {
                continue;
            };
            zone.age = zone.age.saturating_add(dt);
            if zone.params.duration.is_some_and(|limit| zone.age >= limit) {
                slot.zone = None;
                slot.generation = slot.generation.wrapping_add(1);
                continue;
            }
            active.push(zone.params);
        }
        active
    }

    pub(crate) fn zones_mut(&mut self) -> impl Iterator<Item = &mut Zone> {
        self.slots.iter_mut().filter_map(|slot| slot.zone.as_mut())
    }

    pub(crate) fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.zone.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::Vec3;
    use runecast_core::{DamageParams, DamageType};

    use super::DamageZones;

    #[test]
    fn zones_expire_after_their_duration() {
        let mut zones = DamageZones::new(4);
        let params = DamageParams::new(Vec3::ZERO, 60.0, 1.0, DamageType::COLD)
            .lasting(Duration::from_millis(100));
        let handle = zones.create(params).expect("free zone");

        assert_eq!(zones.advance(Duration::from_millis(50)).len(), 1);
        assert!(zones.advance(Duration::from_millis(50)).is_empty());
        assert!(zones.get(handle).is_none());
    }

    #[test]
    fn ending_a_zone_twice_is_harmless() {
        let mut zones = DamageZones::new(1);
        let params = DamageParams::new(Vec3::ZERO, 150.0, 4.0, DamageType::MAGICAL);
        let handle = zones.create(params).expect("free zone");
        zones.end(handle);
        let replacement = zones.create(params).expect("slot reused");
        zones.end(handle);
        assert_eq!(zones.active_count(), 1);
        assert!(zones.get(replacement).is_some());
    }
}
