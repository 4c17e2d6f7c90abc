use glam::Vec3;
use runecast_core::{Emitter, EmitterHandle, EmitterKind, ModelDraw, ParticleParams, TrailParams};

/// Lightning bolt queued for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bolt {
    /// Start of the bolt.
    pub from: Vec3,
    /// End of the bolt.
    pub to: Vec3,
    /// Brightness of the bolt.
    pub intensity: f32,
}

/// Explosion spawned by a spell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Explosion {
    /// Centre of the explosion.
    pub pos: Vec3,
    /// Size multiplier.
    pub scale: f32,
}

/// Records visual requests so hosts can draw them and tests can inspect them.
#[derive(Debug)]
pub(crate) struct RenderLog {
    particle_budget: usize,
    frame_particles: usize,
    total_particles: usize,
    emitters: Vec<EmitterSlot>,
    models: Vec<ModelDraw>,
    trails: Vec<TrailParams>,
    bolts: Vec<Bolt>,
    explosions: Vec<Explosion>,
}

#[derive(Debug)]
struct EmitterSlot {
    generation: u32,
    emitter: Option<Emitter>,
}

impl RenderLog {
    pub(crate) fn new(particle_budget: usize, emitter_capacity: usize) -> Self {
        let emitters = (0..emitter_capacity)
            .map(|_| EmitterSlot {
                generation: 0,
                emitter: None,
            })
            .collect();
        Self {
            particle_budget,
            frame_particles: 0,
            total_particles: 0,
            emitters,
            models: Vec::new(),
            trails: Vec::new(),
            bolts: Vec::new(),
            explosions: Vec::new(),
        }
    }

    pub(crate) fn begin_frame(&mut self) {
        self.frame_particles = 0;
        self.models.clear();
        self.trails.clear();
        self.bolts.clear();
    }

    pub(crate) fn spawn_particle(&mut self, _particle: ParticleParams) -> bool {
        if self.frame_particles >= self.particle_budget {
            return false;
        }
        self.frame_particles += 1;
        self.total_particles += 1;
        true
    }

    pub(crate) fn spawn_emitter(&mut self, kind: EmitterKind, pos: Vec3) -> Option<EmitterHandle> {
        let (index, slot) = self
            .emitters
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.emitter.is_none())?;
        slot.emitter = Some(Emitter {
            kind,
            pos,
            alpha: 1.0,
        });
        Some(EmitterHandle::new(index as u32, slot.generation))
    }

    pub(crate) fn emitter(&self, handle: EmitterHandle) -> Option<&Emitter> {
        self.emitters
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.emitter.as_ref())
    }

    pub(crate) fn emitter_mut(&mut self, handle: EmitterHandle) -> Option<&mut Emitter> {
        self.emitters
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.emitter.as_mut())
    }

    pub(crate) fn release_emitter(&mut self, handle: EmitterHandle) {
        let Some(slot) = self
            .emitters
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
        else {
            return;
        };
        if slot.emitter.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
        }
    }

    pub(crate) fn live_emitters(&self) -> usize {
        self.emitters
            .iter()
            .filter(|slot| slot.emitter.is_some())
            .count()
    }

    pub(crate) fn draw_model(&mut self, draw: ModelDraw) {
        self.models.push(draw);
    }

    pub(crate) fn draw_trail(&mut self, trail: TrailParams) {
        self.trails.push(trail);
    }

    pub(crate) fn draw_bolt(&mut self, bolt: Bolt) {
        self.bolts.push(bolt);
    }

    pub(crate) fn spawn_explosion(&mut self, explosion: Explosion) {
        self.explosions.push(explosion);
    }

    pub(crate) fn models(&self) -> &[ModelDraw] {
        &self.models
    }

    pub(crate) fn trails(&self) -> &[TrailParams] {
        &self.trails
    }

    pub(crate) fn bolts(&self) -> &[Bolt] {
        &self.bolts
    }

    pub(crate) fn explosions(&self) -> &[Explosion] {
        &self.explosions
    }

    pub(crate) fn total_particles(&self) -> usize {
        self.total_particles
    }
}
