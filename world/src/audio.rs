use glam::Vec3;
use runecast_core::{SoundHandle, SoundId};

/// One-shot cue recorded by the mixer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayedCue {
    /// Cue that was played.
    pub cue: SoundId,
    /// Where the cue was positioned, if anywhere.
    pub pos: Option<Vec3>,
}

/// Looped cue currently playing on a channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopedSound {
    /// Cue being looped.
    pub cue: SoundId,
    /// Current position of the emitter.
    pub pos: Vec3,
    /// Playback volume.
    pub volume: f32,
}

#[derive(Debug)]
pub(crate) struct Mixer {
    channels: Vec<Channel>,
    cues: Vec<PlayedCue>,
}

#[derive(Debug)]
struct Channel {
    generation: u32,
    playing: Option<LoopedSound>,
}

impl Mixer {
    pub(crate) fn new(channel_count: usize) -> Self {
        let channels = (0..channel_count)
            .map(|_| Channel {
                generation: 0,
                playing: None,
            })
            .collect();
        Self {
            channels,
            cues: Vec::new(),
        }
    }

    pub(crate) fn play(&mut self, cue: SoundId, pos: Option<Vec3>) {
        self.cues.push(PlayedCue { cue, pos });
    }

    pub(crate) fn start_loop(&mut self, sound: LoopedSound) -> Option<SoundHandle> {
        let (index, channel) = self
            .channels
            .iter_mut()
            .enumerate()
            .find(|(_, channel)| channel.playing.is_none())?;
        channel.playing = Some(sound);
        Some(SoundHandle::new(index as u32, channel.generation))
    }

    pub(crate) fn get(&self, handle: SoundHandle) -> Option<&LoopedSound> {
        self.channels
            .get(handle.index() as usize)
            .filter(|channel| channel.generation == handle.generation())
            .and_then(|channel| channel.playing.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: SoundHandle) -> Option<&mut LoopedSound> {
        self.channels
            .get_mut(handle.index() as usize)
            .filter(|channel| channel.generation == handle.generation())
            .and_then(|channel| channel.playing.as_mut())
    }

    pub(crate) fn stop(&mut self, handle: SoundHandle) {
        let Some(channel) = self
            .channels
            .get_mut(handle.index() as usize)
            .filter(|channel| channel.generation == handle.generation())
        else {
            return;
        };
        if channel.playing.take().is_some() {
            channel.generation = channel.generation.wrapping_add(1);
        }
    }

    pub(crate) fn cues(&self) -> &[PlayedCue] {
        &self.cues
    }

    pub(crate) fn loops(&self) -> impl Iterator<Item = &LoopedSound> {
        self.channels
            .iter()
            .filter_map(|channel| channel.playing.as_ref())
    }
}
