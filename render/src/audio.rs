//! Audio collaborator interface.
//!
//! Playback runs on a mixer-owned thread inside an external audio engine;
//! the context only holds the engine facade and an id-keyed soundboard
//! that maps sound ids to engine-side sources.

use std::fmt;

use fxhash::FxHashMap;

use crate::error::Result;

pub type SoundId = u32;

/// Mixer facade implemented by the external audio engine.
pub trait AudioEngine: fmt::Debug {
    /// Registers a decoded sound and returns the engine-side source id.
    fn create_sound(&mut self, data: &[u8]) -> Result<SoundId>;
    fn destroy_sound(&mut self, id: SoundId);

    fn play(&mut self, id: SoundId);
    fn pause(&mut self, id: SoundId);
    fn stop(&mut self, id: SoundId);

    fn set_volume(&mut self, id: SoundId, volume: f32);
    fn set_master_volume(&mut self, volume: f32);
    fn master_volume(&self) -> f32;
}

/// Bookkeeping entry for a registered sound.
#[derive(Clone, Debug, Default)]
pub struct SoundInfo {
    pub name: String,
    pub volume: f32,
}

/// Id-keyed table of registered sounds, owned by the context.
#[derive(Debug, Default)]
pub struct SoundBoard {
    sounds: FxHashMap<SoundId, SoundInfo>,
}

impl SoundBoard {
    pub fn insert(&mut self, id: SoundId, info: SoundInfo) {
        self.sounds.insert(id, info);
    }

    pub fn remove(&mut self, id: SoundId) -> Option<SoundInfo> {
        self.sounds.remove(&id)
    }

    pub fn get(&self, id: SoundId) -> Option<&SoundInfo> {
        self.sounds.get(&id)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}
