//! Per-participant voice taps.

use std::sync::Arc;

use dashmap::DashMap;

use crate::bridge::VoiceBridge;
use crate::engine::AudioEngine;

/// Maps participant ids to their bridges.
///
/// Uses [`DashMap`] so the capture threads of different participants and the
/// update thread can look up taps without a global lock.
pub struct TapRegistry<E: AudioEngine> {
    taps: DashMap<String, Arc<VoiceBridge<E>>>,
}

impl<E: AudioEngine> TapRegistry<E> {
    pub fn new() -> Self {
        Self {
            taps: DashMap::new(),
        }
    }

    /// Stores `bridge` under `id` and returns the bridge it replaced, if any.
    pub fn insert(&self, id: &str, bridge: Arc<VoiceBridge<E>>) -> Option<Arc<VoiceBridge<E>>> {
        self.taps.insert(id.to_string(), bridge)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<VoiceBridge<E>>> {
        self.taps.remove(id).map(|(_, bridge)| bridge)
    }

    pub fn get(&self, id: &str) -> Option<Arc<VoiceBridge<E>>> {
        self.taps.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.taps.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Sorted participant ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.taps.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Clones out every entry so callers never hold a shard lock while
    /// talking to the engine.
    pub fn snapshot(&self) -> Vec<(String, Arc<VoiceBridge<E>>)> {
        let mut taps: Vec<_> = self
            .taps
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        taps.sort_by(|a, b| a.0.cmp(&b.0));
        taps
    }

    /// Removes and returns every entry.
    pub fn drain(&self) -> Vec<(String, Arc<VoiceBridge<E>>)> {
        let taps = self.snapshot();
        for (id, _) in &taps {
            self.taps.remove(id);
        }
        taps
    }
}

impl<E: AudioEngine> Default for TapRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
