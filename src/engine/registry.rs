//! Named samples available to programs.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::events::Notifier;
use super::kernel::SynthBackend;
use super::program::{identifiers, sample_marker};
use crate::audio::AudioData;
use crate::error::SynthError;

/// Backend texture plus the raster it was packed into.
#[derive(Debug)]
pub struct EncodedSample<T> {
    pub texture: T,
    pub width: u32,
    pub height: u32,
}

/// A registered sample.
#[derive(Debug)]
pub struct SampleEntry<T> {
    pub name: String,
    pub texture: T,
    pub sample_rate: u32,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl<T> SampleEntry<T> {
    /// `(width, height, sample rate, duration)`, the `sample_<name>_meta` vector.
    pub fn meta(&self) -> [f32; 4] {
        [
            self.width as f32,
            self.height as f32,
            self.sample_rate as f32,
            self.duration as f32,
        ]
    }
}

pub type SampleMap<T> = HashMap<String, Arc<SampleEntry<T>>>;

/// Notifications emitted by [`SampleRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    SampleRegistered { name: String },
    SampleUnregistered { name: String },
}

/// Name → sample mapping, shareable between a host deck and its guests.
///
/// Readers take a snapshot of the whole map; writers publish a new map. A
/// replaced or removed entry stays alive for as long as any snapshot (and so any
/// in-flight render) still holds it, and its texture is released with the last one.
pub struct SampleRegistry<T> {
    entries: ArcSwap<SampleMap<T>>,
    events: Notifier<RegistryEvent>,
}

impl<T> SampleRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
            events: Notifier::new(),
        }
    }

    /// Encode `audio` with the backend and store it under `name`, replacing any
    /// previous entry. On failure the previous entry is left untouched.
    pub fn register<B>(
        &self,
        backend: &B,
        name: &str,
        audio: &AudioData,
    ) -> Result<Arc<SampleEntry<T>>, SynthError>
    where
        B: SynthBackend<Texture = T>,
    {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SynthError::invalid(format!(
                "sample name {:?} must be a non-empty identifier",
                name
            )));
        }
        audio
            .check()
            .map_err(|e| SynthError::invalid(format!("sample '{}': {}", name, e)))?;

        let encoded = backend.encode_sample(audio)?;
        let entry = Arc::new(SampleEntry {
            name: name.to_string(),
            texture: encoded.texture,
            sample_rate: audio.sample_rate,
            duration: audio.duration(),
            width: encoded.width,
            height: encoded.height,
        });
        self.insert(entry.clone());
        Ok(entry)
    }

    /// Publish an already encoded entry.
    pub fn insert(&self, entry: Arc<SampleEntry<T>>) {
        let name = entry.name.clone();
        self.entries.rcu(|current| {
            let mut next = SampleMap::clone(current);
            next.insert(entry.name.clone(), entry.clone());
            next
        });
        log::info!(
            "Registered sample '{}' ({:.2}s @ {}Hz, {}x{})",
            name,
            entry.duration,
            entry.sample_rate,
            entry.width,
            entry.height
        );
        self.events.notify(&RegistryEvent::SampleRegistered { name });
    }

    /// Remove a sample. Returns false (and emits nothing) if it was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut removed = false;
        self.entries.rcu(|current| {
            let mut next = SampleMap::clone(current);
            removed = next.remove(name).is_some();
            next
        });
        if removed {
            log::info!("Unregistered sample '{}'", name);
            self.events.notify(&RegistryEvent::SampleUnregistered {
                name: name.to_string(),
            });
        }
        removed
    }

    /// Remove every sample.
    pub fn clear(&self) {
        let previous = self.entries.swap(Arc::new(HashMap::new()));
        for name in previous.keys() {
            self.events.notify(&RegistryEvent::SampleUnregistered { name: name.clone() });
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<SampleEntry<T>>> {
        self.entries.load().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.load().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.entries.load().keys().cloned().collect()
    }

    /// Consistent view of every entry, cheap enough to take once per render.
    pub fn snapshot(&self) -> Arc<SampleMap<T>> {
        self.entries.load_full()
    }

    /// Registered names that appear as `sample_<name>` markers in `source`.
    pub fn names_referenced_by(&self, source: &str) -> BTreeSet<String> {
        let entries = self.entries.load();
        identifiers(source)
            .filter_map(|ident| sample_marker(ident, |n| entries.contains_key(n)))
            .map(str::to_string)
            .collect()
    }

    pub fn events(&self) -> &Notifier<RegistryEvent> {
        &self.events
    }
}

impl<T> Default for SampleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
