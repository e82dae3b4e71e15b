//! The saved-city list: identity, deduplication, and persistence.
//!
//! Every mutation re-serializes the whole list under one storage key.

use citycast_weather::{Coordinates, NewLocation, TrackedLocation};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use crate::storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DirectoryError {
    #[error("Location already tracked as {existing_id}")]
    DuplicateLocation { existing_id: String },
}

/// Ordered list of tracked locations (insertion order is display order).
pub struct LocationDirectory {
    store: Arc<dyn KeyValueStore>,
    key: String,
    entries: Mutex<Vec<TrackedLocation>>,
}

impl LocationDirectory {
    /// Read the saved list. Missing or unreadable data gives an empty list.
    pub fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let entries = match store.get(&key) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<TrackedLocation>>(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Ignoring malformed saved cities: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read saved cities: {:#}", e);
                Vec::new()
            }
        };

        tracing::debug!("Loaded {} saved cities", entries.len());
        Self {
            store,
            key,
            entries: Mutex::new(entries),
        }
    }

    /// Append a location unless one already sits at the same coordinates.
    pub fn add(&self, location: NewLocation) -> Result<TrackedLocation, DirectoryError> {
        let mut entries = self.entries.lock();

        if let Some(coords) = location.coordinates {
            if let Some(existing) = entries
                .iter()
                .find(|e| e.coordinates.is_some_and(|c| c.is_near(&coords)))
            {
                return Err(DirectoryError::DuplicateLocation {
                    existing_id: existing.id.clone(),
                });
            }
        }

        let id = fresh_id(&entries);
        let tracked = TrackedLocation::from_new(id, location);
        entries.push(tracked.clone());
        self.persist(&entries);

        tracing::info!("Added city {} ({})", tracked.label(), tracked.id);
        Ok(tracked)
    }

    /// Remove by id. Returns the removed entry, `None` if it was not tracked.
    pub fn remove(&self, id: &str) -> Option<TrackedLocation> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|e| e.id == id)?;
        let removed = entries.remove(index);
        self.persist(&entries);

        tracing::info!("Removed city {} ({})", removed.label(), removed.id);
        Some(removed)
    }

    /// Fill in coordinates resolved after the fact. Existing coordinates are kept.
    pub fn update_coordinates(&self, id: &str, coordinates: Coordinates) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        if entry.coordinates.is_some() {
            return false;
        }
        entry.coordinates = Some(coordinates);
        self.persist(&entries);
        true
    }

    pub fn all(&self) -> Vec<TrackedLocation> {
        self.entries.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<TrackedLocation> {
        self.entries.lock().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Write failures are logged; the in-memory list stays authoritative.
    fn persist(&self, entries: &[TrackedLocation]) {
        let json = match serde_json::to_string(entries) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize cities: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(&self.key, &json) {
            tracing::warn!("Failed to save cities: {:#}", e);
        }
    }
}

fn fresh_id(entries: &[TrackedLocation]) -> String {
    loop {
        let id = Uuid::new_v4().simple().to_string();
        if !entries.iter().any(|e| e.id == id) {
            return id;
        }
    }
}
