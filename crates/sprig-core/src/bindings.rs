// ── Device bindings ──
//
// Which device each plant reads from, and the user's labels for devices.
// Bindings live on the catalog record; aliases live in the preference
// area and outlive any plant.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{Binding, CatalogStore};
use crate::error::CoreError;
use crate::model::{Entity, EntityId, limits};
use crate::prefs::Preferences;

fn alias_key(device_id: &str) -> String {
    format!("alias:{device_id}")
}

/// Entity-to-device bindings and device aliases.
pub struct DeviceBindingRegistry {
    catalog: Arc<dyn CatalogStore>,
    prefs: Preferences,
}

impl DeviceBindingRegistry {
    /// Registry whose aliases persist to a JSON file at `prefs_path`.
    pub fn open(catalog: Arc<dyn CatalogStore>, prefs_path: &Path) -> Result<Self, CoreError> {
        Ok(Self {
            catalog,
            prefs: Preferences::load(prefs_path)?,
        })
    }

    /// Registry whose aliases are kept in memory only.
    pub fn in_memory(catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            catalog,
            prefs: Preferences::in_memory(),
        }
    }

    // ── Aliases ──────────────────────────────────────────────────────

    pub fn get_alias(&self, device_id: &str) -> Option<String> {
        self.prefs.get(&alias_key(device_id))
    }

    /// Store a label for a device. Blank labels are rejected.
    pub fn set_alias(&self, device_id: &str, alias: &str) -> Result<(), CoreError> {
        if device_id.trim().is_empty() {
            return Err(CoreError::validation("device id must not be blank"));
        }
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(CoreError::validation("alias must not be blank"));
        }
        if alias.chars().count() > limits::NICKNAME {
            return Err(CoreError::validation(format!(
                "alias is longer than {} characters",
                limits::NICKNAME
            )));
        }
        self.prefs.set(&alias_key(device_id), alias)?;
        debug!(device_id, alias, "alias stored");
        Ok(())
    }

    /// Forget a device's label. Returns whether one existed.
    pub fn clear_alias(&self, device_id: &str) -> Result<bool, CoreError> {
        self.prefs.remove(&alias_key(device_id))
    }

    /// `"{alias} ({device_id})"` when aliased, else the bare device id.
    pub fn label_for(&self, device_id: &str) -> String {
        match self.get_alias(device_id) {
            Some(alias) => format!("{alias} ({device_id})"),
            None => device_id.to_owned(),
        }
    }

    // ── Bindings ─────────────────────────────────────────────────────

    /// Bind a device to an entity, clearing it from any previous holder.
    pub async fn bind(&self, entity_id: EntityId, device_id: &str) -> Result<Binding, CoreError> {
        let binding = self.catalog.assign_device(entity_id, Some(device_id)).await?;
        if !binding.displaced.is_empty() {
            debug!(
                device_id,
                displaced = ?binding.displaced,
                "device moved from previous holder"
            );
        }
        Ok(binding)
    }

    pub async fn unbind(&self, entity_id: EntityId) -> Result<Entity, CoreError> {
        Ok(self.catalog.assign_device(entity_id, None).await?.entity)
    }

    // ── Picker ───────────────────────────────────────────────────────

    /// Build a label-to-device picker for the given devices.
    ///
    /// Repeated device ids collapse to their first occurrence. Two
    /// distinct devices producing the same label is a
    /// [`CoreError::BindingConflict`].
    pub fn build_picker<I, S>(&self, device_ids: I) -> Result<DevicePicker, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: IndexMap<String, String> = IndexMap::new();
        let mut seen = HashSet::new();

        for device in device_ids {
            let device = device.as_ref();
            if !seen.insert(device.to_owned()) {
                continue;
            }
            match entries.entry(self.label_for(device)) {
                Entry::Vacant(slot) => {
                    slot.insert(device.to_owned());
                }
                Entry::Occupied(slot) => {
                    return Err(CoreError::BindingConflict {
                        label: slot.key().clone(),
                        device_ids: vec![slot.get().clone(), device.to_owned()],
                    });
                }
            }
        }
        Ok(DevicePicker { entries })
    }
}

/// One selectable device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickerEntry {
    pub label: String,
    pub device_id: String,
}

/// Ordered label-to-device mapping for device selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevicePicker {
    entries: IndexMap<String, String>,
}

impl DevicePicker {
    /// The device behind a label. Exact match only.
    pub fn resolve(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> Vec<PickerEntry> {
        self.entries
            .iter()
            .map(|(label, device_id)| PickerEntry {
                label: label.clone(),
                device_id: device_id.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
