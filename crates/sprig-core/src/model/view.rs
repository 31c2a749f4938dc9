// ── View snapshot types ──
//
// What presentation layers consume: catalog entities merged with the
// last known device readings. Readings live only here, never in storage.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::entity::{Entity, EntityId};
use super::sample::Sample;

/// Last known readings for an entity's bound device. `None` means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LiveReadings {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl LiveReadings {
    pub const UNKNOWN: Self = Self {
        temperature: None,
        humidity: None,
        observed_at: None,
    };

    pub fn is_unknown(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none()
    }
}

impl From<&Sample> for LiveReadings {
    fn from(s: &Sample) -> Self {
        Self {
            temperature: Some(s.temperature),
            humidity: Some(s.air_moisture),
            observed_at: Some(s.captured_at),
        }
    }
}

/// One catalog entry as shown to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantView {
    pub entity: Entity,
    pub readings: LiveReadings,
}

impl PlantView {
    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    pub fn display_name(&self) -> &str {
        self.entity.display_name()
    }
}

/// A complete, consistent view produced by one sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    /// Cycle generation that produced this snapshot. Strictly increasing.
    pub generation: u64,
    /// Catalog revision the cycle read.
    pub revision: u64,
    pub loaded_at: DateTime<Utc>,
    /// Ordered as the catalog lists them (ascending id).
    pub plants: Vec<PlantView>,
}

impl ViewSnapshot {
    pub fn get(&self, id: EntityId) -> Option<&PlantView> {
        self.plants.iter().find(|p| p.entity.id == id)
    }

    /// Readings for an entity, if it was part of this snapshot.
    pub fn readings_for(&self, id: EntityId) -> Option<LiveReadings> {
        self.get(id).map(|p| p.readings)
    }

    /// The `n` most recently created entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<PlantView> {
        let mut plants = self.plants.clone();
        plants.sort_by(|a, b| {
            b.entity
                .created_at
                .cmp(&a.entity.created_at)
                .then_with(|| b.entity.id.cmp(&a.entity.id))
        });
        plants.truncate(n);
        plants
    }
}

/// Coordinator state as observed by consumers.
#[derive(Debug, Clone, Default, PartialEq, strum::IntoStaticStr)]
pub enum ViewState {
    /// Nothing loaded yet.
    #[default]
    Idle,
    /// A cycle is in flight. The previous view stays readable meanwhile.
    Loading { last_good: Option<Arc<ViewSnapshot>> },
    Ready(Arc<ViewSnapshot>),
    /// The last cycle failed on storage.
    Error {
        last_good: Option<Arc<ViewSnapshot>>,
        message: String,
    },
}

impl ViewState {
    /// The snapshot a consumer should show right now, if any.
    pub fn view(&self) -> Option<&Arc<ViewSnapshot>> {
        match self {
            Self::Idle => None,
            Self::Ready(snap) => Some(snap),
            Self::Loading { last_good } | Self::Error { last_good, .. } => last_good.as_ref(),
        }
    }

    /// Entries of the visible view; empty when nothing was ever loaded.
    pub fn plants(&self) -> &[PlantView] {
        self.view().map_or(&[], |s| s.plants.as_slice())
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Short state name (`"Idle"`, `"Loading"`, `"Ready"`, `"Error"`).
    pub fn name(&self) -> &'static str {
        self.into()
    }
}
