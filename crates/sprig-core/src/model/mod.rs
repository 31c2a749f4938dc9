// ── Domain model ──
//
// Canonical types shared by the catalog, the telemetry boundary and the
// coordinator. Consumers (the CLI) depend only on these.

pub mod entity;
pub mod sample;
pub mod view;

// ── Re-exports ──────────────────────────────────────────────────────

pub use entity::{Entity, EntityId, EntityWrite, NewEntity, limits};
pub use sample::Sample;
pub use view::{LiveReadings, PlantView, ViewSnapshot, ViewState};
