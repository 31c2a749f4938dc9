// sprig-core: Plant catalog and live telemetry sync between sprig-api and consumers (CLI).

pub mod bindings;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod display;
pub mod error;
pub mod model;
pub mod stream;
pub mod telemetry;

mod prefs;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bindings::{DeviceBindingRegistry, DevicePicker, PickerEntry};
pub use bus::{CatalogChange, ChangeKind, EventBus, Payload, Subscription, Topic};
pub use catalog::{Binding, CatalogStore, SqliteCatalog};
pub use config::{StorageLocation, SyncConfig, SyncOptions};
pub use coordinator::{SyncCoordinator, SyncParts};
pub use error::CoreError;
pub use stream::ViewStream;
pub use telemetry::{Telemetry, TelemetryDiagnostic, TelemetryOp, TelemetrySource};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Entity, EntityId, EntityWrite, LiveReadings, NewEntity, PlantView, Sample, ViewSnapshot,
    ViewState,
};
