// ── Catalog storage ──
//
// Durable local storage of plant records. The coordinator and the
// binding registry talk to the `CatalogStore` trait; `SqliteCatalog`
// is the production implementation.

mod sqlite;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::{Entity, EntityId, EntityWrite};

pub use sqlite::SqliteCatalog;

/// Result of binding or unbinding a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// The updated record.
    pub entity: Entity,
    /// Records that held the device before and had it cleared.
    pub displaced: Vec<EntityId>,
}

/// Persistent catalog of entities.
///
/// Every operation is atomic per record. Storage failures surface as
/// [`CoreError::Storage`] and are never swallowed here.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All records, ordered by ascending id (insertion order).
    async fn list(&self) -> Result<Vec<Entity>, CoreError>;

    async fn get(&self, id: EntityId) -> Result<Entity, CoreError>;

    /// Insert a new record or overwrite an existing one.
    ///
    /// A written device id is removed from any other record in the same
    /// transaction, so a device is never bound twice.
    async fn upsert(&self, write: EntityWrite) -> Result<Entity, CoreError>;

    /// Remove a record, returning what was removed.
    async fn delete(&self, id: EntityId) -> Result<Entity, CoreError>;

    /// Bind (`Some`) or unbind (`None`) a device on one record.
    async fn assign_device(
        &self,
        id: EntityId,
        device_id: Option<&str>,
    ) -> Result<Binding, CoreError>;
}
