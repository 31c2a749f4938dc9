// ── SQLite catalog ──
//
// `plants` table in a single SQLite file (or in memory for tests).
// The schema is created on open; there are no migrations.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Sqlite};
use tracing::{debug, info};

use super::{Binding, CatalogStore};
use crate::error::CoreError;
use crate::model::{Entity, EntityId, EntityWrite, NewEntity, limits};

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS plants (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        scientific_name TEXT    NOT NULL,
        common_names    TEXT    NOT NULL DEFAULT '',
        location        TEXT    NOT NULL DEFAULT '',
        image_path      TEXT,
        created_at      TEXT    NOT NULL,
        score           REAL    NOT NULL DEFAULT 0,
        sensor_id       TEXT,
        nickname        TEXT
    )
";

const CREATE_SENSOR_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_plants_sensor_id ON plants (sensor_id)";

const SELECT_COLUMNS: &str = r"
    SELECT id, scientific_name, common_names, location, image_path,
           created_at, score, sensor_id, nickname
    FROM plants
";

/// Database row for `plants`.
#[derive(Debug, sqlx::FromRow)]
struct PlantRow {
    id: i64,
    scientific_name: String,
    common_names: String,
    location: String,
    image_path: Option<String>,
    created_at: DateTime<Utc>,
    score: f64,
    sensor_id: Option<String>,
    nickname: Option<String>,
}

impl From<PlantRow> for Entity {
    fn from(r: PlantRow) -> Self {
        Self {
            id: EntityId::new(r.id),
            canonical_name: r.scientific_name,
            common_names: r.common_names,
            nickname: r.nickname,
            location: r.location,
            confidence: r.score,
            created_at: r.created_at,
            device_id: r.sensor_id,
            image_path: r.image_path,
        }
    }
}

/// [`CatalogStore`] backed by SQLite through `sqlx`.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog database at `path`.
    pub async fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        info!(path = %path.display(), "opened plant catalog");
        Self::from_pool(pool).await
    }

    /// A private in-memory catalog. Contents vanish with the value.
    pub async fn in_memory() -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // One connection that never idles out: each new in-memory
        // connection would be a distinct, empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if it is missing.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CoreError> {
        pool.execute(CREATE_TABLE).await?;
        pool.execute(CREATE_SENSOR_INDEX).await?;
        Ok(Self { pool })
    }

    /// Close every connection. Later calls fail with `Storage`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn list(&self) -> Result<Vec<Entity>, CoreError> {
        let rows: Vec<PlantRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;
        debug!(count = rows.len(), "listed catalog");
        Ok(rows.into_iter().map(Entity::from).collect())
    }

    async fn get(&self, id: EntityId) -> Result<Entity, CoreError> {
        fetch_plant(&self.pool, id).await
    }

    async fn upsert(&self, write: EntityWrite) -> Result<Entity, CoreError> {
        let mut tx = self.pool.begin().await?;

        let entity = match write {
            EntityWrite::New(new) => {
                new.validate()?;
                let id = insert_plant(&mut *tx, &new).await?;
                if let Some(device) = new.device_id.as_deref() {
                    release_device(&mut *tx, device, id).await?;
                }
                fetch_plant(&mut *tx, id).await?
            }
            EntityWrite::Existing(entity) => {
                entity.validate()?;
                update_plant(&mut *tx, &entity).await?;
                if let Some(device) = entity.device_id.as_deref() {
                    release_device(&mut *tx, device, entity.id).await?;
                }
                fetch_plant(&mut *tx, entity.id).await?
            }
        };

        tx.commit().await?;
        debug!(id = %entity.id, "saved plant");
        Ok(entity)
    }

    async fn delete(&self, id: EntityId) -> Result<Entity, CoreError> {
        let mut tx = self.pool.begin().await?;
        let entity = fetch_plant(&mut *tx, id).await?;
        sqlx::query("DELETE FROM plants WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(%id, "deleted plant");
        Ok(entity)
    }

    async fn assign_device(
        &self,
        id: EntityId,
        device_id: Option<&str>,
    ) -> Result<Binding, CoreError> {
        if let Some(device) = device_id {
            validate_device_id(device)?;
        }

        let mut tx = self.pool.begin().await?;
        // Existence check first so a missing id never clears anything.
        fetch_plant(&mut *tx, id).await?;

        let displaced = match device_id {
            Some(device) => release_device(&mut *tx, device, id).await?,
            None => Vec::new(),
        };

        sqlx::query("UPDATE plants SET sensor_id = ? WHERE id = ?")
            .bind(device_id)
            .bind(id.get())
            .execute(&mut *tx)
            .await?;
        let entity = fetch_plant(&mut *tx, id).await?;
        tx.commit().await?;

        debug!(%id, device = ?device_id, displaced = displaced.len(), "assigned device");
        Ok(Binding { entity, displaced })
    }
}

// ── Query helpers ───────────────────────────────────────────────────

async fn fetch_plant<'e, E>(exec: E, id: EntityId) -> Result<Entity, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<PlantRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id.get())
        .fetch_optional(exec)
        .await?;
    row.map(Entity::from)
        .ok_or_else(|| CoreError::plant_not_found(id))
}

async fn insert_plant<'e, E>(exec: E, new: &NewEntity) -> Result<EntityId, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let created_at = new.created_at.unwrap_or_else(Utc::now);
    let result = sqlx::query(
        r"
        INSERT INTO plants
            (scientific_name, common_names, location, image_path,
             created_at, score, sensor_id, nickname)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&new.canonical_name)
    .bind(&new.common_names)
    .bind(&new.location)
    .bind(new.image_path.as_deref())
    .bind(created_at)
    .bind(new.confidence)
    .bind(new.device_id.as_deref())
    .bind(stored_nickname(new.nickname.as_deref()))
    .execute(exec)
    .await?;
    Ok(EntityId::new(result.last_insert_rowid()))
}

async fn update_plant<'e, E>(exec: E, entity: &Entity) -> Result<(), CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r"
        UPDATE plants
        SET scientific_name = ?, common_names = ?, location = ?, image_path = ?,
            created_at = ?, score = ?, sensor_id = ?, nickname = ?
        WHERE id = ?
        ",
    )
    .bind(&entity.canonical_name)
    .bind(&entity.common_names)
    .bind(&entity.location)
    .bind(entity.image_path.as_deref())
    .bind(entity.created_at)
    .bind(entity.confidence)
    .bind(entity.device_id.as_deref())
    .bind(stored_nickname(entity.nickname.as_deref()))
    .bind(entity.id.get())
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::plant_not_found(entity.id));
    }
    Ok(())
}

/// Clear `device` from every record except `keep`, returning the ids cleared.
async fn release_device(
    conn: &mut sqlx::SqliteConnection,
    device: &str,
    keep: EntityId,
) -> Result<Vec<EntityId>, CoreError> {
    let holders: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM plants WHERE sensor_id = ? AND id != ? ORDER BY id")
            .bind(device)
            .bind(keep.get())
            .fetch_all(&mut *conn)
            .await?;
    if holders.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query("UPDATE plants SET sensor_id = NULL WHERE sensor_id = ? AND id != ?")
        .bind(device)
        .bind(keep.get())
        .execute(&mut *conn)
        .await?;
    Ok(holders.into_iter().map(|(id,)| EntityId::new(id)).collect())
}

/// Empty nicknames are stored as NULL.
fn stored_nickname(nickname: Option<&str>) -> Option<&str> {
    nickname.filter(|n| !n.is_empty())
}

fn validate_device_id(device: &str) -> Result<(), CoreError> {
    if device.trim().is_empty() {
        return Err(CoreError::validation("device id must not be blank"));
    }
    if device.chars().count() > limits::DEVICE_ID {
        return Err(CoreError::validation(format!(
            "device id is longer than {} characters",
            limits::DEVICE_ID
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn plant(name: &str) -> NewEntity {
        NewEntity {
            canonical_name: name.into(),
            common_names: "common".into(),
            nickname: None,
            location: "Balcony".into(),
            confidence: 0.8,
            created_at: None,
            device_id: None,
            image_path: Some("/tmp/plant.jpg".into()),
        }
    }

    async fn catalog() -> SqliteCatalog {
        SqliteCatalog::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids_and_lists_in_order() {
        let c = catalog().await;
        let a = c.upsert(plant("Aloe vera").into()).await.unwrap();
        let b = c.upsert(plant("Basil").into()).await.unwrap();
        assert!(b.id > a.id);

        let names: Vec<_> = c
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.canonical_name)
            .collect();
        assert_eq!(names, vec!["Aloe vera".to_owned(), "Basil".to_owned()]);
    }

    #[tokio::test]
    async fn update_keeps_id_and_persists_fields() {
        let c = catalog().await;
        let mut e = c.upsert(plant("Ficus").into()).await.unwrap();
        e.nickname = Some("Fred".into());
        e.location = "Office".into();
        let saved = c.upsert(e.clone().into()).await.unwrap();
        assert_eq!(saved, e);
        assert_eq!(c.get(e.id).await.unwrap().display_name(), "Fred");
    }

    #[tokio::test]
    async fn empty_nickname_is_stored_as_unset() {
        let c = catalog().await;
        let mut new = plant("Ficus");
        new.nickname = Some(String::new());
        let e = c.upsert(new.into()).await.unwrap();
        assert_eq!(e.nickname, None);
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let c = catalog().await;
        let mut e = c.upsert(plant("Ficus").into()).await.unwrap();
        c.delete(e.id).await.unwrap();
        e.location = "Gone".into();
        let err = c.upsert(e.into()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_returns_record_and_removes_it() {
        let c = catalog().await;
        let e = c.upsert(plant("Mint").into()).await.unwrap();
        let removed = c.delete(e.id).await.unwrap();
        assert_eq!(removed.id, e.id);
        assert!(c.list().await.unwrap().iter().all(|x| x.id != e.id));
        assert!(c.delete(e.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn invalid_write_never_reaches_storage() {
        let c = catalog().await;
        let mut new = plant("Mint");
        new.location = "x".repeat(limits::LOCATION + 1);
        let err = c.upsert(new.into()).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
        assert!(c.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn binding_a_device_moves_it_off_the_previous_holder() {
        let c = catalog().await;
        let a = c.upsert(plant("A").into()).await.unwrap();
        let b = c.upsert(plant("B").into()).await.unwrap();

        c.assign_device(a.id, Some("devA")).await.unwrap();
        let binding = c.assign_device(b.id, Some("devA")).await.unwrap();

        assert_eq!(binding.displaced, vec![a.id]);
        assert_eq!(binding.entity.device_id.as_deref(), Some("devA"));
        assert_eq!(c.get(a.id).await.unwrap().device_id, None);
    }

    #[tokio::test]
    async fn rebinding_the_same_holder_displaces_nobody() {
        let c = catalog().await;
        let a = c.upsert(plant("A").into()).await.unwrap();
        c.assign_device(a.id, Some("devA")).await.unwrap();
        let binding = c.assign_device(a.id, Some("devA")).await.unwrap();
        assert!(binding.displaced.is_empty());
    }

    #[tokio::test]
    async fn unbind_clears_device() {
        let c = catalog().await;
        let a = c.upsert(plant("A").into()).await.unwrap();
        c.assign_device(a.id, Some("devA")).await.unwrap();
        let binding = c.assign_device(a.id, None).await.unwrap();
        assert_eq!(binding.entity.device_id, None);
    }

    #[tokio::test]
    async fn binding_a_missing_record_changes_nothing() {
        let c = catalog().await;
        let a = c.upsert(plant("A").into()).await.unwrap();
        c.assign_device(a.id, Some("devA")).await.unwrap();

        let err = c
            .assign_device(EntityId::new(999), Some("devA"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(c.get(a.id).await.unwrap().device_id.as_deref(), Some("devA"));
    }

    #[tokio::test]
    async fn closed_pool_reports_storage_error() {
        let c = catalog().await;
        c.close().await;
        assert!(c.list().await.unwrap_err().is_storage());
    }

    #[tokio::test]
    async fn file_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("plants.db");
        let id = {
            let c = SqliteCatalog::open(&path).await.unwrap();
            let e = c.upsert(plant("Cactus").into()).await.unwrap();
            c.close().await;
            e.id
        };
        let c = SqliteCatalog::open(&path).await.unwrap();
        assert_eq!(c.get(id).await.unwrap().canonical_name, "Cactus");
    }
}
