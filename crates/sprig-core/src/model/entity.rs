// ── Catalog entity (a tracked plant) ──

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Field length bounds enforced before any catalog write.
pub mod limits {
    pub const CANONICAL_NAME: usize = 250;
    pub const COMMON_NAMES: usize = 500;
    pub const LOCATION: usize = 500;
    pub const IMAGE_PATH: usize = 500;
    pub const DEVICE_ID: usize = 100;
    pub const NICKNAME: usize = 100;
}

/// Catalog-assigned identifier. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| CoreError::validation(format!("not a plant id: {s:?}")))
    }
}

/// A persisted catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Scientific name as returned by identification.
    pub canonical_name: String,
    pub common_names: String,
    /// User-chosen nickname. `None` and `Some("")` both mean unset.
    pub nickname: Option<String>,
    pub location: String,
    /// Identification confidence in `0.0..=1.0`.
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub device_id: Option<String>,
    /// Opaque reference owned by the image storage collaborator.
    pub image_path: Option<String>,
}

impl Entity {
    /// The nickname if one is set, otherwise the canonical name.
    pub fn display_name(&self) -> &str {
        match self.nickname.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &self.canonical_name,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_fields(&Fields {
            canonical_name: &self.canonical_name,
            common_names: &self.common_names,
            nickname: self.nickname.as_deref(),
            location: &self.location,
            confidence: self.confidence,
            device_id: self.device_id.as_deref(),
            image_path: self.image_path.as_deref(),
        })
    }
}

/// Fields for a record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    pub canonical_name: String,
    pub common_names: String,
    pub nickname: Option<String>,
    pub location: String,
    pub confidence: f64,
    /// Defaults to the insertion time when `None`.
    pub created_at: Option<DateTime<Utc>>,
    pub device_id: Option<String>,
    pub image_path: Option<String>,
}

impl NewEntity {
    /// A minimal record with only the canonical name set.
    pub fn named(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            common_names: String::new(),
            nickname: None,
            location: String::new(),
            confidence: 0.0,
            created_at: None,
            device_id: None,
            image_path: None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_fields(&Fields {
            canonical_name: &self.canonical_name,
            common_names: &self.common_names,
            nickname: self.nickname.as_deref(),
            location: &self.location,
            confidence: self.confidence,
            device_id: self.device_id.as_deref(),
            image_path: self.image_path.as_deref(),
        })
    }
}

/// Upsert input: insert a new record or overwrite an existing one.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityWrite {
    New(NewEntity),
    Existing(Entity),
}

impl From<NewEntity> for EntityWrite {
    fn from(e: NewEntity) -> Self {
        Self::New(e)
    }
}

impl From<Entity> for EntityWrite {
    fn from(e: Entity) -> Self {
        Self::Existing(e)
    }
}

// ── Validation ──────────────────────────────────────────────────────

struct Fields<'a> {
    canonical_name: &'a str,
    common_names: &'a str,
    nickname: Option<&'a str>,
    location: &'a str,
    confidence: f64,
    device_id: Option<&'a str>,
    image_path: Option<&'a str>,
}

fn validate_fields(f: &Fields<'_>) -> Result<(), CoreError> {
    if f.canonical_name.trim().is_empty() {
        return Err(CoreError::validation("canonical name must not be empty"));
    }
    check_len("canonical name", f.canonical_name, limits::CANONICAL_NAME)?;
    check_len("common names", f.common_names, limits::COMMON_NAMES)?;
    check_len("location", f.location, limits::LOCATION)?;
    if let Some(nick) = f.nickname {
        check_len("nickname", nick, limits::NICKNAME)?;
    }
    if let Some(device) = f.device_id {
        if device.trim().is_empty() {
            return Err(CoreError::validation("device id must not be blank"));
        }
        check_len("device id", device, limits::DEVICE_ID)?;
    }
    if let Some(path) = f.image_path {
        check_len("image path", path, limits::IMAGE_PATH)?;
    }
    if !(0.0..=1.0).contains(&f.confidence) {
        return Err(CoreError::validation(format!(
            "confidence must be between 0 and 1, got {}",
            f.confidence
        )));
    }
    Ok(())
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    let len = value.chars().count();
    if len > max {
        return Err(CoreError::validation(format!(
            "{field} is {len} characters, limit is {max}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entity(nickname: Option<&str>) -> Entity {
        Entity {
            id: EntityId::new(1),
            canonical_name: "Monstera deliciosa".into(),
            common_names: "Swiss cheese plant".into(),
            nickname: nickname.map(Into::into),
            location: "Living room".into(),
            confidence: 0.93,
            created_at: Utc::now(),
            device_id: None,
            image_path: None,
        }
    }

    #[test]
    fn display_name_prefers_nickname() {
        assert_eq!(entity(Some("Monty")).display_name(), "Monty");
    }

    #[test]
    fn display_name_falls_back_when_unset_or_empty() {
        assert_eq!(entity(None).display_name(), "Monstera deliciosa");
        assert_eq!(entity(Some("")).display_name(), "Monstera deliciosa");
    }

    #[test]
    fn long_nickname_is_rejected() {
        let e = entity(Some(&"x".repeat(limits::NICKNAME + 1)));
        assert!(matches!(e.validate(), Err(CoreError::ValidationFailed { .. })));
    }

    #[test]
    fn nickname_at_limit_is_accepted() {
        let e = entity(Some(&"é".repeat(limits::NICKNAME)));
        assert!(e.validate().is_ok());
    }

    #[test]
    fn confidence_out_of_range_is_rejected() {
        let mut e = NewEntity::named("Ficus");
        e.confidence = 1.5;
        assert!(e.validate().is_err());
        e.confidence = f64::NAN;
        assert!(e.validate().is_err());
    }

    #[test]
    fn entity_id_parses_from_cli_text() {
        assert_eq!(" 42 ".parse::<EntityId>().unwrap(), EntityId::new(42));
        assert!("forty".parse::<EntityId>().is_err());
    }
}
