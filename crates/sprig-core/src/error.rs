// ── Core error types ──
//
// User-facing errors from sprig-core. Consumers never see raw SQL or
// HTTP failures; the `From` impls below translate storage and transport
// errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Storage errors ───────────────────────────────────────────────
    #[error("Catalog storage unavailable: {message}")]
    Storage { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Not found: {entity_type} {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Label {label:?} is shared by devices {}", device_ids.join(", "))]
    BindingConflict {
        label: String,
        device_ids: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Telemetry errors (raw, only where the caller asked for them) ──
    #[error("Telemetry service error: {message}")]
    Telemetry {
        message: String,
        /// HTTP status code (if the service answered at all).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Sync coordinator is not running")]
    CoordinatorStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn plant_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity_type: "plant".into(),
            identifier: id.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Returns `true` for failures of the local catalog itself.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// Returns `true` if a record or device could not be found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ── Conversion from storage errors ───────────────────────────────────

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound {
                entity_type: "plant".into(),
                identifier: String::new(),
            },
            other => CoreError::Storage {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Storage {
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sprig_api::Error> for CoreError {
    fn from(err: sprig_api::Error) -> Self {
        match err {
            sprig_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid telemetry URL: {e}"),
            },
            sprig_api::Error::UnusableBaseUrl(url) => CoreError::Config {
                message: format!("Telemetry base URL cannot carry paths: {url}"),
            },
            sprig_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS setup failed: {msg}"),
            },
            sprig_api::Error::Status { status, url } => CoreError::Telemetry {
                message: format!("HTTP {status} from {url}"),
                status: Some(status),
            },
            sprig_api::Error::Deserialization { message, body: _ } => CoreError::Telemetry {
                message: format!("malformed response: {message}"),
                status: None,
            },
            other @ (sprig_api::Error::Transport(_) | sprig_api::Error::Timeout { .. }) => {
                CoreError::Telemetry {
                    message: other.to_string(),
                    status: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = CoreError::from(sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn pool_closed_maps_to_storage() {
        let err = CoreError::from(sqlx::Error::PoolClosed);
        assert!(err.is_storage());
    }

    #[test]
    fn http_status_keeps_code() {
        let err = CoreError::from(sprig_api::Error::Status {
            status: 502,
            url: "http://host/iot/x".into(),
        });
        assert!(matches!(err, CoreError::Telemetry { status: Some(502), .. }));
    }

    #[test]
    fn conflict_message_lists_devices() {
        let err = CoreError::BindingConflict {
            label: "Kitchen".into(),
            device_ids: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "Label \"Kitchen\" is shared by devices a, b");
    }
}
