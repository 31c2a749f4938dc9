//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use sprig_config::ConfigError;
use sprig_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const STORAGE: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Storage ──────────────────────────────────────────────────────

    #[error("Plant catalog unavailable: {message}")]
    #[diagnostic(
        code(sprig::storage),
        help(
            "Check that the [storage] paths are writable.\n\
             Run: sprig config show"
        )
    )]
    Storage { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(sprig::not_found),
        help("Run: sprig {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Label '{label}' is shared by devices {devices}")]
    #[diagnostic(
        code(sprig::binding_conflict),
        help("Give one of them a distinct name: sprig alias set <device> <alias>")
    )]
    BindingConflict { label: String, devices: String },

    // ── Telemetry ────────────────────────────────────────────────────

    #[error("Telemetry service error: {message}")]
    #[diagnostic(
        code(sprig::telemetry),
        help(
            "Check that [telemetry] base_url is reachable.\n\
             Run: sprig config show"
        )
    )]
    Telemetry { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sprig::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(sprig::config),
        help("Fix the config file or SPRIG_* variables. Run: sprig config path")
    )]
    Config(Box<figment::Error>),

    #[error("Could not write configuration: {message}")]
    #[diagnostic(code(sprig::config_write))]
    ConfigWrite { message: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Operation '{action}' needs an interactive terminal")]
    #[diagnostic(
        code(sprig::interactive_required),
        help("{hint}")
    )]
    NonInteractive { action: String, hint: String },

    // ── Runtime ──────────────────────────────────────────────────────

    #[error("Internal error: {message}")]
    #[diagnostic(code(sprig::internal))]
    Internal { message: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(sprig::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    #[diagnostic(code(sprig::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Storage { .. } => exit_code::STORAGE,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::BindingConflict { .. } => exit_code::CONFLICT,
            Self::Telemetry { .. } => exit_code::CONNECTION,
            Self::Validation { .. } | Self::NonInteractive { .. } | Self::Config(_) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Storage { message } => CliError::Storage { message },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                list_command: if entity_type == "plant" {
                    "list".into()
                } else {
                    "devices".into()
                },
                resource_type: entity_type,
                identifier,
            },

            CoreError::BindingConflict { label, device_ids } => CliError::BindingConflict {
                label,
                devices: device_ids.join(", "),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Telemetry { message, status } => CliError::Telemetry {
                message: match status {
                    Some(code) => format!("HTTP {code}: {message}"),
                    None => message,
                },
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::CoordinatorStopped => CliError::Internal {
                message: "sync coordinator is not running".into(),
            },

            CoreError::Internal(message) => CliError::Internal { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Figment(inner) => CliError::Config(inner),
            ConfigError::Serialization(e) => CliError::ConfigWrite {
                message: e.to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::Storage {
                    message: "locked".into(),
                },
                exit_code::STORAGE,
            ),
            (
                CoreError::NotFound {
                    entity_type: "plant".into(),
                    identifier: "9".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::BindingConflict {
                    label: "Desk".into(),
                    device_ids: vec!["a".into(), "b".into()],
                },
                exit_code::CONFLICT,
            ),
            (
                CoreError::ValidationFailed {
                    message: "empty".into(),
                },
                exit_code::USAGE,
            ),
            (
                CoreError::Telemetry {
                    message: "refused".into(),
                    status: None,
                },
                exit_code::CONNECTION,
            ),
            (CoreError::CoordinatorStopped, exit_code::GENERAL),
        ];

        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn conflict_lists_both_devices() {
        let err = CliError::from(CoreError::BindingConflict {
            label: "Desk".into(),
            device_ids: vec!["a1".into(), "b2".into()],
        });
        assert_eq!(err.to_string(), "Label 'Desk' is shared by devices a1, b2");
    }

    #[test]
    fn telemetry_status_is_shown() {
        let err = CliError::from(CoreError::Telemetry {
            message: "Service Unavailable".into(),
            status: Some(503),
        });
        assert!(err.to_string().contains("HTTP 503"));
    }
}
