pub mod batch;
pub mod config;
pub mod doctor;
pub mod quote;
pub mod regress;
pub mod stress;

use panelquote_core::config::{AppConfig, LoadOptions};
use panelquote_core::cpq::catalog::CatalogHandle;
use panelquote_core::errors::{ApplicationError, InterfaceError};
use panelquote_core::DefaultQuotationPipeline;
use serde::Serialize;

pub const EXIT_OK: u8 = 0;
/// The command ran but its result needs attention (blocked quote, failed case).
pub const EXIT_ATTENTION: u8 = 1;
pub const EXIT_BAD_INPUT: u8 = 2;
pub const EXIT_UNAVAILABLE: u8 = 3;
pub const EXIT_INTERNAL: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    correlation_id: Option<String>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
        };
        Self { exit_code: EXIT_OK, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    /// Maps a boundary error to its interface class and exit code.
    pub fn from_error(command: &str, error: ApplicationError, correlation_id: &str) -> Self {
        let detail = error.to_string();
        let interface = error.into_interface(correlation_id);
        let (error_class, exit_code) = match &interface {
            InterfaceError::BadRequest { .. } => ("bad_request", EXIT_BAD_INPUT),
            InterfaceError::ServiceUnavailable { .. } => ("service_unavailable", EXIT_UNAVAILABLE),
            InterfaceError::Internal { .. } => ("internal", EXIT_INTERNAL),
        };
        tracing::warn!(
            event_name = "cli.command.failed",
            correlation_id = interface.correlation_id(),
            command,
            error_class,
            error = %detail,
            "command failed"
        );
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: format!("{} ({detail})", interface.user_message()),
            correlation_id: Some(interface.correlation_id().to_string()),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    /// Pretty JSON report for commands that return structured data.
    pub fn report(exit_code: u8, payload: &impl Serialize) -> Self {
        let output = serde_json::to_string_pretty(payload).unwrap_or_else(|error| {
            format!(
                "{{\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        Self { exit_code, output }
    }
}

fn serialize_payload(payload: &CommandOutcome) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    })
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Loads configuration and catalog and builds the default pipeline.
pub fn build_pipeline(
    options: &LoadOptions,
) -> Result<(AppConfig, DefaultQuotationPipeline), ApplicationError> {
    let config = AppConfig::load(options.clone())?;
    let snapshot = config.load_catalog()?;
    tracing::debug!(
        event_name = "cli.catalog.loaded",
        correlation_id = "bootstrap",
        fingerprint = snapshot.fingerprint(),
        "catalog snapshot loaded"
    );
    let pipeline = DefaultQuotationPipeline::with_settings(
        CatalogHandle::new(snapshot),
        config.pipeline_settings(),
    );
    Ok((config, pipeline))
}
