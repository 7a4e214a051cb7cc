use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpq::assumptions::AssumptionDefaults;
use crate::cpq::catalog::{CatalogError, CatalogSnapshot};
use crate::cpq::risk::RiskBands;
use crate::cpq::PipelineSettings;
use crate::domain::product::StructureType;

pub const DEFAULT_CONFIG_FILE: &str = "panelquote.toml";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub assumptions: AssumptionDefaults,
    pub risk: RiskBands,
    pub classifier: ClassifierConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogConfig {
    /// Catalog TOML file. The bundled sample catalog is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassifierConfig {
    pub tie_ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchConfig {
    pub max_workers: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub catalog_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub max_workers: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            assumptions: AssumptionDefaults::default(),
            risk: RiskBands::default(),
            classifier: ClassifierConfig { tie_ratio: 0.85 },
            batch: BatchConfig { max_workers: 4 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Engine tunables derived from this configuration.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            classifier_tie_ratio: self.classifier.tie_ratio,
            risk_bands: self.risk,
            assumptions: self.assumptions.clone(),
        }
    }

    /// Reads the configured catalog file, or the bundled catalog when none is set.
    pub fn load_catalog(&self) -> Result<CatalogSnapshot, CatalogError> {
        match &self.catalog.path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                CatalogSnapshot::from_toml_str(&raw)
            }
            None => CatalogSnapshot::builtin(),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
        }

        if let Some(assumptions) = patch.assumptions {
            if let Some(roof_span_m) = assumptions.roof_span_m {
                self.assumptions.roof_span_m = roof_span_m;
            }
            if let Some(cold_room_span_m) = assumptions.cold_room_span_m {
                self.assumptions.cold_room_span_m = cold_room_span_m;
            }
            if let Some(roof_structure) = assumptions.roof_structure {
                self.assumptions.roof_structure = roof_structure;
            }
            if let Some(wall_structure) = assumptions.wall_structure {
                self.assumptions.wall_structure = wall_structure;
            }
            if let Some(cold_room_structure) = assumptions.cold_room_structure {
                self.assumptions.cold_room_structure = cold_room_structure;
            }
        }

        if let Some(risk) = patch.risk {
            if let Some(formal_certified_max) = risk.formal_certified_max {
                self.risk.formal_certified_max = formal_certified_max;
            }
            if let Some(technical_conditioned_max) = risk.technical_conditioned_max {
                self.risk.technical_conditioned_max = technical_conditioned_max;
            }
            if let Some(commercial_quick_max) = risk.commercial_quick_max {
                self.risk.commercial_quick_max = commercial_quick_max;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(tie_ratio) = classifier.tie_ratio {
                self.classifier.tie_ratio = tie_ratio;
            }
        }

        if let Some(batch) = patch.batch {
            if let Some(max_workers) = batch.max_workers {
                self.batch.max_workers = max_workers;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PANELQUOTE_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("PANELQUOTE_ASSUMPTIONS_ROOF_SPAN_M") {
            self.assumptions.roof_span_m = parse_f64("PANELQUOTE_ASSUMPTIONS_ROOF_SPAN_M", &value)?;
        }
        if let Some(value) = read_env("PANELQUOTE_ASSUMPTIONS_COLD_ROOM_SPAN_M") {
            self.assumptions.cold_room_span_m =
                parse_f64("PANELQUOTE_ASSUMPTIONS_COLD_ROOM_SPAN_M", &value)?;
        }
        if let Some(value) = read_env("PANELQUOTE_ASSUMPTIONS_ROOF_STRUCTURE") {
            self.assumptions.roof_structure =
                parse_structure("PANELQUOTE_ASSUMPTIONS_ROOF_STRUCTURE", &value)?;
        }
        if let Some(value) = read_env("PANELQUOTE_ASSUMPTIONS_WALL_STRUCTURE") {
            self.assumptions.wall_structure =
                parse_structure("PANELQUOTE_ASSUMPTIONS_WALL_STRUCTURE", &value)?;
        }
        if let Some(value) = read_env("PANELQUOTE_ASSUMPTIONS_COLD_ROOM_STRUCTURE") {
            self.assumptions.cold_room_structure =
                parse_structure("PANELQUOTE_ASSUMPTIONS_COLD_ROOM_STRUCTURE", &value)?;
        }

        if let Some(value) = read_env("PANELQUOTE_RISK_FORMAL_CERTIFIED_MAX") {
            self.risk.formal_certified_max =
                parse_u32("PANELQUOTE_RISK_FORMAL_CERTIFIED_MAX", &value)?;
        }
        if let Some(value) = read_env("PANELQUOTE_RISK_TECHNICAL_CONDITIONED_MAX") {
            self.risk.technical_conditioned_max =
                parse_u32("PANELQUOTE_RISK_TECHNICAL_CONDITIONED_MAX", &value)?;
        }
        if let Some(value) = read_env("PANELQUOTE_RISK_COMMERCIAL_QUICK_MAX") {
            self.risk.commercial_quick_max =
                parse_u32("PANELQUOTE_RISK_COMMERCIAL_QUICK_MAX", &value)?;
        }

        if let Some(value) = read_env("PANELQUOTE_CLASSIFIER_TIE_RATIO") {
            self.classifier.tie_ratio = parse_f64("PANELQUOTE_CLASSIFIER_TIE_RATIO", &value)?;
        }

        if let Some(value) = read_env("PANELQUOTE_BATCH_MAX_WORKERS") {
            self.batch.max_workers = parse_usize("PANELQUOTE_BATCH_MAX_WORKERS", &value)?;
        }

        let log_level =
            read_env("PANELQUOTE_LOGGING_LEVEL").or_else(|| read_env("PANELQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PANELQUOTE_LOGGING_FORMAT").or_else(|| read_env("PANELQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(max_workers) = overrides.max_workers {
            self.batch.max_workers = max_workers;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_catalog(&self.catalog)?;
        validate_assumptions(&self.assumptions)?;
        validate_risk(&self.risk)?;
        validate_classifier(&self.classifier)?;
        validate_batch(&self.batch)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config/panelquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if let Some(path) = &catalog.path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "catalog.path must not be empty (unset it to use the bundled catalog)".to_string(),
            ));
        }
        let is_toml = path.extension().is_some_and(|extension| extension == "toml");
        if !is_toml {
            return Err(ConfigError::Validation(format!(
                "catalog.path must point to a .toml catalog file, got `{}`",
                path.display()
            )));
        }
    }
    Ok(())
}

fn validate_assumptions(assumptions: &AssumptionDefaults) -> Result<(), ConfigError> {
    for (key, value) in [
        ("assumptions.roof_span_m", assumptions.roof_span_m),
        ("assumptions.cold_room_span_m", assumptions.cold_room_span_m),
    ] {
        if !(value > 0.0 && value <= 30.0) {
            return Err(ConfigError::Validation(format!("{key} must be in range (0, 30] metres")));
        }
    }
    Ok(())
}

fn validate_risk(risk: &RiskBands) -> Result<(), ConfigError> {
    let ordered = risk.formal_certified_max < risk.technical_conditioned_max
        && risk.technical_conditioned_max < risk.commercial_quick_max;
    if !ordered {
        return Err(ConfigError::Validation(
            "risk bands must be strictly increasing: formal_certified_max < technical_conditioned_max < commercial_quick_max"
                .to_string(),
        ));
    }
    if risk.commercial_quick_max >= 120 {
        return Err(ConfigError::Validation(
            "risk.commercial_quick_max must stay below 120 so technical_block is reachable"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    if !(classifier.tie_ratio > 0.0 && classifier.tie_ratio <= 1.0) {
        return Err(ConfigError::Validation(
            "classifier.tie_ratio must be in range (0, 1]".to_string(),
        ));
    }
    Ok(())
}

fn validate_batch(batch: &BatchConfig) -> Result<(), ConfigError> {
    if batch.max_workers == 0 || batch.max_workers > 64 {
        return Err(ConfigError::Validation(
            "batch.max_workers must be in range 1..=64".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_structure(key: &str, value: &str) -> Result<StructureType, ConfigError> {
    value.parse::<StructureType>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    catalog: Option<CatalogPatch>,
    assumptions: Option<AssumptionsPatch>,
    risk: Option<RiskPatch>,
    classifier: Option<ClassifierPatch>,
    batch: Option<BatchPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct AssumptionsPatch {
    roof_span_m: Option<f64>,
    cold_room_span_m: Option<f64>,
    roof_structure: Option<StructureType>,
    wall_structure: Option<StructureType>,
    cold_room_structure: Option<StructureType>,
}

#[derive(Debug, Default, Deserialize)]
struct RiskPatch {
    formal_certified_max: Option<u32>,
    technical_conditioned_max: Option<u32>,
    commercial_quick_max: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    tie_ratio: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchPatch {
    max_workers: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::cpq::catalog::CatalogError;
    use crate::domain::product::StructureType;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_use_builtin_catalog() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        ensure(config.batch.max_workers == 4, "default worker bound should be 4")?;
        ensure(config.catalog.path.is_none(), "catalog path should default to the bundled catalog")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )?;
        let snapshot = config.load_catalog().map_err(|err| err.to_string())?;
        ensure(snapshot.fingerprint().starts_with("sha256:"), "catalog should be fingerprinted")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PANELQUOTE_ROOF_SPAN", "1.8");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("panelquote.toml");
            fs::write(
                &path,
                r#"
[assumptions]
roof_span_m = ${TEST_PANELQUOTE_ROOF_SPAN}
wall_structure = "concrete"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                (config.assumptions.roof_span_m - 1.8).abs() < f64::EPSILON,
                "roof span should be interpolated from environment",
            )?;
            ensure(
                config.assumptions.wall_structure == StructureType::Concrete,
                "wall structure should be read from file",
            )?;
            let settings = config.pipeline_settings();
            ensure(
                settings.assumptions == config.assumptions,
                "pipeline settings should carry the loaded assumptions",
            )
        })();

        clear_vars(&["TEST_PANELQUOTE_ROOF_SPAN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PANELQUOTE_LOG_LEVEL", "warn");
        env::set_var("PANELQUOTE_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["PANELQUOTE_LOG_LEVEL", "PANELQUOTE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PANELQUOTE_BATCH_MAX_WORKERS", "6");
        env::set_var("PANELQUOTE_CLASSIFIER_TIE_RATIO", "0.9");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("panelquote.toml");
            fs::write(
                &path,
                r#"
[batch]
max_workers = 2

[classifier]
tie_ratio = 0.7

[catalog]
path = "from-file.toml"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    catalog_path: Some(PathBuf::from("from-override.toml")),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.catalog.path == Some(PathBuf::from("from-override.toml")),
                "override catalog path should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.batch.max_workers == 6, "env worker bound should win over file")?;
            ensure(
                (config.classifier.tie_ratio - 0.9).abs() < f64::EPSILON,
                "env tie ratio should win over file",
            )?;
            Ok(())
        })();

        clear_vars(&["PANELQUOTE_BATCH_MAX_WORKERS", "PANELQUOTE_CLASSIFIER_TIE_RATIO"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PANELQUOTE_BATCH_MAX_WORKERS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("batch.max_workers")
            );
            ensure(has_message, "validation failure should mention batch.max_workers")
        })();

        clear_vars(&["PANELQUOTE_BATCH_MAX_WORKERS"]);
        result
    }

    #[test]
    fn unordered_risk_bands_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PANELQUOTE_RISK_FORMAL_CERTIFIED_MAX", "70");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::Validation(message)) => {
                ensure(message.contains("strictly increasing"), "message should explain band order")
            }
            Ok(_) => Err("unordered bands should fail validation".to_string()),
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&["PANELQUOTE_RISK_FORMAL_CERTIFIED_MAX"]);
        result
    }

    #[test]
    fn malformed_env_override_names_the_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PANELQUOTE_ASSUMPTIONS_ROOF_STRUCTURE", "bamboo");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, value }) => ensure(
                key == "PANELQUOTE_ASSUMPTIONS_ROOF_STRUCTURE" && value == "bamboo",
                "error should carry the offending variable",
            ),
            Ok(_) => Err("invalid structure should fail".to_string()),
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&["PANELQUOTE_ASSUMPTIONS_ROOF_STRUCTURE"]);
        result
    }

    #[test]
    fn unreadable_catalog_file_is_an_io_failure() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent-catalog.toml");
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { catalog_path: Some(path), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        match config.load_catalog() {
            Err(CatalogError::Io { path, source }) => ensure(
                path.ends_with("absent-catalog.toml") && source.kind() == io::ErrorKind::NotFound,
                "io failure should name the catalog path",
            ),
            Ok(_) => Err("absent catalog should not load".to_string()),
            Err(other) => Err(format!("unexpected error: {other}")),
        }
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");
        let result = AppConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "missing required file should fail",
        )
    }
}
