use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use panelquote_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use toml::Value;

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<builtin>".to_string());
    let assumptions = &config.assumptions;
    let risk = &config.risk;

    let entries = vec![
        entry("catalog.path", catalog_path, &["PANELQUOTE_CATALOG_PATH"]),
        entry(
            "assumptions.roof_span_m",
            assumptions.roof_span_m,
            &["PANELQUOTE_ASSUMPTIONS_ROOF_SPAN_M"],
        ),
        entry(
            "assumptions.cold_room_span_m",
            assumptions.cold_room_span_m,
            &["PANELQUOTE_ASSUMPTIONS_COLD_ROOM_SPAN_M"],
        ),
        entry(
            "assumptions.roof_structure",
            assumptions.roof_structure,
            &["PANELQUOTE_ASSUMPTIONS_ROOF_STRUCTURE"],
        ),
        entry(
            "assumptions.wall_structure",
            assumptions.wall_structure,
            &["PANELQUOTE_ASSUMPTIONS_WALL_STRUCTURE"],
        ),
        entry(
            "assumptions.cold_room_structure",
            assumptions.cold_room_structure,
            &["PANELQUOTE_ASSUMPTIONS_COLD_ROOM_STRUCTURE"],
        ),
        entry(
            "risk.formal_certified_max",
            risk.formal_certified_max,
            &["PANELQUOTE_RISK_FORMAL_CERTIFIED_MAX"],
        ),
        entry(
            "risk.technical_conditioned_max",
            risk.technical_conditioned_max,
            &["PANELQUOTE_RISK_TECHNICAL_CONDITIONED_MAX"],
        ),
        entry(
            "risk.commercial_quick_max",
            risk.commercial_quick_max,
            &["PANELQUOTE_RISK_COMMERCIAL_QUICK_MAX"],
        ),
        entry("classifier.tie_ratio", config.classifier.tie_ratio, &["PANELQUOTE_CLASSIFIER_TIE_RATIO"]),
        entry("batch.max_workers", config.batch.max_workers, &["PANELQUOTE_BATCH_MAX_WORKERS"]),
        entry(
            "logging.level",
            &config.logging.level,
            &["PANELQUOTE_LOGGING_LEVEL", "PANELQUOTE_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["PANELQUOTE_LOGGING_FORMAT", "PANELQUOTE_LOG_FORMAT"],
        ),
    ];

    let mut lines =
        vec!["effective config (source precedence: cli > env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|(key, value, env_keys)| {
        let origin = cli_source(key, options).unwrap_or_else(|| source(key, env_keys));
        render_line(key, &value, origin)
    }));
    lines.join("\n")
}

type Entry = (&'static str, String, &'static [&'static str]);

fn entry(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Entry {
    (key, value.to_string(), env_keys)
}

fn cli_source(key_path: &str, options: &LoadOptions) -> Option<String> {
    let overrides = &options.overrides;
    let flag = match key_path {
        "catalog.path" => overrides.catalog_path.as_ref().map(|_| "--catalog"),
        "logging.level" => overrides.log_level.as_ref().map(|_| "--log-level"),
        "logging.format" => overrides.log_format.as_ref().map(|_| "--log-format"),
        "batch.max_workers" => overrides.max_workers.as_ref().map(|_| "--workers"),
        _ => None,
    }?;
    Some(format!("cli ({flag})"))
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from(DEFAULT_CONFIG_FILE);
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config").join(DEFAULT_CONFIG_FILE);
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
