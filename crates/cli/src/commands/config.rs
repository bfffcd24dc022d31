use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadops_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields: [(&str, String, &str); 12] = [
        ("database.url", config.database.url.clone(), "LEADOPS_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "LEADOPS_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "LEADOPS_DATABASE_TIMEOUT_SECS",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "LEADOPS_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "LEADOPS_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "LEADOPS_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        (
            "pipeline.storage_timeout_ms",
            config.pipeline.storage_timeout_ms.to_string(),
            "LEADOPS_PIPELINE_STORAGE_TIMEOUT_MS",
        ),
        (
            "pipeline.read_retry_attempts",
            config.pipeline.read_retry_attempts.to_string(),
            "LEADOPS_PIPELINE_READ_RETRY_ATTEMPTS",
        ),
        (
            "pipeline.read_retry_base_delay_ms",
            config.pipeline.read_retry_base_delay_ms.to_string(),
            "LEADOPS_PIPELINE_READ_RETRY_BASE_DELAY_MS",
        ),
        (
            "pipeline.read_retry_max_delay_ms",
            config.pipeline.read_retry_max_delay_ms.to_string(),
            "LEADOPS_PIPELINE_READ_RETRY_MAX_DELAY_MS",
        ),
        ("logging.level", config.logging.level.clone(), "LEADOPS_LOGGING_LEVEL"),
        ("logging.format", config.logging.format.as_str().to_string(), "LEADOPS_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.iter().map(|(key, value, env_key)| {
        render_line(
            key,
            value,
            field_source(key, Some(*env_key), config_file_doc.as_ref(), config_file_path.as_deref()),
        )
    }));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("leadops.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/leadops.toml");
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
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

#[cfg(test)]
mod tests {
    use super::{contains_path, field_source, render_line};

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: toml::Value = "[pipeline]\nstorage_timeout_ms = 250\n".parse().expect("toml");

        assert!(contains_path(&doc, "pipeline.storage_timeout_ms"));
        assert!(!contains_path(&doc, "pipeline.read_retry_attempts"));
        assert!(!contains_path(&doc, "server.port"));
    }

    #[test]
    fn file_source_names_the_file() {
        let doc: toml::Value = "[server]\nport = 5050\n".parse().expect("toml");
        let source = field_source(
            "server.port",
            Some("LEADOPS_TEST_UNSET_SERVER_PORT"),
            Some(&doc),
            Some(std::path::Path::new("leadops.toml")),
        );

        assert_eq!(source, "file (leadops.toml)");
        assert_eq!(
            render_line("server.port", "5050", source),
            "- server.port = 5050 (source: file (leadops.toml))"
        );
    }
}
