use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use funil_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut line = |key: &str, value: &str, env_var: Option<&str>| {
        lines.push(render_line(
            key,
            value,
            field_source(key, env_var, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    };

    line("database.url", &config.database.url, Some("FUNIL_DATABASE_URL"));
    line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        Some("FUNIL_DATABASE_MAX_CONNECTIONS"),
    );
    line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        Some("FUNIL_DATABASE_TIMEOUT_SECS"),
    );
    line("server.bind_address", &config.server.bind_address, Some("FUNIL_SERVER_BIND_ADDRESS"));
    line("server.port", &config.server.port.to_string(), Some("FUNIL_SERVER_PORT"));
    line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        Some("FUNIL_SERVER_HEALTH_CHECK_PORT"),
    );
    line(
        "monitor.poll_interval_secs",
        &config.monitor.poll_interval_secs.to_string(),
        Some("FUNIL_MONITOR_POLL_INTERVAL_SECS"),
    );
    line("sweep.enabled", &config.sweep.enabled.to_string(), Some("FUNIL_SWEEP_ENABLED"));
    line(
        "sweep.interval_secs",
        &config.sweep.interval_secs.to_string(),
        Some("FUNIL_SWEEP_INTERVAL_SECS"),
    );
    line("notify.enabled", &config.notify.enabled.to_string(), Some("FUNIL_NOTIFY_ENABLED"));
    line(
        "notify.webhook_url",
        config.notify.webhook_url.as_deref().unwrap_or("(unset)"),
        Some("FUNIL_NOTIFY_WEBHOOK_URL"),
    );
    let webhook_secret = config
        .notify
        .webhook_secret
        .as_ref()
        .map(|secret| redact_token(secret.expose_secret()))
        .unwrap_or_else(|| "(unset)".to_string());
    line("notify.webhook_secret", &webhook_secret, Some("FUNIL_NOTIFY_WEBHOOK_SECRET"));
    line("logging.level", &config.logging.level, Some("FUNIL_LOGGING_LEVEL"));
    line("logging.format", &format!("{:?}", config.logging.format), Some("FUNIL_LOGGING_FORMAT"));

    lines.join("\n")
}

fn render_line(key: &str, value: &str, source: &'static str) -> String {
    format!("  {key} = {value}  [{source}]")
}

fn detect_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("FUNIL_CONFIG") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    let default = PathBuf::from("funil.toml");
    default.exists().then_some(default)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key: &str,
    env_var: Option<&str>,
    doc: Option<&Value>,
    _path: Option<&Path>,
) -> &'static str {
    if let Some(env_var) = env_var {
        if env::var(env_var).map(|value| !value.trim().is_empty()).unwrap_or(false) {
            return "env";
        }
    }
    if let Some(doc) = doc {
        let mut cursor = doc;
        let mut found = true;
        for part in key.split('.') {
            match cursor.get(part) {
                Some(next) => cursor = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            return "file";
        }
    }
    "default"
}

fn redact_token(token: &str) -> String {
    if token.is_empty() {
        return "(unset)".to_string();
    }
    let visible: String = token.chars().take(4).collect();
    format!("{visible}***")
}
