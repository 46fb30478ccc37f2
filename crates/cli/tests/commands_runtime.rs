use std::env;
use std::sync::{Mutex, OnceLock};

use funil_cli::commands::{config, doctor, migrate, seed, sweep};
use serde_json::Value;

const MANAGED_ENV_KEYS: &[&str] = &[
    "FUNIL_CONFIG",
    "FUNIL_DATABASE_URL",
    "FUNIL_DATABASE_MAX_CONNECTIONS",
    "FUNIL_DATABASE_TIMEOUT_SECS",
    "FUNIL_SERVER_BIND_ADDRESS",
    "FUNIL_SERVER_PORT",
    "FUNIL_SERVER_HEALTH_CHECK_PORT",
    "FUNIL_SERVER_GRACEFUL_SHUTDOWN_SECS",
    "FUNIL_MONITOR_POLL_INTERVAL_SECS",
    "FUNIL_SWEEP_ENABLED",
    "FUNIL_SWEEP_INTERVAL_SECS",
    "FUNIL_NOTIFY_ENABLED",
    "FUNIL_NOTIFY_WEBHOOK_URL",
    "FUNIL_NOTIFY_WEBHOOK_SECRET",
    "FUNIL_LOGGING_LEVEL",
    "FUNIL_LOGGING_FORMAT",
    "FUNIL_LOG_LEVEL",
    "FUNIL_LOG_FORMAT",
];

fn with_env(vars: &[(&str, &str)], test: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    for key in MANAGED_ENV_KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test();

    for key in MANAGED_ENV_KEYS {
        env::remove_var(key);
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be JSON")
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("FUNIL_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_invalid_configuration() {
    with_env(&[("FUNIL_MONITOR_POLL_INTERVAL_SECS", "soon")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_and_verifies_the_demo_dataset() {
    with_env(&[("FUNIL_DATABASE_URL", "sqlite::memory:?cache=shared")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected successful seed run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().expect("message field");
        assert!(message.contains("follow-up stages"));
    });
}

#[test]
fn sweep_runs_cleanly_on_an_empty_database() {
    with_env(&[("FUNIL_DATABASE_URL", "sqlite::memory:?cache=shared")], || {
        let result = sweep::run(false);
        assert_eq!(result.exit_code, 0, "expected successful sweep run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "sweep");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().expect("message field");
        assert!(message.contains("examined 0"));
    });
}

#[test]
fn sweep_dry_run_archives_nothing_and_lists_candidates() {
    with_env(&[("FUNIL_DATABASE_URL", "sqlite::memory:?cache=shared")], || {
        let result = sweep::run(true);
        assert_eq!(result.exit_code, 0, "expected successful dry run: {}", result.output);

        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().expect("message field");
        assert!(message.starts_with("dry run: 0 candidate(s)"));
    });
}

#[test]
fn doctor_json_reports_passing_checks() {
    with_env(&[("FUNIL_DATABASE_URL", "sqlite::memory:")], || {
        let output = doctor::run(true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        assert!(checks.iter().any(|check| check["name"] == "database_connectivity"
            && check["status"] == "pass"));
    });
}

#[test]
fn config_output_attributes_env_sources() {
    with_env(&[("FUNIL_DATABASE_URL", "sqlite::memory:")], || {
        let output = config::run();

        assert!(output.contains("database.url = sqlite::memory:  [env]"));
        assert!(output.contains("logging.level = info  [default]"));
    });
}
