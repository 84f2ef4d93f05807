use std::env;
use std::sync::{Mutex, OnceLock};

use replog_cli::commands::{chat, migrate};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[
            ("REPLOG_DATABASE_URL", "sqlite::memory:"),
            ("REPLOG_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
        },
    );
}

#[test]
fn migrate_returns_config_failure_with_bad_database_url() {
    with_env(&[("REPLOG_DATABASE_URL", "postgres://localhost/replog")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn chat_logs_an_interaction_through_the_rules_provider() {
    with_env(
        &[
            ("REPLOG_DATABASE_URL", "sqlite::memory:"),
            ("REPLOG_DATABASE_MAX_CONNECTIONS", "1"),
            ("REPLOG_LLM_PROVIDER", "rules"),
        ],
        || {
            let result = chat::run("Met Dr. Patel today about product efficacy, went well", None);
            assert_eq!(result.exit_code, 0, "expected successful chat run: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "chat");
            assert_eq!(payload["status"], "ok");
            assert!(
                payload["message"].as_str().is_some_and(|reply| reply.contains("saved")),
                "reply should confirm the save: {}",
                result.output
            );
        },
    );
}

#[test]
fn chat_without_an_identifiable_hcp_still_replies() {
    with_env(
        &[
            ("REPLOG_DATABASE_URL", "sqlite::memory:"),
            ("REPLOG_DATABASE_MAX_CONNECTIONS", "1"),
            ("REPLOG_LLM_PROVIDER", "rules"),
        ],
        || {
            let result = chat::run("just checking in", None);
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert!(
                payload["message"].as_str().is_some_and(|reply| reply.contains('?')),
                "reply should ask a clarifying question: {}",
                result.output
            );
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be JSON")
}

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn with_env(vars: &[(&str, &str)], body: impl FnOnce()) {
    let guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let managed = [
        "REPLOG_DATABASE_URL",
        "REPLOG_DATABASE_MAX_CONNECTIONS",
        "REPLOG_LLM_PROVIDER",
        "REPLOG_LLM_API_KEY",
    ];
    let previous: Vec<(String, Option<String>)> =
        managed.iter().map(|key| ((*key).to_string(), env::var(key).ok())).collect();

    for key in managed {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    body();

    for (key, value) in previous {
        match value {
            Some(value) => env::set_var(&key, value),
            None => env::remove_var(&key),
        }
    }

    drop(guard);
}
