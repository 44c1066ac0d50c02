use std::env;
use std::sync::{Mutex, OnceLock};

use cobuy_cli::commands::catalog::NewProduct;
use cobuy_cli::commands::{catalog, config, doctor, purge, record, suggest};
use rust_decimal::Decimal;
use serde_json::Value;

#[test]
fn record_returns_success_with_memory_store() {
    with_workspace(&[], || {
        let result = record::run(None, &strings(&["1", "2", "3"]));
        assert_eq!(result.exit_code, 0, "expected successful record: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "record");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["distinct_products"], 3);
    });
}

#[test]
fn record_with_order_id_echoes_order() {
    with_workspace(&[], || {
        let result = record::run(Some("order-17"), &strings(&["4", "5"]));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["order_id"], "order-17");
    });
}

#[test]
fn record_single_distinct_product_is_a_noop_success() {
    with_workspace(&[], || {
        let result = record::run(None, &strings(&["7", "7"]));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["distinct_products"], 1);
        assert_eq!(payload["message"], "fewer than two distinct products; nothing recorded");
    });
}

#[test]
fn suggest_returns_product_list() {
    with_workspace(&[], || {
        let result = suggest::run(&strings(&["1", "2"]), Some(4), false);
        assert_eq!(result.exit_code, 0, "expected successful suggest: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "suggest");
        assert!(payload["data"]["products"].is_array());
    });
}

#[test]
fn suggest_with_scores_returns_ranked_list() {
    with_workspace(&[], || {
        let result = suggest::run(&strings(&["1"]), None, true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert!(payload["data"]["ranked"].is_array());
    });
}

#[test]
fn suggest_reports_unreachable_store_as_dependency_failure() {
    with_workspace(
        &[
            ("COBUY_AFFINITY_URL", "redis://127.0.0.1:1/0"),
            ("COBUY_AFFINITY_MAX_RETRIES", "0"),
            ("COBUY_AFFINITY_TIMEOUT_MS", "300"),
        ],
        || {
            let result = suggest::run(&strings(&["1", "2"]), None, false);
            assert_eq!(result.exit_code, 3);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "affinity_store");
        },
    );
}

#[test]
fn invalid_affinity_url_is_a_config_failure() {
    with_workspace(&[("COBUY_AFFINITY_URL", "http://cache:6379")], || {
        let result = record::run(None, &strings(&["1", "2"]));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "record");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn catalog_add_then_purge_counts_catalog_products() {
    with_workspace(&[], || {
        for id in ["1", "2"] {
            let result = catalog::add(NewProduct {
                id: id.to_string(),
                name: format!("Product {id}"),
                slug: format!("product-{id}"),
                price: Decimal::new(1999, 2),
                available: true,
            });
            assert_eq!(result.exit_code, 0, "catalog add failed: {}", result.output);
        }

        let result = purge::run(&[]);
        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output)["data"]["keys_deleted"], 2);

        let result = purge::run(&strings(&["9"]));
        assert_eq!(parse_payload(&result.output)["data"]["keys_deleted"], 1);
    });
}

#[test]
fn catalog_add_rejects_negative_price() {
    with_workspace(&[], || {
        let result = catalog::add(NewProduct {
            id: "3".to_string(),
            name: "Refund".to_string(),
            slug: "refund".to_string(),
            price: Decimal::new(-100, 2),
            available: true,
        });

        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");
    });
}

#[test]
fn catalog_remove_reports_missing_product() {
    with_workspace(&[], || {
        let result = catalog::remove("404");
        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output)["message"], "product 404 was not in the catalog");
    });
}

#[test]
fn doctor_json_passes_with_memory_store_and_file_catalog() {
    with_workspace(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "doctor failed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(names, vec!["config_validation", "affinity_store", "catalog_connectivity"]);
    });
}

#[test]
fn doctor_skips_dependencies_when_config_is_invalid() {
    with_workspace(&[("COBUY_AFFINITY_TIMEOUT_MS", "0")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 2);
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] affinity_store"));
        assert!(result.output.contains("- [skip] catalog_connectivity"));
    });
}

#[test]
fn config_redacts_store_credentials_and_attributes_env_source() {
    with_workspace(&[("COBUY_AFFINITY_URL", "redis://:hunter2@cache:6379/2")], || {
        let output = config::run();

        assert!(!output.contains("hunter2"), "password leaked: {output}");
        assert!(output.contains(
            "- affinity.url = redis://***@cache:6379/2 (source: env (COBUY_AFFINITY_URL))"
        ));
        assert!(output.contains("- recommender.default_limit = 6 (source: default)"));
    });
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

/// Runs `test_fn` with a memory affinity store and a fresh file catalog, plus `vars`.
fn with_workspace(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog_url = format!("sqlite://{}", dir.path().join("catalog.db").display());

    let mut all_vars = vec![
        ("COBUY_AFFINITY_URL", "memory"),
        ("COBUY_CATALOG_DATABASE_URL", catalog_url.as_str()),
        ("COBUY_LOG_LEVEL", "warn"),
    ];
    for (key, value) in vars {
        all_vars.retain(|(existing, _)| existing != key);
        all_vars.push((*key, *value));
    }

    with_env(&all_vars, test_fn);
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "COBUY_AFFINITY_URL",
        "COBUY_AFFINITY_TIMEOUT_MS",
        "COBUY_AFFINITY_MAX_RETRIES",
        "COBUY_CATALOG_DATABASE_URL",
        "COBUY_CATALOG_MAX_CONNECTIONS",
        "COBUY_CATALOG_TIMEOUT_SECS",
        "COBUY_RECOMMENDER_KEY_PREFIX",
        "COBUY_RECOMMENDER_TEMP_KEY_PREFIX",
        "COBUY_RECOMMENDER_TEMP_KEY_NAMING",
        "COBUY_RECOMMENDER_DEFAULT_LIMIT",
        "COBUY_RECOMMENDER_CART_LIMIT",
        "COBUY_RECOMMENDER_DETAIL_LIMIT",
        "COBUY_LOGGING_LEVEL",
        "COBUY_LOGGING_FORMAT",
        "COBUY_LOG_LEVEL",
        "COBUY_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
