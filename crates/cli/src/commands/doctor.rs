use cobuy_core::config::{AppConfig, LoadOptions};
use cobuy_core::recommender::CatalogLookup;
use cobuy_db::{connect_affinity_store, connect_catalog, SqlCatalog};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_DEPENDENCY};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn exit_code(&self) -> u8 {
        let failed = |name: &str| {
            self.checks.iter().any(|check| check.name == name && check.status == CheckStatus::Fail)
        };
        if failed("config_validation") {
            EXIT_CONFIG
        } else if self.overall_status == CheckStatus::Fail {
            EXIT_DEPENDENCY
        } else {
            0
        }
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_dependencies(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["affinity_store", "catalog_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_dependencies(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let details = format!("failed to initialize async runtime: {error}");
            return ["affinity_store", "catalog_connectivity"]
                .into_iter()
                .map(|name| DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: details.clone(),
                })
                .collect();
        }
    };

    runtime.block_on(async {
        vec![check_affinity_store(config).await, check_catalog(config).await]
    })
}

async fn check_affinity_store(config: &AppConfig) -> DoctorCheck {
    let backend = if config.affinity.is_memory() { "in-process memory store" } else { "redis" };

    let result = match connect_affinity_store(&config.affinity).await {
        Ok(store) => store.ping().await,
        Err(error) => Err(error),
    };

    match result {
        Ok(()) => DoctorCheck {
            name: "affinity_store",
            status: CheckStatus::Pass,
            details: format!("{backend} answered ping"),
        },
        Err(error) => DoctorCheck {
            name: "affinity_store",
            status: CheckStatus::Fail,
            details: format!("{backend} unreachable: {error}"),
        },
    }
}

async fn catalog_product_count(config: &AppConfig) -> Result<usize, String> {
    let pool = connect_catalog(&config.catalog).await.map_err(|error| error.to_string())?;
    let catalog = SqlCatalog::new(pool.clone());
    let products = catalog.list_product_ids().await.map_err(|error| error.to_string());
    pool.close().await;
    products.map(|ids| ids.len())
}

async fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let result = catalog_product_count(config).await;

    match result {
        Ok(products) => DoctorCheck {
            name: "catalog_connectivity",
            status: CheckStatus::Pass,
            details: format!(
                "connected using `{}` ({products} products)",
                config.catalog.database_url
            ),
        },
        Err(error) => {
            DoctorCheck { name: "catalog_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
