use panelquote_core::config::{AppConfig, LoadOptions};
use panelquote_core::cpq::catalog::{CatalogHandle, CatalogSnapshot};
use panelquote_core::{DefaultQuotationPipeline, QuotationPipeline, QuoteContext};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_ATTENTION, EXIT_OK};

const SMOKE_TEXT: &str = "cotizar isopanel eps 100 mm para pared, 20 paneles de 3 m";

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

impl DoctorCheck {
    fn skipped(name: &'static str, because: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {because}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { EXIT_OK } else { EXIT_ATTENTION };

    if json_output {
        return CommandResult::report(exit_code, &report);
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            match config.load_catalog() {
                Ok(snapshot) => {
                    checks.push(DoctorCheck {
                        name: "catalog_load",
                        status: CheckStatus::Pass,
                        details: format!("catalog fingerprint {}", snapshot.fingerprint()),
                    });
                    checks.push(check_pipeline_smoke(&config, snapshot));
                }
                Err(error) => {
                    checks.push(DoctorCheck {
                        name: "catalog_load",
                        status: CheckStatus::Fail,
                        details: error.to_string(),
                    });
                    checks.push(DoctorCheck::skipped("pipeline_smoke", "the catalog did not load"));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck::skipped("catalog_load", "configuration did not load"));
            checks.push(DoctorCheck::skipped("pipeline_smoke", "configuration did not load"));
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

fn check_pipeline_smoke(config: &AppConfig, snapshot: CatalogSnapshot) -> DoctorCheck {
    let pipeline = DefaultQuotationPipeline::with_settings(
        CatalogHandle::new(snapshot),
        config.pipeline_settings(),
    );
    let output = pipeline.quote(
        SMOKE_TEXT,
        &QuoteContext { correlation_id: Some("doctor-smoke".to_string()), ..QuoteContext::default() },
    );

    if output.bom.items.is_empty() {
        return DoctorCheck {
            name: "pipeline_smoke",
            status: CheckStatus::Fail,
            details: format!("sample wall order produced no BOM lines (status {:?})", output.status),
        };
    }

    DoctorCheck {
        name: "pipeline_smoke",
        status: CheckStatus::Pass,
        details: format!(
            "sample wall order quoted with {} BOM lines, subtotal {}",
            output.bom.items.len(),
            output.pricing.grand_subtotal
        ),
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
