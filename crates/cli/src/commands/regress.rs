use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use panelquote_core::config::LoadOptions;
use panelquote_core::errors::ApplicationError;
use panelquote_core::{
    default_regression_cases, run_regression, DeterministicQualityEvaluator, RegressionCase,
    RegressionSummary,
};
use serde::Serialize;

use crate::commands::{build_pipeline, CommandResult, EXIT_ATTENTION, EXIT_OK};

#[derive(Debug, Clone, Default, Args)]
pub struct RegressArgs {
    #[arg(long, help = "JSON array of regression cases; the built-in suite runs when omitted")]
    pub cases: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RegressReport {
    command: &'static str,
    suite: String,
    catalog_fingerprint: String,
    summary: RegressionSummary,
}

pub fn run(options: &LoadOptions, args: &RegressArgs) -> CommandResult {
    let (suite, cases) = match load_cases(args) {
        Ok(loaded) => loaded,
        Err(error) => {
            return CommandResult::from_error(
                "regress",
                ApplicationError::Input(format!("{error:#}")),
                "cli-regress",
            )
        }
    };

    let (_, pipeline) = match build_pipeline(options) {
        Ok(built) => built,
        Err(error) => return CommandResult::from_error("regress", error, "cli-regress"),
    };

    let summary = run_regression(&pipeline, &DeterministicQualityEvaluator, &cases);
    let exit_code = if summary.all_passed() { EXIT_OK } else { EXIT_ATTENTION };
    let report = RegressReport {
        command: "regress",
        suite,
        catalog_fingerprint: pipeline.catalog().current().fingerprint().to_string(),
        summary,
    };
    CommandResult::report(exit_code, &report)
}

fn load_cases(args: &RegressArgs) -> anyhow::Result<(String, Vec<RegressionCase>)> {
    let Some(path) = &args.cases else {
        return Ok(("builtin".to_string(), default_regression_cases()));
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read regression cases from `{}`", path.display()))?;
    let cases = serde_json::from_str::<Vec<RegressionCase>>(&raw)
        .with_context(|| format!("`{}` is not a JSON array of regression cases", path.display()))?;
    Ok((path.display().to_string(), cases))
}
