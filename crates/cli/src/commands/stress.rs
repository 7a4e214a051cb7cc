use clap::Args;
use panelquote_core::config::LoadOptions;
use panelquote_core::{run_stress, DeterministicQualityEvaluator, StressConfig, StressReport};
use serde::Serialize;

use crate::commands::{build_pipeline, CommandResult, EXIT_ATTENTION, EXIT_BAD_INPUT, EXIT_OK};

pub const MAX_ITERATIONS: usize = 100_000;

#[derive(Debug, Clone, Args)]
pub struct StressArgs {
    #[arg(long, default_value_t = 42, help = "Seed for the order text generator")]
    pub seed: u64,
    #[arg(long, default_value_t = 200, help = "Number of generated orders")]
    pub iterations: usize,
}

impl Default for StressArgs {
    fn default() -> Self {
        let config = StressConfig::default();
        Self { seed: config.seed, iterations: config.iterations }
    }
}

#[derive(Debug, Serialize)]
struct StressOutput {
    command: &'static str,
    report: StressReport,
}

pub fn run(options: &LoadOptions, args: &StressArgs) -> CommandResult {
    if args.iterations == 0 || args.iterations > MAX_ITERATIONS {
        return CommandResult::failure(
            "stress",
            "bad_request",
            format!("--iterations must be in range 1..={MAX_ITERATIONS}"),
            EXIT_BAD_INPUT,
        );
    }

    let (_, pipeline) = match build_pipeline(options) {
        Ok(built) => built,
        Err(error) => return CommandResult::from_error("stress", error, "cli-stress"),
    };

    let report = run_stress(
        &pipeline,
        &DeterministicQualityEvaluator,
        StressConfig { seed: args.seed, iterations: args.iterations },
    );
    let exit_code = if report.is_clean() { EXIT_OK } else { EXIT_ATTENTION };
    CommandResult::report(exit_code, &StressOutput { command: "stress", report })
}
