use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use panelquote_core::config::LoadOptions;
use panelquote_core::errors::ApplicationError;
use panelquote_core::{
    DeterministicQualityEvaluator, OperatingMode, QualityEvaluator, QualityReport,
    QuotationOutput, QuotationPipeline, QuoteContext,
};
use serde::Serialize;

use crate::commands::{build_pipeline, CommandResult, EXIT_ATTENTION, EXIT_OK};

#[derive(Debug, Clone, Default, Args)]
pub struct QuoteArgs {
    #[arg(help = "Order text; use --file to read it from disk")]
    pub text: Option<String>,
    #[arg(long, help = "Read the order text from a file")]
    pub file: Option<PathBuf>,
    #[arg(long, help = "Force the operating mode: informational|internal_estimate|formal")]
    pub mode: Option<String>,
    #[arg(long, help = "Correlation id carried into logs and output")]
    pub correlation_id: Option<String>,
    #[arg(long, help = "Attach the offline quality report")]
    pub quality: bool,
}

#[derive(Debug, Serialize)]
struct QuoteReport<'a> {
    command: &'static str,
    quotation: &'a QuotationOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<QualityReport>,
}

pub fn run(options: &LoadOptions, args: &QuoteArgs) -> CommandResult {
    let correlation_id = args.correlation_id.clone().unwrap_or_else(|| "cli-quote".to_string());

    let (text, mode_override) = match read_request(args) {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::from_error(
                "quote",
                ApplicationError::Input(format!("{error:#}")),
                &correlation_id,
            )
        }
    };

    let (_, pipeline) = match build_pipeline(options) {
        Ok(built) => built,
        Err(error) => return CommandResult::from_error("quote", error, &correlation_id),
    };

    let output = pipeline.quote(
        &text,
        &QuoteContext { mode_override, correlation_id: Some(correlation_id) },
    );
    let quality = args.quality.then(|| DeterministicQualityEvaluator.evaluate(&output));
    let exit_code = if output.is_blocked() { EXIT_ATTENTION } else { EXIT_OK };

    CommandResult::report(exit_code, &QuoteReport { command: "quote", quotation: &output, quality })
}

fn read_request(args: &QuoteArgs) -> anyhow::Result<(String, Option<OperatingMode>)> {
    let text = match (&args.text, &args.file) {
        (Some(text), None) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("could not read order text from `{}`", path.display()))?,
        (Some(_), Some(_)) => bail!("pass the order text or --file, not both"),
        (None, None) => bail!("no order text given"),
    };

    let mode = args
        .mode
        .as_deref()
        .map(str::parse::<OperatingMode>)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    Ok((text, mode))
}
