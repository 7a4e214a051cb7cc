use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Args;
use panelquote_core::config::LoadOptions;
use panelquote_core::errors::ApplicationError;
use panelquote_core::{
    quote_batch, quote_batch_parallel, BatchItem, BatchResult, QuotationOutput, QuotationStatus,
};
use serde::Serialize;

use crate::commands::{build_pipeline, CommandResult, EXIT_ATTENTION, EXIT_INTERNAL, EXIT_OK};

#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    #[arg(help = "JSON array or JSON-lines file of {correlation_id, text, mode_override}")]
    pub input: PathBuf,
    #[arg(long, help = "Worker bound; defaults to batch.max_workers")]
    pub workers: Option<usize>,
    #[arg(long, help = "Run items one after another on the calling thread")]
    pub sequential: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ItemReport {
    Ok { correlation_id: String, quotation: Box<QuotationOutput> },
    Error { correlation_id: String, message: String },
}

#[derive(Debug, Serialize)]
struct BatchReport {
    command: &'static str,
    total: usize,
    failed: usize,
    blocked: usize,
    workers: usize,
    results: Vec<ItemReport>,
}

pub fn run(options: &LoadOptions, args: &BatchArgs) -> CommandResult {
    let items = match read_items(args) {
        Ok(items) => items,
        Err(error) => {
            return CommandResult::from_error(
                "batch",
                ApplicationError::Input(format!("{error:#}")),
                "cli-batch",
            )
        }
    };

    let (config, pipeline) = match build_pipeline(options) {
        Ok(built) => built,
        Err(error) => return CommandResult::from_error("batch", error, "cli-batch"),
    };

    let workers = args.workers.unwrap_or(config.batch.max_workers).max(1);
    let results = if args.sequential {
        quote_batch(&pipeline, &items)
    } else {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(error) => {
                return CommandResult::failure(
                    "batch",
                    "internal",
                    format!("failed to initialize async runtime: {error}"),
                    EXIT_INTERNAL,
                )
            }
        };
        runtime.block_on(quote_batch_parallel(Arc::new(pipeline), items, workers))
    };

    let report = summarize(results, workers);
    let exit_code =
        if report.failed > 0 || report.blocked > 0 { EXIT_ATTENTION } else { EXIT_OK };
    CommandResult::report(exit_code, &report)
}

fn summarize(results: Vec<BatchResult>, workers: usize) -> BatchReport {
    let total = results.len();
    let mut failed = 0;
    let mut blocked = 0;
    let results = results
        .into_iter()
        .map(|result| match result.outcome {
            Ok(quotation) => {
                if quotation.status == QuotationStatus::Blocked {
                    blocked += 1;
                }
                ItemReport::Ok { correlation_id: result.correlation_id, quotation: Box::new(quotation) }
            }
            Err(error) => {
                failed += 1;
                ItemReport::Error { correlation_id: result.correlation_id, message: error.to_string() }
            }
        })
        .collect();

    BatchReport { command: "batch", total, failed, blocked, workers, results }
}

fn read_items(args: &BatchArgs) -> anyhow::Result<Vec<BatchItem>> {
    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("could not read batch file `{}`", args.input.display()))?;
    let trimmed = raw.trim_start();

    let items = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<BatchItem>>(trimmed).context("batch file is not a JSON array of items")?
    } else {
        trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str::<BatchItem>(line)
                    .with_context(|| format!("invalid batch item on line {}", index + 1))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    if items.is_empty() {
        bail!("batch file `{}` contains no items", args.input.display());
    }
    Ok(items)
}
