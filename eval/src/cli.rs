//! CLI command implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use fixer::io::config::load_config;
use tracing::{debug, info};

use crate::batch::run_batch;
use crate::config::{Overrides, apply_overrides};
use crate::instance::{dataset_path, load_instances, select};
use crate::predictions::PredictionStore;
use crate::report::{RunSummary, RunSummaryInput, file_sha256, summarize, write_summary};
use crate::run::{RunContext, run_instance};
use crate::workspace::DEFAULT_CLONE_URL_TEMPLATE;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Holds datasets/, entries/, predictions/ and runs/.
    #[arg(long, default_value = "/tmp/fixer")]
    pub root_path: PathBuf,
    #[arg(long, default_value = "princeton-nlp/SWE-bench_Lite")]
    pub dataset_name: String,
    #[arg(long, default_value = "dev")]
    pub split: String,
    /// Instances in flight at once.
    #[arg(long, default_value_t = 25)]
    pub concurrency: usize,
    #[arg(long)]
    pub max_steps: Option<u32>,
    #[arg(long, default_value_t = 0)]
    pub attempt: u32,
    /// Re-run instances that already have a prediction.
    #[arg(long)]
    pub overwrite: bool,
    #[arg(long)]
    pub no_evaluate: bool,
    /// Skip fix grading and meta-evaluation.
    #[arg(long)]
    pub no_grade: bool,
    /// `{repo}` is replaced with the instance's `owner/name`.
    #[arg(long, default_value = DEFAULT_CLONE_URL_TEMPLATE)]
    pub clone_url_template: String,
    /// Only run these dataset positions (repeatable).
    #[arg(long = "index")]
    pub indices: Vec<usize>,
}

/// Run a batch of instances and write its summary.
pub async fn run_dataset(config_path: PathBuf, args: RunArgs) -> Result<()> {
    let config = apply_overrides(
        load_config(&config_path)?,
        &Overrides {
            max_steps: args.max_steps,
            no_evaluate: args.no_evaluate,
        },
    )?;

    let data_path = dataset_path(&args.root_path, &args.dataset_name, &args.split);
    let dataset_sha256 = file_sha256(&data_path)?;
    let instances = select(load_instances(&data_path)?, &args.indices)?;
    debug!(count = instances.len(), path = %data_path.display(), "dataset loaded");

    let store = PredictionStore::init(&args.root_path).context("init prediction store")?;
    let ctx = Arc::new(RunContext {
        root: args.root_path.clone(),
        attempt: args.attempt,
        clone_url_template: args.clone_url_template.clone(),
        overwrite: args.overwrite,
        grade: !args.no_grade,
        config,
        store,
    });

    let started_at = Utc::now();
    let run_id = format!("eval-{}", started_at.format("%Y%m%d_%H%M%S"));
    info!(run_id = %run_id, instances = instances.len(), concurrency = args.concurrency, "batch started");

    let job_ctx = ctx.clone();
    let reports = run_batch(instances, args.concurrency, move |instance| {
        run_instance(&job_ctx, instance)
    })
    .await?;

    for report in &reports {
        match &report.error {
            Some(error) => println!(
                "run: instance={} outcome={} error={}",
                report.instance_id,
                report.outcome.as_str(),
                error
            ),
            None => println!(
                "run: instance={} outcome={}",
                report.instance_id,
                report.outcome.as_str()
            ),
        }
    }

    let summary = RunSummary::new(RunSummaryInput {
        run_id: &run_id,
        dataset_name: &args.dataset_name,
        split: &args.split,
        dataset_sha256,
        concurrency: args.concurrency,
        started_at,
        finished_at: Utc::now(),
        reports,
    });
    let path = write_summary(&args.root_path, &summary)?;
    println!(
        "run: run_id={} counts={:?} summary={}",
        run_id,
        summary.counts,
        path.display()
    );
    Ok(())
}

/// Show totals over the prediction store.
pub fn report(root_path: &std::path::Path) -> Result<()> {
    let store = PredictionStore::init(root_path)?;
    let summary = summarize(&store.all()?);
    println!(
        "report: predictions={} graded={}",
        summary.predictions, summary.graded
    );
    println!(
        "report: correct={} pass_tests={}",
        summary.correct, summary.pass_tests
    );
    if let Some(mean) = summary.mean_score {
        println!("report: mean_score={:.2}", mean);
    }
    Ok(())
}
