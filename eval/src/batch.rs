//! Admission-gated batch execution.
//!
//! Every instance runs on a blocking worker thread once it holds a permit, so
//! at most `concurrency` runs are in flight. A failing or panicking run turns
//! into an `error` report and never affects its siblings.

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::instance::Instance;
use crate::run::InstanceReport;

/// Run `job` over every instance, returning reports in input order.
pub async fn run_batch<F>(
    instances: Vec<Instance>,
    concurrency: usize,
    job: F,
) -> Result<Vec<InstanceReport>>
where
    F: Fn(&Instance) -> Result<InstanceReport> + Send + Sync + 'static,
{
    if concurrency == 0 {
        bail!("concurrency must be > 0");
    }
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let job = Arc::new(job);
    let mut handles = Vec::with_capacity(instances.len());

    for (index, instance) in instances.into_iter().enumerate() {
        let permit = semaphore.clone().acquire_owned().await?;
        let instance_id = instance.instance_id.clone();
        let job = job.clone();
        info!(index, instance_id = %instance_id, "admitted");
        handles.push((
            instance_id,
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                (job)(&instance)
            }),
        ));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for (instance_id, handle) in handles {
        let report = match handle.await {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => {
                warn!(instance_id = %instance_id, error = %format!("{err:#}"), "instance failed");
                InstanceReport::failed(&instance_id, format!("{err:#}"))
            }
            Err(err) => {
                warn!(instance_id = %instance_id, error = %err, "instance worker panicked");
                InstanceReport::failed(&instance_id, format!("worker panicked: {err}"))
            }
        };
        reports.push(report);
    }
    Ok(reports)
}
