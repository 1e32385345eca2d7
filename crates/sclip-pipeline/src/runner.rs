//! Per-job worker task.
//!
//! Drives one job through admission checks, resolution, trim, filters, and
//! final placement. Cancellation is cooperative: checked between stages and
//! passed into every long-running call.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tracing::{error, info};

use sclip_media::{dir_is_writable, move_file, ResolvedSource};
use sclip_models::{ClipRequest, Entitlement, JobId};

use crate::config::PipelineConfig;
use crate::dirlock::DirLocks;
use crate::error::{PipelineError, PipelineResult};
use crate::filters::apply_filter_chain;
use crate::stages::{MediaStages, StageProgress};
use crate::store::JobStore;

/// Progress checkpoints, percent. The trim stage interpolates its band from
/// real encoder progress; everything else reports at stage boundaries.
const RESOLVE_START: u8 = 5;
const TRIM_START: u8 = 25;
const TRIM_END: u8 = 80;
const FILTERS_END: u8 = 95;

/// Shared dependencies of every job runner.
pub(crate) struct RunnerContext {
    pub config: PipelineConfig,
    pub stages: Arc<dyn MediaStages>,
    pub store: Arc<JobStore>,
    pub dir_locks: Arc<DirLocks>,
    pub job_slots: Arc<Semaphore>,
}

/// Run a job to its terminal state.
pub(crate) async fn run_job(
    ctx: Arc<RunnerContext>,
    id: JobId,
    entitlement: Entitlement,
    mut cancel: watch::Receiver<bool>,
) {
    match execute(&ctx, &id, entitlement, &mut cancel).await {
        Ok(result_path) => {
            info!(job_id = %id, path = %result_path.display(), "job ready");
            ctx.store.update(&id, |job| job.complete(result_path));
        }
        Err(PipelineError::Cancelled) => {
            info!(job_id = %id, "job cancelled");
            ctx.store.update(&id, |job| job.cancel());
        }
        Err(e) => {
            error!(job_id = %id, kind = %e.kind(), error = %e, "job failed");
            ctx.store.update(&id, |job| job.fail(e.to_job_error()));
        }
    }
}

async fn execute(
    ctx: &Arc<RunnerContext>,
    id: &JobId,
    entitlement: Entitlement,
    cancel: &mut watch::Receiver<bool>,
) -> PipelineResult<PathBuf> {
    let request = ctx
        .store
        .snapshot(id)
        .expect("job registered before its runner starts")
        .request;

    // Entitlement gate: denial is terminal without ever entering Processing
    if !entitlement.allows_format(request.format_id) {
        return Err(PipelineError::entitlement_denied(format!(
            "{} export requires the Pro plan",
            request.format_id
        )));
    }
    if let Some(option) = entitlement.denied_option(&request.options) {
        return Err(PipelineError::entitlement_denied(format!(
            "the {} option requires the Pro plan",
            option
        )));
    }

    // Dependencies before any network call
    ctx.stages.check_dependencies()?;
    ensure_live(cancel)?;

    // Bound global concurrency, then serialize per destination directory.
    // Both waits happen while still Pending and react to cancellation.
    ctx.store
        .update(id, |job| job.set_progress(0, "Waiting for a worker slot"));
    let _slot = acquire_slot(&ctx.job_slots, cancel).await?;

    ctx.store.update(id, |job| {
        job.set_progress(0, "Queued for destination directory")
    });
    let dir_lock = ctx.dir_locks.for_dir(&request.destination_dir);
    let _dir_guard = tokio::select! {
        guard = dir_lock.lock() => guard,
        _ = wait_cancelled(cancel) => return Err(PipelineError::Cancelled),
    };
    ensure_live(cancel)?;

    ctx.store.update(id, |job| {
        job.start();
        job.set_progress(1, "Starting");
    });

    tokio::fs::create_dir_all(&ctx.config.work_dir).await?;
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("sclip-{}-", request.source_id))
        .tempdir_in(&ctx.config.work_dir)?;

    // Resolve, with one bounded retry for retryable source failures
    ctx.store
        .update(id, |job| job.set_progress(RESOLVE_START, "Fetching source"));
    let resolved = resolve_with_retry(ctx, id, &request, work_dir.path(), cancel).await?;

    // Re-validate the range invariant against the true source duration;
    // reject rather than clamp
    request
        .time_range
        .check_within(resolved.source_duration_secs)
        .map_err(|e| PipelineError::InvalidRange(e.to_string()))?;

    ctx.store.update(id, |job| {
        job.set_progress(TRIM_START, format!("Source ready ({})", resolved.actual_format))
    });
    ensure_live(cancel)?;

    // Trim with real encoder progress mapped into the stage band
    let trimmed = {
        let store = Arc::clone(&ctx.store);
        let job_id = id.clone();
        let on_progress: StageProgress = Box::new(move |ratio| {
            let span = (TRIM_END - TRIM_START) as f64;
            let percent = TRIM_START + (ratio.clamp(0.0, 1.0) * span) as u8;
            store.update(&job_id, |job| job.set_progress(percent, "Trimming clip"));
        });
        ctx.stages
            .trim(&request, &resolved, work_dir.path(), cancel.clone(), on_progress)
            .await?
    };
    ctx.store
        .update(id, |job| job.set_progress(TRIM_END, "Trim complete"));
    ensure_live(cancel)?;

    // Optional filters; failures degrade to a warning
    let outcome = {
        let store = Arc::clone(&ctx.store);
        let job_id = id.clone();
        apply_filter_chain(
            ctx.stages.as_ref(),
            trimmed,
            &request,
            &resolved,
            work_dir.path(),
            cancel,
            move |stage| {
                store.update(&job_id, |job| {
                    job.set_progress(TRIM_END, format!("Applying {} filter", stage))
                });
            },
        )
        .await?
    };
    if let Some(warning) = &outcome.warning {
        ctx.store.update(id, |job| job.warn(warning.clone()));
    }
    ensure_live(cancel)?;

    // Final placement
    ctx.store
        .update(id, |job| job.set_progress(FILTERS_END, "Saving clip"));
    finalize(&request, &resolved, outcome.artifact).await
}

/// Move the artifact (and summary sidecar, if any) into the destination.
async fn finalize(
    request: &ClipRequest,
    resolved: &ResolvedSource,
    artifact: PathBuf,
) -> PipelineResult<PathBuf> {
    if !dir_is_writable(&request.destination_dir).await {
        return Err(PipelineError::DestinationUnwritable(
            request.destination_dir.clone(),
        ));
    }

    let file_name = format!(
        "{}_{}.mp4",
        request.source_id,
        chrono::Utc::now().timestamp()
    );
    let dest = request.destination_dir.join(file_name);

    move_file(&artifact, &dest)
        .await
        .map_err(|_| PipelineError::DestinationUnwritable(request.destination_dir.clone()))?;

    let sidecar = artifact.with_extension("summary.json");
    if sidecar.exists() {
        let _ = move_file(&sidecar, &dest.with_extension("summary.json")).await;
    }

    info!(
        dest = %dest.display(),
        title = %resolved.title,
        "clip placed in destination"
    );
    Ok(dest)
}

async fn resolve_with_retry(
    ctx: &Arc<RunnerContext>,
    id: &JobId,
    request: &ClipRequest,
    work_dir: &std::path::Path,
    cancel: &watch::Receiver<bool>,
) -> PipelineResult<ResolvedSource> {
    let mut attempt = 0;
    loop {
        match ctx.stages.resolve(request, work_dir, cancel).await {
            Ok(resolved) => return Ok(resolved),
            Err(e) if e.is_retryable() && attempt < ctx.config.source_retries => {
                attempt += 1;
                info!(
                    job_id = %id,
                    attempt,
                    error = %e,
                    "source unavailable, retrying"
                );
                ctx.store.update(id, |job| {
                    job.set_progress(RESOLVE_START, "Retrying source fetch")
                });
            }
            Err(e) => return Err(e),
        }
    }
}

/// Acquire a global job slot, reacting to cancellation while queued.
async fn acquire_slot(
    slots: &Arc<Semaphore>,
    cancel: &mut watch::Receiver<bool>,
) -> PipelineResult<tokio::sync::OwnedSemaphorePermit> {
    tokio::select! {
        permit = Arc::clone(slots).acquire_owned() => {
            permit.map_err(|_| PipelineError::Cancelled)
        }
        _ = wait_cancelled(cancel) => Err(PipelineError::Cancelled),
    }
}

fn ensure_live(cancel: &watch::Receiver<bool>) -> PipelineResult<()> {
    if *cancel.borrow() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow() {
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
