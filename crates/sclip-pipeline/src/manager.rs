//! Public pipeline surface.

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tracing::info;

use sclip_license::EntitlementGate;
use sclip_media::dir_is_writable;
use sclip_models::{ClipJob, ClipRequest, Entitlement, JobId, RequestError};

use crate::config::PipelineConfig;
use crate::dirlock::DirLocks;
use crate::runner::{run_job, RunnerContext};
use crate::stages::MediaStages;
use crate::store::JobStore;

/// Source of per-job entitlement snapshots.
///
/// Resolved once at admission and immutable for the job's lifetime; an
/// entitlement change mid-job affects only later jobs.
pub trait EntitlementProvider: Send + Sync {
    fn current(&self) -> Entitlement;
}

impl EntitlementProvider for EntitlementGate {
    fn current(&self) -> Entitlement {
        self.snapshot()
    }
}

/// Fixed entitlement, for embedding and tests.
pub struct StaticEntitlement(pub Entitlement);

impl EntitlementProvider for StaticEntitlement {
    fn current(&self) -> Entitlement {
        self.0
    }
}

/// Owns every job for its lifetime. Callers hold job ids and snapshots.
pub struct JobManager {
    ctx: Arc<RunnerContext>,
    entitlements: Arc<dyn EntitlementProvider>,
}

impl JobManager {
    pub fn new(
        config: PipelineConfig,
        stages: Arc<dyn MediaStages>,
        entitlements: Arc<dyn EntitlementProvider>,
    ) -> Self {
        let job_slots = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let ctx = Arc::new(RunnerContext {
            config,
            stages,
            store: Arc::new(JobStore::new()),
            dir_locks: Arc::new(DirLocks::new()),
            job_slots,
        });
        Self { ctx, entitlements }
    }

    /// Admit a request and start its worker.
    ///
    /// Structural problems (bad range, unwritable destination) are rejected
    /// here synchronously; everything downstream surfaces through the job's
    /// state instead.
    pub async fn submit(&self, request: ClipRequest) -> Result<JobId, RequestError> {
        request.validate()?;
        if !dir_is_writable(&request.destination_dir).await {
            return Err(RequestError::DestinationUnwritable(
                request.destination_dir.clone(),
            ));
        }

        // Entitlement snapshot taken once, at admission
        let entitlement = self.entitlements.current();

        let job = ClipJob::new(request);
        let id = job.id.clone();
        let cancel_rx = self.ctx.store.insert(job);

        info!(job_id = %id, "job submitted");
        tokio::spawn(run_job(
            Arc::clone(&self.ctx),
            id.clone(),
            entitlement,
            cancel_rx,
        ));

        Ok(id)
    }

    /// Read-only snapshot of a job.
    pub fn job(&self, id: &JobId) -> Option<ClipJob> {
        self.ctx.store.snapshot(id)
    }

    /// Push subscription: receives a snapshot after every update, ending
    /// with the terminal one.
    pub fn subscribe(&self, id: &JobId) -> Option<watch::Receiver<ClipJob>> {
        self.ctx.store.subscribe(id)
    }

    /// Request cancellation. Returns false for unknown or already-terminal
    /// jobs (cancelling those is a no-op, not an error).
    pub fn cancel(&self, id: &JobId) -> bool {
        self.ctx.store.request_cancel(id)
    }

    /// Acknowledge a terminal job, releasing its record.
    pub fn acknowledge(&self, id: &JobId) -> bool {
        self.ctx.store.remove_terminal(id)
    }
}
