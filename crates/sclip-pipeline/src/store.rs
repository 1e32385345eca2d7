//! In-process job table.
//!
//! The store is the only place jobs mutate. Updates to a terminal job are
//! refused, which is what guarantees that no progress event is ever
//! delivered after a job's terminal event.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::watch;
use tracing::debug;

use sclip_models::{ClipJob, JobId};

struct JobEntry {
    job: ClipJob,
    updates: watch::Sender<ClipJob>,
    cancel: watch::Sender<bool>,
}

/// Shared table of live and terminal jobs.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job; returns the cancellation receiver for its runner.
    pub fn insert(&self, job: ClipJob) -> watch::Receiver<bool> {
        let (updates, _) = watch::channel(job.clone());
        let (cancel, cancel_rx) = watch::channel(false);
        let id = job.id.clone();

        self.jobs
            .write()
            .expect("job store lock poisoned")
            .insert(id, JobEntry {
                job,
                updates,
                cancel,
            });
        cancel_rx
    }

    /// Read-only snapshot of a job.
    pub fn snapshot(&self, id: &JobId) -> Option<ClipJob> {
        self.jobs
            .read()
            .expect("job store lock poisoned")
            .get(id)
            .map(|entry| entry.job.clone())
    }

    /// Subscribe to update snapshots for a job.
    pub fn subscribe(&self, id: &JobId) -> Option<watch::Receiver<ClipJob>> {
        self.jobs
            .read()
            .expect("job store lock poisoned")
            .get(id)
            .map(|entry| entry.updates.subscribe())
    }

    /// Apply a mutation and publish the new snapshot.
    ///
    /// Returns false (and changes nothing) when the job is unknown or
    /// already terminal.
    pub fn update<F>(&self, id: &JobId, mutate: F) -> bool
    where
        F: FnOnce(&mut ClipJob),
    {
        let mut jobs = self.jobs.write().expect("job store lock poisoned");
        let Some(entry) = jobs.get_mut(id) else {
            return false;
        };
        if entry.job.is_terminal() {
            debug!(job_id = %id, "dropping update for terminal job");
            return false;
        }

        mutate(&mut entry.job);
        // send_replace keeps the channel value fresh even before the first
        // subscriber shows up
        entry.updates.send_replace(entry.job.clone());
        true
    }

    /// Signal cancellation to a job's runner.
    ///
    /// A terminal or unknown job is a no-op returning false.
    pub fn request_cancel(&self, id: &JobId) -> bool {
        let jobs = self.jobs.read().expect("job store lock poisoned");
        let Some(entry) = jobs.get(id) else {
            return false;
        };
        if entry.job.is_terminal() {
            return false;
        }
        let _ = entry.cancel.send(true);
        true
    }

    /// Drop a job the caller has finished with. Live jobs are kept.
    pub fn remove_terminal(&self, id: &JobId) -> bool {
        let mut jobs = self.jobs.write().expect("job store lock poisoned");
        match jobs.get(id) {
            Some(entry) if entry.job.is_terminal() => {
                jobs.remove(id);
                true
            }
            _ => false,
        }
    }
}
