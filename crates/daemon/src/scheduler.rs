//! Per-repository auto-sync scheduler.
//!
//! One recurring tokio task per repository id, keyed by a stable name
//! derived from the id. Re-registering an id replaces the prior schedule;
//! it never duplicates. One-shot syncs run independently of any recurring
//! schedule. Every firing is gated on network connectivity, and failing
//! executions are retried under the host-owned backoff policy here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use vaultsync_core::config::SchedulerSection;
use vaultsync_core::errors::SyncError;
use vaultsync_core::sync::SyncManager;

use crate::connectivity::ConnectivityChecker;

// ---------------------------------------------------------------------------
// Task contract
// ---------------------------------------------------------------------------

/// Result of one background task execution.
///
/// A task receives a single repository id as input and reports one of
/// these three states back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Retry,
    PermanentFailure,
}

/// Execute one background sync for `repo_id` per the task contract:
/// missing config or token fails permanently (no retry); a transient sync
/// failure asks the host to retry.
pub async fn execute_sync_task(manager: &SyncManager, repo_id: i64) -> TaskOutcome {
    match manager.sync_repository(repo_id).await {
        Ok(outcome) if outcome.success => TaskOutcome::Success,
        Ok(_) => TaskOutcome::Retry,
        Err(SyncError::RepositoryNotFound(_)) | Err(SyncError::MissingToken(_)) => {
            warn!(repo_id, "task preconditions missing, not retrying");
            TaskOutcome::PermanentFailure
        }
        Err(e) => {
            warn!(repo_id, error = %e, "sync failed, eligible for retry");
            TaskOutcome::Retry
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Host-owned retry policy for failing scheduled executions.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SchedulerSection) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            base_delay: Duration::from_secs(config.retry_base_delay_secs),
        }
    }

    /// Exponential backoff: base, 2×base, 4×base, ...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Aggregate counters across all scheduled executions.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub total_runs: AtomicU64,
    pub total_failures: AtomicU64,
    pub skipped_offline: AtomicU64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct ScheduledTask {
    name: String,
    interval: Duration,
    handle: JoinHandle<()>,
}

/// Registers and cancels recurring background syncs, one per repository.
pub struct AutoSyncScheduler {
    manager: Arc<SyncManager>,
    connectivity: Arc<ConnectivityChecker>,
    retry: RetryPolicy,
    tasks: Mutex<HashMap<i64, ScheduledTask>>,
    stats: Arc<SchedulerStats>,
}

impl AutoSyncScheduler {
    pub fn new(
        manager: Arc<SyncManager>,
        connectivity: ConnectivityChecker,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            manager,
            connectivity: Arc::new(connectivity),
            retry,
            tasks: Mutex::new(HashMap::new()),
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    /// Stable per-repository task name.
    pub fn task_name(repo_id: i64) -> String {
        format!("auto-sync-{repo_id}")
    }

    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }

    /// Register a recurring sync for `repo_id`.
    ///
    /// Re-registering replaces the prior schedule in place; exactly one
    /// recurring task per id exists afterwards.
    pub fn schedule_auto_sync(&self, repo_id: i64, interval_minutes: u32) {
        let interval = Duration::from_secs(u64::from(interval_minutes) * 60);
        let name = Self::task_name(repo_id);

        let manager = self.manager.clone();
        let connectivity = self.connectivity.clone();
        let retry = self.retry.clone();
        let stats = self.stats.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            // The first tick fires immediately; consume it so the first
            // sync happens one interval from registration.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_gated(&manager, &connectivity, &retry, &stats, repo_id).await;
            }
        });

        let mut tasks = self.tasks();
        if let Some(previous) = tasks.insert(
            repo_id,
            ScheduledTask {
                name: name.clone(),
                interval,
                handle,
            },
        ) {
            previous.handle.abort();
            info!(
                repo_id,
                task = name.as_str(),
                interval_minutes,
                "replaced existing schedule"
            );
        } else {
            info!(
                repo_id,
                task = name.as_str(),
                interval_minutes,
                "registered schedule"
            );
        }
    }

    /// Cancel the recurring sync for `repo_id`. No-op if absent.
    pub fn cancel_auto_sync(&self, repo_id: i64) {
        let mut tasks = self.tasks();
        match tasks.remove(&repo_id) {
            Some(task) => {
                task.handle.abort();
                info!(repo_id, task = task.name.as_str(), "cancelled schedule");
            }
            None => debug!(repo_id, "cancel requested for unscheduled repository"),
        }
    }

    /// Enqueue a one-shot sync immediately, independent of any recurring
    /// schedule. Also connectivity-gated.
    pub fn sync_now(&self, repo_id: i64) -> JoinHandle<TaskOutcome> {
        info!(repo_id, "one-shot sync requested");
        let manager = self.manager.clone();
        let connectivity = self.connectivity.clone();
        let retry = self.retry.clone();
        let stats = self.stats.clone();
        tokio::spawn(
            async move { run_gated(&manager, &connectivity, &retry, &stats, repo_id).await },
        )
    }

    /// Reconcile active schedules against the repository store.
    ///
    /// Enables new or changed schedules (replace-in-place) and cancels
    /// schedules for disabled or deleted repositories.
    pub fn reconcile(&self, repos: &[vaultsync_core::models::RepositoryConfig]) {
        let desired: HashMap<i64, u32> = repos
            .iter()
            .filter(|r| r.auto_sync)
            .map(|r| (r.id, r.sync_interval_minutes))
            .collect();

        for id in self.scheduled_ids() {
            if !desired.contains_key(&id) {
                self.cancel_auto_sync(id);
            }
        }
        for (id, minutes) in desired {
            let wanted = Duration::from_secs(u64::from(minutes) * 60);
            if self.scheduled_interval(id) != Some(wanted) {
                self.schedule_auto_sync(id, minutes);
            }
        }
    }

    pub fn is_scheduled(&self, repo_id: i64) -> bool {
        self.tasks().contains_key(&repo_id)
    }

    pub fn scheduled_interval(&self, repo_id: i64) -> Option<Duration> {
        self.tasks().get(&repo_id).map(|t| t.interval)
    }

    pub fn scheduled_ids(&self) -> Vec<i64> {
        self.tasks().keys().copied().collect()
    }

    pub fn active_count(&self) -> usize {
        self.tasks().len()
    }

    /// Abort every recurring task.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks();
        for (repo_id, task) in tasks.drain() {
            task.handle.abort();
            debug!(repo_id, task = task.name.as_str(), "aborted schedule");
        }
        info!("scheduler shut down");
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, HashMap<i64, ScheduledTask>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Run one gated execution: skip while offline, otherwise execute under
/// the host retry policy.
async fn run_gated(
    manager: &SyncManager,
    connectivity: &ConnectivityChecker,
    retry: &RetryPolicy,
    stats: &SchedulerStats,
    repo_id: i64,
) -> TaskOutcome {
    if !connectivity.is_online().await {
        stats.skipped_offline.fetch_add(1, Ordering::SeqCst);
        warn!(repo_id, "network unreachable, skipping sync");
        return TaskOutcome::Retry;
    }

    stats.total_runs.fetch_add(1, Ordering::SeqCst);
    let mut attempt = 1u32;
    loop {
        let outcome = execute_sync_task(manager, repo_id).await;
        match outcome {
            TaskOutcome::Success => return outcome,
            TaskOutcome::PermanentFailure => {
                stats.total_failures.fetch_add(1, Ordering::SeqCst);
                return outcome;
            }
            TaskOutcome::Retry => {
                if attempt >= retry.max_attempts {
                    stats.total_failures.fetch_add(1, Ordering::SeqCst);
                    error!(repo_id, attempt, "sync still failing, giving up");
                    return outcome;
                }
                let delay = retry.backoff_delay(attempt);
                warn!(
                    repo_id,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "sync failed, backing off"
                );
                time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
