//! Key-deduplicated scheduler for background reconciliation jobs.
//!
//! # Responsibility
//! - Register the start-up one-shot and the periodic sync job.
//! - Dispatch due jobs to the worker, deferring while offline.
//!
//! # Invariants
//! - Jobs are deduplicated by key, not by call-site; `Keep` drops a request
//!   for an already-registered key without resetting its deadline.
//! - Network-gated jobs keep their deadline while offline and dispatch once
//!   connectivity returns.
//! - One-shot jobs are consumed by dispatch regardless of the worker
//!   outcome; retrying failures is the worker's job, never the scheduler's.

use crate::sync::worker::{NetworkMonitor, SyncWorker};
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key of the one-shot reconciliation job enqueued at process start.
pub const SYNC_ONCE_JOB_KEY: &str = "notes-sync-once";
/// Key of the recurring reconciliation job.
pub const SYNC_PERIODIC_JOB_KEY: &str = "notes-sync-periodic";
/// Baseline interval of the recurring job.
pub const DEFAULT_SYNC_INTERVAL_MS: i64 = 6 * 60 * 60 * 1000;

/// Scheduler registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    InvalidJobKey(String),
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJobKey(value) => write!(f, "job key is invalid: {value}"),
        }
    }
}

impl Error for SchedulerError {}

/// Behavior when a job with the same key is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingJobPolicy {
    /// Drop the new request and keep the registered job untouched.
    Keep,
    /// Replace the registered job, resetting its deadline.
    Replace,
}

/// Cadence of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Runs once, then leaves the registry.
    Once,
    /// Re-arms at `interval_ms` after every dispatch.
    Every { interval_ms: i64 },
}

/// One background job registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub key: String,
    pub schedule: JobSchedule,
    /// Gate dispatch on network reachability.
    pub requires_network: bool,
}

#[derive(Debug, Clone)]
struct JobState {
    spec: JobSpec,
    next_run_at_ms: i64,
}

/// Dispatch result for one due job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRunOutcome {
    pub key: String,
    pub status: JobRunStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRunStatus {
    /// Worker reconciled successfully.
    Completed,
    /// Worker failed; the message carries the sync failure detail.
    Failed(String),
    /// No connectivity; deadline kept, nothing dispatched.
    DeferredOffline,
}

/// In-process job registry, deduplicated by stable key.
///
/// The registry is process-wide state; the embedding application drives it
/// from whatever tick source it has (a timer thread, an event loop) by
/// calling `run_due` with the current wall clock.
#[derive(Default)]
pub struct SyncScheduler {
    jobs: BTreeMap<String, JobState>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the standard sync jobs: the start-up one-shot (due
    /// immediately) and the 6-hour periodic job. Both are network-gated and
    /// registered with `Keep`, so calling this on every process start never
    /// duplicates a job or resets the periodic timer.
    pub fn register_sync_jobs(&mut self, now_ms: i64) {
        let once = JobSpec {
            key: SYNC_ONCE_JOB_KEY.to_string(),
            schedule: JobSchedule::Once,
            requires_network: true,
        };
        let periodic = JobSpec {
            key: SYNC_PERIODIC_JOB_KEY.to_string(),
            schedule: JobSchedule::Every {
                interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            },
            requires_network: true,
        };

        // Fixed keys are known-valid; registration cannot fail.
        let _ = self.enqueue_unique(once, ExistingJobPolicy::Keep, now_ms);
        let _ = self.enqueue_unique(periodic, ExistingJobPolicy::Keep, now_ms);
    }

    /// Registers one job under its key.
    ///
    /// Returns `Ok(true)` when the job was (re)registered and `Ok(false)`
    /// when `Keep` dropped the request in favor of the existing job.
    ///
    /// One-shot jobs become due immediately; periodic jobs first run one
    /// interval after registration, matching the periodic work contract of
    /// the scheduling substrate this mirrors.
    pub fn enqueue_unique(
        &mut self,
        spec: JobSpec,
        policy: ExistingJobPolicy,
        now_ms: i64,
    ) -> Result<bool, SchedulerError> {
        let key = spec.key.trim().to_string();
        if !is_valid_job_key(&key) {
            return Err(SchedulerError::InvalidJobKey(spec.key));
        }

        if self.jobs.contains_key(key.as_str()) && policy == ExistingJobPolicy::Keep {
            info!("event=job_enqueue module=sync status=kept key={key}");
            return Ok(false);
        }

        let next_run_at_ms = match spec.schedule {
            JobSchedule::Once => now_ms,
            JobSchedule::Every { interval_ms } => now_ms.saturating_add(interval_ms),
        };
        info!(
            "event=job_enqueue module=sync status=ok key={key} next_run_at_ms={next_run_at_ms}"
        );
        self.jobs.insert(
            key,
            JobState {
                spec,
                next_run_at_ms,
            },
        );
        Ok(true)
    }

    /// Returns sorted registered job keys.
    pub fn job_keys(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    /// Returns the deadline of one registered job.
    pub fn next_run_at(&self, key: &str) -> Option<i64> {
        self.jobs.get(key.trim()).map(|state| state.next_run_at_ms)
    }

    /// Dispatches every job whose deadline has passed.
    ///
    /// Offline, network-gated jobs are reported as deferred and keep their
    /// deadline, so they dispatch on the first tick after connectivity
    /// returns. A one-shot job leaves the registry once dispatched; a
    /// periodic job re-arms at `now + interval` whatever the worker outcome.
    pub fn run_due(
        &mut self,
        now_ms: i64,
        network: &dyn NetworkMonitor,
        worker: &mut dyn SyncWorker,
    ) -> Vec<JobRunOutcome> {
        let due_keys: Vec<String> = self
            .jobs
            .iter()
            .filter(|(_, state)| state.next_run_at_ms <= now_ms)
            .map(|(key, _)| key.clone())
            .collect();

        let mut outcomes = Vec::with_capacity(due_keys.len());
        for key in due_keys {
            let state = match self.jobs.get(&key) {
                Some(state) => state.clone(),
                None => continue,
            };

            if state.spec.requires_network && !network.is_connected() {
                info!("event=job_run module=sync status=deferred key={key} reason=offline");
                outcomes.push(JobRunOutcome {
                    key,
                    status: JobRunStatus::DeferredOffline,
                });
                continue;
            }

            let status = match worker.reconcile() {
                Ok(report) => {
                    info!(
                        "event=job_run module=sync status=ok key={key} pushed={} pulled={}",
                        report.pushed, report.pulled
                    );
                    JobRunStatus::Completed
                }
                Err(failure) => {
                    warn!("event=job_run module=sync status=error key={key} error={failure}");
                    JobRunStatus::Failed(failure.to_string())
                }
            };

            match state.spec.schedule {
                JobSchedule::Once => {
                    self.jobs.remove(&key);
                }
                JobSchedule::Every { interval_ms } => {
                    if let Some(entry) = self.jobs.get_mut(&key) {
                        entry.next_run_at_ms = now_ms.saturating_add(interval_ms);
                    }
                }
            }

            outcomes.push(JobRunOutcome { key, status });
        }

        outcomes
    }
}

fn is_valid_job_key(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::{
        is_valid_job_key, ExistingJobPolicy, JobRunStatus, JobSchedule, JobSpec, SchedulerError,
        SyncScheduler, DEFAULT_SYNC_INTERVAL_MS, SYNC_ONCE_JOB_KEY, SYNC_PERIODIC_JOB_KEY,
    };
    use crate::sync::worker::{NetworkMonitor, SyncFailure, SyncReport, SyncWorker};

    struct FixedNetwork {
        connected: bool,
    }

    impl NetworkMonitor for FixedNetwork {
        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    #[derive(Default)]
    struct CountingWorker {
        runs: u32,
        fail: bool,
    }

    impl SyncWorker for CountingWorker {
        fn reconcile(&mut self) -> Result<SyncReport, SyncFailure> {
            self.runs += 1;
            if self.fail {
                Err(SyncFailure::new("remote_unreachable", "503 from remote", true))
            } else {
                Ok(SyncReport::default())
            }
        }
    }

    const ONLINE: FixedNetwork = FixedNetwork { connected: true };
    const OFFLINE: FixedNetwork = FixedNetwork { connected: false };

    #[test]
    fn register_sync_jobs_is_idempotent_and_keeps_periodic_deadline() {
        let mut scheduler = SyncScheduler::new();
        scheduler.register_sync_jobs(1_000);
        let first_deadline = scheduler.next_run_at(SYNC_PERIODIC_JOB_KEY).unwrap();
        assert_eq!(first_deadline, 1_000 + DEFAULT_SYNC_INTERVAL_MS);

        // Second process start later on: KEEP must not reset the timer.
        scheduler.register_sync_jobs(5_000);
        assert_eq!(
            scheduler.job_keys(),
            vec![
                SYNC_ONCE_JOB_KEY.to_string(),
                SYNC_PERIODIC_JOB_KEY.to_string()
            ]
        );
        assert_eq!(
            scheduler.next_run_at(SYNC_PERIODIC_JOB_KEY),
            Some(first_deadline)
        );
    }

    #[test]
    fn replace_policy_resets_the_deadline() {
        let mut scheduler = SyncScheduler::new();
        let spec = JobSpec {
            key: "notes-sync-periodic".to_string(),
            schedule: JobSchedule::Every { interval_ms: 100 },
            requires_network: false,
        };
        scheduler
            .enqueue_unique(spec.clone(), ExistingJobPolicy::Keep, 0)
            .unwrap();
        let replaced = scheduler
            .enqueue_unique(spec, ExistingJobPolicy::Replace, 50)
            .unwrap();
        assert!(replaced);
        assert_eq!(scheduler.next_run_at("notes-sync-periodic"), Some(150));
    }

    #[test]
    fn one_shot_runs_once_and_leaves_the_registry() {
        let mut scheduler = SyncScheduler::new();
        scheduler.register_sync_jobs(0);
        let mut worker = CountingWorker::default();

        let outcomes = scheduler.run_due(0, &ONLINE, &mut worker);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].key, SYNC_ONCE_JOB_KEY);
        assert_eq!(outcomes[0].status, JobRunStatus::Completed);
        assert_eq!(worker.runs, 1);
        assert_eq!(
            scheduler.job_keys(),
            vec![SYNC_PERIODIC_JOB_KEY.to_string()]
        );

        // Nothing else is due until the periodic deadline.
        assert!(scheduler.run_due(1, &ONLINE, &mut worker).is_empty());
        assert_eq!(worker.runs, 1);
    }

    #[test]
    fn periodic_job_rearms_after_each_dispatch() {
        let mut scheduler = SyncScheduler::new();
        scheduler
            .enqueue_unique(
                JobSpec {
                    key: "notes-sync-periodic".to_string(),
                    schedule: JobSchedule::Every { interval_ms: 100 },
                    requires_network: true,
                },
                ExistingJobPolicy::Keep,
                0,
            )
            .unwrap();
        let mut worker = CountingWorker::default();

        assert!(scheduler.run_due(99, &ONLINE, &mut worker).is_empty());
        let outcomes = scheduler.run_due(100, &ONLINE, &mut worker);
        assert_eq!(outcomes[0].status, JobRunStatus::Completed);
        assert_eq!(scheduler.next_run_at("notes-sync-periodic"), Some(200));

        scheduler.run_due(250, &ONLINE, &mut worker);
        assert_eq!(worker.runs, 2);
        assert_eq!(scheduler.next_run_at("notes-sync-periodic"), Some(350));
    }

    #[test]
    fn offline_jobs_are_deferred_with_deadline_kept() {
        let mut scheduler = SyncScheduler::new();
        scheduler.register_sync_jobs(0);
        let mut worker = CountingWorker::default();

        let outcomes = scheduler.run_due(0, &OFFLINE, &mut worker);
        assert_eq!(outcomes[0].status, JobRunStatus::DeferredOffline);
        assert_eq!(worker.runs, 0);
        assert_eq!(scheduler.next_run_at(SYNC_ONCE_JOB_KEY), Some(0));

        // Connectivity returns: the deferred one-shot dispatches.
        let outcomes = scheduler.run_due(10, &ONLINE, &mut worker);
        assert_eq!(outcomes[0].status, JobRunStatus::Completed);
        assert_eq!(worker.runs, 1);
    }

    #[test]
    fn worker_failure_still_consumes_the_one_shot() {
        let mut scheduler = SyncScheduler::new();
        scheduler
            .enqueue_unique(
                JobSpec {
                    key: "notes-sync-once".to_string(),
                    schedule: JobSchedule::Once,
                    requires_network: false,
                },
                ExistingJobPolicy::Keep,
                0,
            )
            .unwrap();
        let mut worker = CountingWorker {
            runs: 0,
            fail: true,
        };

        let outcomes = scheduler.run_due(0, &OFFLINE, &mut worker);
        assert!(matches!(outcomes[0].status, JobRunStatus::Failed(_)));
        // Retry policy belongs to the worker; the scheduler forgets the job.
        assert!(scheduler.job_keys().is_empty());
    }

    #[test]
    fn rejects_invalid_job_keys() {
        let mut scheduler = SyncScheduler::new();
        let err = scheduler
            .enqueue_unique(
                JobSpec {
                    key: "Notes Sync".to_string(),
                    schedule: JobSchedule::Once,
                    requires_network: false,
                },
                ExistingJobPolicy::Keep,
                0,
            )
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidJobKey(_)));

        assert!(is_valid_job_key("notes-sync-once"));
        assert!(!is_valid_job_key(""));
        assert!(!is_valid_job_key("UPPER"));
    }
}
