//! Periodic idle-scan scheduler.
//!
//! Wraps `tokio-cron-scheduler` with explicit lifecycle management: a fresh
//! cancellation token per start, join-handle tracking for the monitor task,
//! job-id tracking for cleanup, and timeouts around start/stop. Each firing
//! posts a sweep-all-users command through the [`StandbyHandle`]; the engine
//! task does the actual work, so a slow scan never blocks the scheduler.

use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::runtime::StandbyHandle;

use super::error::{SchedulerError, SchedulerResult};

/// Configuration for the idle-scan scheduler
#[derive(Debug, Clone)]
pub struct ScanSchedulerConfig {
    /// Cron expression for scheduling (e.g., "0 */30 * * * *" for every 30
    /// minutes)
    pub cron_expression: String,
    /// Timeout for posting one scan command
    pub post_timeout_secs: u64,
    /// Timeout for scheduler start operation
    pub start_timeout_secs: u64,
    /// Timeout for scheduler stop operation
    pub stop_timeout_secs: u64,
}

impl Default for ScanSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */30 * * * *".to_string(), // Every 30 minutes
            post_timeout_secs: 5,
            start_timeout_secs: 5,
            stop_timeout_secs: 5,
        }
    }
}

/// Idle-scan scheduler with lifecycle management.
pub struct ScanScheduler {
    scheduler: RwLock<JobScheduler>,
    handle: StandbyHandle,
    config: ScanSchedulerConfig,
    task_handle: Option<JoinHandle<()>>,
    job_id: Option<Uuid>,
    cancellation: Option<CancellationToken>,
}

impl ScanScheduler {
    /// Create a new scan scheduler firing on the given cron expression.
    pub async fn new(handle: StandbyHandle, cron_expression: String) -> SchedulerResult<Self> {
        let config = ScanSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(handle, config).await
    }

    /// Create a new scan scheduler with custom configuration.
    pub async fn with_config(
        handle: StandbyHandle,
        config: ScanSchedulerConfig,
    ) -> SchedulerResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::CreationFailed(e.to_string()))?;

        Ok(Self {
            scheduler: RwLock::new(scheduler),
            handle,
            config,
            task_handle: None,
            job_id: None,
            cancellation: None,
        })
    }

    /// Start the scheduler: register the scan job, create a fresh
    /// cancellation token, and spawn the monitor task.
    #[instrument(skip(self), fields(cron = %self.config.cron_expression))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!("Starting scan scheduler");

        let cancel = CancellationToken::new();
        self.cancellation = Some(cancel.clone());

        let job_id = self.register_scan_job().await?;
        self.job_id = Some(job_id);

        let start_timeout = Duration::from_secs(self.config.start_timeout_secs);
        tokio::time::timeout(start_timeout, async {
            let mut sched = self.scheduler.write().await;
            sched.start().await
        })
        .await
        .map_err(|_| SchedulerError::Timeout { seconds: self.config.start_timeout_secs })?
        .map_err(|e| SchedulerError::StartFailed(e.to_string()))?;

        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("Scan scheduler monitor task cancelled");
        });
        self.task_handle = Some(handle);

        info!("Scan scheduler started successfully");
        Ok(())
    }

    /// Stop the scheduler gracefully: cancel the monitor, remove the job,
    /// shut the scheduler down, and await the join handle, all under
    /// timeouts.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping scan scheduler");

        if let Some(ref cancel) = self.cancellation {
            cancel.cancel();
        }

        if let Some(job_id) = self.job_id.take() {
            let mut sched = self.scheduler.write().await;
            if let Err(e) = sched.remove(&job_id).await {
                warn!(job_id = %job_id, error = %e, "Failed to remove scan job");
            }
        }

        let stop_timeout = Duration::from_secs(self.config.stop_timeout_secs);
        tokio::time::timeout(stop_timeout, async {
            let mut sched = self.scheduler.write().await;
            sched.shutdown().await
        })
        .await
        .map_err(|_| SchedulerError::Timeout { seconds: self.config.stop_timeout_secs })?
        .map_err(|e| SchedulerError::StopFailed(e.to_string()))?;

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .map_err(|_| {
                    warn!("Monitor task did not complete within timeout");
                    SchedulerError::Timeout { seconds: 5 }
                })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        self.cancellation = None;

        info!("Scan scheduler stopped successfully");
        Ok(())
    }

    /// Check if the scheduler is currently running.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
            && self.cancellation.as_ref().map_or(false, |c| !c.is_cancelled())
    }

    /// Register the scan job with the scheduler. Returns the job UUID for
    /// later removal.
    async fn register_scan_job(&self) -> SchedulerResult<Uuid> {
        let cron_expr = self.config.cron_expression.clone();
        let post_timeout = Duration::from_secs(self.config.post_timeout_secs);
        let engine = self.handle.clone();

        let job = Job::new_async(cron_expr.as_str(), move |uuid, _lock| {
            let engine = engine.clone();
            Box::pin(async move {
                debug!(job_id = %uuid, "Idle scan job triggered");
                match tokio::time::timeout(post_timeout, engine.check_idle_states_all()).await {
                    Ok(Ok(())) => debug!("Idle scan posted"),
                    Ok(Err(e)) => error!(error = %e, "Idle scan post failed"),
                    Err(_) => {
                        warn!(timeout_secs = post_timeout.as_secs(), "Idle scan post timeout")
                    }
                }
            })
        })
        .map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;

        let mut scheduler = self.scheduler.write().await;
        let job_id = scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;

        debug!(job_id = %job_id, cron = %cron_expr, "Idle scan job registered");
        Ok(job_id)
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for ScanScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ScanScheduler dropped while running; cancelling");
            if let Some(ref cancel) = self.cancellation {
                cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dozearc_core::{StandbyController, StandbyInjector};

    use crate::config::EngineConfig;
    use crate::platform::SystemInjector;
    use crate::runtime::EngineRuntime;

    use super::*;

    async fn engine_handle() -> (EngineRuntime, StandbyHandle) {
        let injector = SystemInjector::new(&EngineConfig::default());
        let controller = StandbyController::new(injector.clone() as Arc<dyn StandbyInjector>);
        let runtime =
            EngineRuntime::start(controller, injector as Arc<dyn StandbyInjector>, None);
        let handle = runtime.handle();
        (runtime, handle)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scheduler_lifecycle() {
        let (mut runtime, handle) = engine_handle().await;
        let mut scheduler = ScanScheduler::new(handle, "0 * * * * *".to_string()).await.unwrap();

        // Initially not running
        assert!(!scheduler.is_running());

        // Start succeeds
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());

        // Stop succeeds
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());

        runtime.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_double_start_fails() {
        let (mut runtime, handle) = engine_handle().await;
        let mut scheduler = ScanScheduler::new(handle, "0 * * * * *".to_string()).await.unwrap();

        scheduler.start().await.unwrap();

        // Second start should fail
        let result = scheduler.start().await;
        assert!(matches!(result, Err(SchedulerError::AlreadyRunning)));

        scheduler.stop().await.unwrap();
        runtime.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_without_start_fails() {
        let (mut runtime, handle) = engine_handle().await;
        let mut scheduler = ScanScheduler::new(handle, "0 * * * * *".to_string()).await.unwrap();

        let result = scheduler.stop().await;
        assert!(matches!(result, Err(SchedulerError::NotRunning)));

        runtime.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_stop_start_cycle() {
        let (mut runtime, handle) = engine_handle().await;
        let mut scheduler = ScanScheduler::new(handle, "0 * * * * *".to_string()).await.unwrap();

        // First cycle
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());

        // Second cycle (tests fresh cancellation token and job cleanup)
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());

        runtime.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_custom_config() {
        let (mut runtime, handle) = engine_handle().await;
        let config = ScanSchedulerConfig {
            cron_expression: "0 */10 * * * *".to_string(),
            post_timeout_secs: 10,
            start_timeout_secs: 10,
            stop_timeout_secs: 10,
        };

        let mut scheduler = ScanScheduler::with_config(handle, config).await.unwrap();

        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());

        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());

        runtime.stop().await.unwrap();
    }
}
