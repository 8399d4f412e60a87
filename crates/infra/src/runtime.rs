//! Engine runtime: one task owns all controller mutations.
//!
//! External callers talk to the engine through a [`StandbyHandle`], which
//! enqueues commands on an mpsc queue without blocking. Each command carries
//! the elapsed time sampled at submission, so ordering and timestamps match
//! what the caller observed. The runtime task drains the queue one command
//! at a time; a scanner tick therefore executes atomically with respect to
//! every other operation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dozearc_core::{CheckpointStore, StandbyController, StandbyInjector};
use dozearc_domain::{
    BootPhase, DozeArcError, Result, StandbyBucket, StandbyEvent, StandbySnapshot, UserId,
};

const COMMAND_QUEUE_DEPTH: usize = 256;
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

enum EngineCommand {
    ReportEvent { event: StandbyEvent, elapsed: u64, user: UserId },
    CheckIdleStates { user: UserId, done: oneshot::Sender<()> },
    CheckIdleStatesAll,
    GetBucket {
        package: String,
        user: UserId,
        elapsed: u64,
        obfuscate_ephemeral: bool,
        reply: oneshot::Sender<StandbyBucket>,
    },
    SetBucket {
        package: String,
        user: UserId,
        bucket_value: u32,
        reason: String,
        elapsed: u64,
        reply: oneshot::Sender<Result<()>>,
    },
    ForceIdleState { package: String, user: UserId, idle: bool },
    IsIdleFilteredOrParoled {
        package: String,
        user: UserId,
        elapsed: u64,
        obfuscate_ephemeral: bool,
        reply: oneshot::Sender<bool>,
    },
    SetChargingState(bool),
    BootPhase(BootPhase),
    Snapshot { reply: oneshot::Sender<StandbySnapshot> },
}

/// Cloneable, thread-safe front door to the engine task.
#[derive(Clone)]
pub struct StandbyHandle {
    tx: mpsc::Sender<EngineCommand>,
    injector: Arc<dyn StandbyInjector>,
}

impl StandbyHandle {
    fn now(&self) -> u64 {
        self.injector.elapsed_realtime()
    }

    async fn send(&self, command: EngineCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| DozeArcError::Internal("engine task is gone".into()))
    }

    /// Ingest one app-usage event. The elapsed clock is sampled here, at
    /// submission.
    pub async fn report_event(&self, event: StandbyEvent, user: UserId) -> Result<()> {
        let elapsed = self.now();
        self.send(EngineCommand::ReportEvent { event, elapsed, user }).await
    }

    /// Force a scanner tick and wait for it to complete.
    pub async fn check_idle_states(&self, user: UserId) -> Result<()> {
        let (done, ack) = oneshot::channel();
        self.send(EngineCommand::CheckIdleStates { user, done }).await?;
        ack.await.map_err(|_| DozeArcError::Internal("engine task is gone".into()))
    }

    pub async fn get_app_standby_bucket(
        &self,
        package: &str,
        user: UserId,
        obfuscate_ephemeral: bool,
    ) -> Result<StandbyBucket> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::GetBucket {
            package: package.to_string(),
            user,
            elapsed: self.now(),
            obfuscate_ephemeral,
            reply,
        })
        .await?;
        rx.await.map_err(|_| DozeArcError::Internal("engine task is gone".into()))
    }

    /// External bucket assignment over the untrusted surface: raw values
    /// are validated on the engine task and invalid ones rejected with an
    /// error. Precedence violations are silent no-ops.
    pub async fn set_app_standby_bucket(
        &self,
        package: &str,
        user: UserId,
        bucket_value: u32,
        reason: &str,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::SetBucket {
            package: package.to_string(),
            user,
            bucket_value,
            reason: reason.to_string(),
            elapsed: self.now(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| DozeArcError::Internal("engine task is gone".into()))?
    }

    pub async fn force_idle_state(&self, package: &str, user: UserId, idle: bool) -> Result<()> {
        self.send(EngineCommand::ForceIdleState { package: package.to_string(), user, idle })
            .await
    }

    pub async fn is_app_idle_filtered_or_paroled(
        &self,
        package: &str,
        user: UserId,
        obfuscate_ephemeral: bool,
    ) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::IsIdleFilteredOrParoled {
            package: package.to_string(),
            user,
            elapsed: self.now(),
            obfuscate_ephemeral,
            reply,
        })
        .await?;
        rx.await.map_err(|_| DozeArcError::Internal("engine task is gone".into()))
    }

    pub async fn set_charging_state(&self, charging: bool) -> Result<()> {
        self.send(EngineCommand::SetChargingState(charging)).await
    }

    pub async fn on_boot_phase(&self, phase: BootPhase) -> Result<()> {
        self.send(EngineCommand::BootPhase(phase)).await
    }

    /// Periodic scan entry point used by the scheduler.
    pub async fn check_idle_states_all(&self) -> Result<()> {
        self.send(EngineCommand::CheckIdleStatesAll).await
    }

    /// Snapshot of all history, taken between task turns.
    pub async fn snapshot(&self) -> Result<StandbySnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| DozeArcError::Internal("engine task is gone".into()))
    }
}

/// Owns the engine task and its lifecycle.
pub struct EngineRuntime {
    handle: StandbyHandle,
    task: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl EngineRuntime {
    /// Spawn the engine task. When a checkpoint store is supplied, the
    /// latest checkpoint is restored before the first command is processed
    /// and a final checkpoint is saved on shutdown.
    pub fn start(
        controller: Arc<StandbyController>,
        injector: Arc<dyn StandbyInjector>,
        checkpoints: Option<Arc<dyn CheckpointStore>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let cancellation = CancellationToken::new();

        let task = tokio::spawn(Self::run(
            controller,
            rx,
            checkpoints,
            cancellation.clone(),
        ));

        info!("engine runtime started");
        Self { handle: StandbyHandle { tx, injector }, task: Some(task), cancellation }
    }

    pub fn handle(&self) -> StandbyHandle {
        self.handle.clone()
    }

    /// Stop the engine task: drains nothing further, saves the final
    /// checkpoint, and awaits the task with a timeout.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation.cancel();
        if let Some(task) = self.task.take() {
            tokio::time::timeout(STOP_TIMEOUT, task)
                .await
                .map_err(|_| DozeArcError::Internal("engine task did not stop in time".into()))?
                .map_err(|e| DozeArcError::Internal(format!("engine task panicked: {e}")))?;
        }
        info!("engine runtime stopped");
        Ok(())
    }

    async fn run(
        controller: Arc<StandbyController>,
        mut rx: mpsc::Receiver<EngineCommand>,
        checkpoints: Option<Arc<dyn CheckpointStore>>,
        cancellation: CancellationToken,
    ) {
        if let Some(store) = &checkpoints {
            match store.load().await {
                Ok(Some(snapshot)) => {
                    if let Err(err) = controller.restore(&snapshot) {
                        warn!(error = %err, "checkpoint restore failed, starting fresh");
                    } else {
                        info!("history restored from checkpoint");
                    }
                }
                Ok(None) => debug!("no checkpoint to restore"),
                Err(err) => warn!(error = %err, "checkpoint load failed, starting fresh"),
            }
        }

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                command = rx.recv() => {
                    match command {
                        Some(command) => Self::dispatch(&controller, command),
                        None => break,
                    }
                }
            }
        }

        if let Some(store) = &checkpoints {
            if let Err(err) = store.save(&controller.snapshot()).await {
                warn!(error = %err, "final checkpoint save failed");
            }
        }
    }

    fn dispatch(controller: &Arc<StandbyController>, command: EngineCommand) {
        match command {
            EngineCommand::ReportEvent { event, elapsed, user } => {
                controller.report_event(&event, elapsed, user);
            }
            EngineCommand::CheckIdleStates { user, done } => {
                controller.check_idle_states(user);
                let _ = done.send(());
            }
            EngineCommand::CheckIdleStatesAll => controller.check_idle_states_all(),
            EngineCommand::GetBucket { package, user, elapsed, obfuscate_ephemeral, reply } => {
                let bucket =
                    controller.get_app_standby_bucket(&package, user, elapsed, obfuscate_ephemeral);
                let _ = reply.send(bucket);
            }
            EngineCommand::SetBucket { package, user, bucket_value, reason, elapsed, reply } => {
                let result = controller
                    .set_app_standby_bucket_raw(&package, user, bucket_value, &reason, elapsed);
                let _ = reply.send(result);
            }
            EngineCommand::ForceIdleState { package, user, idle } => {
                controller.force_idle_state(&package, user, idle);
            }
            EngineCommand::IsIdleFilteredOrParoled {
                package,
                user,
                elapsed,
                obfuscate_ephemeral,
                reply,
            } => {
                let filtered = controller.is_app_idle_filtered_or_paroled(
                    &package,
                    user,
                    elapsed,
                    obfuscate_ephemeral,
                );
                let _ = reply.send(filtered);
            }
            EngineCommand::SetChargingState(charging) => controller.set_charging_state(charging),
            EngineCommand::BootPhase(phase) => controller.on_boot_phase(phase),
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(controller.snapshot());
            }
        }
    }
}

impl Drop for EngineRuntime {
    fn drop(&mut self) {
        if self.task.is_some() {
            warn!("EngineRuntime dropped while running; cancelling");
            self.cancellation.cancel();
        }
    }
}
