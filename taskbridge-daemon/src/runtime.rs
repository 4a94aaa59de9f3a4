//! Watch-mode runtime: a fixed-interval scheduler running one sync cycle
//! per tick.
//!
//! Cycles are strictly serialized — the next tick is not polled until the
//! current cycle's blocking task has finished, so cycles never overlap or
//! pipeline. A failed cycle is logged and the loop continues; shutdown
//! (ctrl-c or a [`ShutdownHandle`]) lands between cycles, never mid-write.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use taskbridge_sync::reconcile::CycleReport;

use crate::error::{io_err, DaemonError};

/// Cooperative cancellation signal for a running [`Scheduler`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle(broadcast::Sender<()>);

impl ShutdownHandle {
    /// Request a graceful stop after the in-flight cycle (if any) finishes.
    pub fn shutdown(&self) {
        let _ = self.0.send(());
    }
}

/// Fixed-interval cycle scheduler.
pub struct Scheduler {
    interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Scheduler {
        let (shutdown_tx, _) = broadcast::channel(16);
        Scheduler {
            interval,
            shutdown_tx,
        }
    }

    /// A handle that can stop the scheduler from another task or thread.
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.clone())
    }

    /// Run `job` once per interval until shutdown. The first cycle runs
    /// immediately.
    pub async fn run<F>(self, job: F) -> Result<(), DaemonError>
    where
        F: FnMut() -> CycleReport + Send + 'static,
    {
        let job = Arc::new(Mutex::new(job));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let ctrl_c = {
            let shutdown = self.shutdown_tx.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown_rx.recv() => {}
                    signal = tokio::signal::ctrl_c() => {
                        if signal.is_ok() {
                            tracing::info!("received ctrl-c, stopping after current cycle");
                        }
                        let _ = shutdown.send(());
                    }
                }
            })
        };

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles: u64 = 0;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    let job = job.clone();
                    let report = tokio::task::spawn_blocking(move || {
                        let mut job = job.lock().expect("cycle job lock");
                        (job)()
                    })
                    .await
                    .map_err(|err| DaemonError::Runtime(format!("cycle task join error: {err}")))?;

                    cycles += 1;
                    log_report(cycles, &report);
                }
            }
        }

        let _ = self.shutdown_tx.send(());
        let _ = ctrl_c.await;
        tracing::info!("watch loop stopped after {cycles} cycle(s)");
        Ok(())
    }
}

fn log_report(cycle: u64, report: &CycleReport) {
    let stats = &report.stats;
    if report.is_failed() {
        // A sync failure never terminates the watch loop.
        tracing::error!(
            cycle,
            failed_in = %report.failed_in.map(|p| p.to_string()).unwrap_or_default(),
            error = %report.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            "sync cycle failed; retrying next interval",
        );
        return;
    }
    tracing::info!(
        cycle,
        pulled = stats.pulled,
        status_updates = stats.status_updates,
        appended = stats.appended,
        created = stats.created,
        updated = stats.updated,
        errors = stats.errors,
        "sync cycle complete",
    );
}

/// Initialize tracing and block the current thread on the watch loop.
pub fn start_blocking<F>(interval: Duration, job: F) -> Result<(), DaemonError>
where
    F: FnMut() -> CycleReport + Send + 'static,
{
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(Scheduler::new(interval).run(job))
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
