//! One spawned tenant process.
//!
//! [`TenantProcess::spawn`] launches the process, forwards its stdout and
//! stderr lines into the controller's log, and emits a [`ProcessExit`] on
//! the supplied channel when the process exits for any reason. Stopping is
//! a kill, not a graceful shutdown: in-flight handler work inside the
//! tenant is abandoned, which matches the lifecycle contract.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use roost_types::{RoostError, TenantId};

/// Lifecycle notification surfaced on the supervisor's outward event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantEvent {
    Started { id: TenantId },
    /// The process exited, normally or killed. `code` is `None` when the
    /// process was terminated by a signal.
    Exited { id: TenantId, code: Option<i32> },
}

/// Terminal report from a spawned process's monitor task.
///
/// Carries the spawn generation so the supervisor can tell a replaced
/// process's late exit apart from the exit of the handle it currently
/// holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub id: TenantId,
    pub generation: u64,
    pub code: Option<i32>,
    /// Whole seconds the process was alive.
    pub uptime_secs: u64,
}

/// Live handle to a spawned tenant process.
///
/// Exists only while the process runs; the supervisor drops the handle when
/// the matching exit report arrives. Dropping the handle does not kill the
/// process — only [`stop`](TenantProcess::stop) does.
#[derive(Debug)]
pub struct TenantProcess {
    id: TenantId,
    generation: u64,
    kill: watch::Sender<bool>,
}

impl TenantProcess {
    /// Spawn `command` for tenant `id` with piped output.
    ///
    /// A monitor task waits for the exit (or a kill request) and sends a
    /// [`ProcessExit`] tagged with `generation` on `exits`. Output
    /// forwarding tasks end on their own when the pipes close.
    pub fn spawn(
        id: TenantId,
        generation: u64,
        mut command: Command,
        exits: mpsc::Sender<ProcessExit>,
    ) -> Result<Self, RoostError> {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = command
            .spawn()
            .map_err(|e| RoostError::SupervisorError(format!("spawn tenant {id}: {e}")))?;
        let started = Instant::now();

        if let Some(stdout) = child.stdout.take() {
            forward_lines(id.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(id.clone(), "stderr", stderr);
        }

        let (kill, mut kill_rx) = watch::channel(false);
        let monitor_id = id.clone();
        tokio::spawn(async move {
            let code = tokio::select! {
                status = child.wait() => status.ok().and_then(|s| s.code()),
                _ = kill_rx.changed() => {
                    let _ = child.start_kill();
                    child.wait().await.ok().and_then(|s| s.code())
                }
            };
            info!(tenant = %monitor_id, ?code, "tenant process exited");
            let _ = exits
                .send(ProcessExit {
                    id: monitor_id,
                    generation,
                    code,
                    uptime_secs: started.elapsed().as_secs(),
                })
                .await;
        });

        Ok(Self {
            id,
            generation,
            kill,
        })
    }

    pub fn id(&self) -> &TenantId {
        &self.id
    }

    /// The spawn generation this handle was created with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the monitor task to kill the process. Idempotent; the exit
    /// report still arrives through the channel.
    pub fn stop(&self) {
        if self.kill.send(true).is_err() {
            // Monitor already gone; the process has exited.
            warn!(tenant = %self.id, "stop requested after exit");
        }
    }
}

fn forward_lines(id: TenantId, stream: &'static str, pipe: impl AsyncRead + Unpin + Send + 'static) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(tenant = %id, stream, "{line}");
        }
    });
}
