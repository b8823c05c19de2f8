//! Bootstrap orchestration.
//!
//! ## Architecture
//!
//! Bootstrap is a two-phase state machine. Each phase is one parallel stage
//! run through the generic pipeline:
//!
//! ```text
//! Uninitialized ──pre_setup──► BasicReady ──setup──► Ready
//!       │                          │
//!       └──────── error ───────────┴──► Failed
//!
//! pre_setup:  Basic ─┬─  (identity, scratch dir, lock file)
//!             LogDir ─┘  (log directory)
//!
//! setup:      SocketDir ─┬─  (wipe + recreate socket namespace)
//!             SshKey    ─┤   (reuse or regenerate keypair)
//!             SshPort   ─┤   (free TCP port)
//!             Target    ─┘   (reconcile assets, then scratch disk)
//! ```
//!
//! A failing task fails its phase immediately. Its siblings are not
//! cancelled and finish in the background; every step is idempotent and
//! works on its own directory.

mod tasks;
mod types;

use crate::capability::Capabilities;
use crate::context::{Context, SshCredentials};
use crate::options::BootstrapOptions;
use crate::pipeline::{BoxedTask, ExecutionPlan, PipelineExecutor, PipelineMetrics, Stage};
use ovm_shared::errors::{OvmError, OvmResult};
use std::sync::Arc;
use tokio::sync::Mutex;

pub use tasks::{ensure_keypair, ensure_scratch_disk, ensure_target, reset_socket_dir};
pub use types::SshKeyMaterial;

use tasks::{BasicTask, BootstrapCtx, LogDirTask, SocketDirTask, SshKeyTask, SshPortTask, TargetTask};
use types::BootstrapPipelineContext;

/// Where a [`Bootstrap`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// Nothing has run yet.
    Uninitialized,
    /// `pre_setup` succeeded: identity, lock file and log directory are ready.
    BasicReady,
    /// `setup` succeeded: the context is complete.
    Ready,
    /// A phase failed. Terminal; start over with a new `Bootstrap`.
    Failed,
}

// ============================================================================
// EXECUTION PLAN
// ============================================================================

/// Get the execution plan for the phase that follows `phase`.
fn get_execution_plan(phase: BootstrapPhase) -> OvmResult<ExecutionPlan<BootstrapCtx>> {
    let stages: Vec<Stage<BoxedTask<BootstrapCtx>>> = match phase {
        BootstrapPhase::Uninitialized => vec![Stage::parallel(vec![
            Box::new(BasicTask),
            Box::new(LogDirTask),
        ])],
        BootstrapPhase::BasicReady => vec![Stage::parallel(vec![
            Box::new(SocketDirTask),
            Box::new(SshKeyTask),
            Box::new(SshPortTask),
            Box::new(TargetTask),
        ])],
        other => {
            return Err(OvmError::InvalidState(format!(
                "No bootstrap phase follows {:?}",
                other
            )));
        }
    };

    Ok(ExecutionPlan::new(stages))
}

fn log_phase_metrics(phase: &str, metrics: &PipelineMetrics) {
    for task in metrics.tasks() {
        tracing::debug!(phase, task = %task.name, duration_ms = task.duration_ms, "Task finished");
    }
    tracing::info!(phase, duration_ms = metrics.total_duration_ms, "Bootstrap phase complete");
}

/// Drives the two bootstrap phases and owns the resulting context.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> ovm::OvmResult<()> {
/// use ovm::{Bootstrap, BootstrapOptions, Capabilities};
///
/// let options = BootstrapOptions {
///     kernel_path: "/bundle/bzImage".into(),
///     initrd_path: "/bundle/initrd.gz".into(),
///     rootfs_path: "/bundle/rootfs.erofs".into(),
///     ..BootstrapOptions::default()
/// };
///
/// let mut bootstrap = Bootstrap::new(options, Capabilities::default())?;
/// bootstrap.pre_setup().await?;
/// let ctx = bootstrap.setup().await?;
/// println!("ssh on port {}", ctx.ssh.port);
/// # Ok(())
/// # }
/// ```
pub struct Bootstrap {
    ctx: BootstrapCtx,
    phase: BootstrapPhase,
    context: Option<Arc<Context>>,
}

impl Bootstrap {
    /// Validate `options` and prepare a bootstrap in `Uninitialized`.
    pub fn new(options: BootstrapOptions, capabilities: Capabilities) -> OvmResult<Self> {
        options.sanitize()?;

        let ctx = BootstrapPipelineContext::new(Arc::new(options), capabilities);
        Ok(Self {
            ctx: Arc::new(Mutex::new(ctx)),
            phase: BootstrapPhase::Uninitialized,
            context: None,
        })
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    /// The finished context, once `setup` has succeeded.
    pub fn context(&self) -> Option<Arc<Context>> {
        self.context.clone()
    }

    /// Phase one: derive identity and the lock file, create the log directory.
    ///
    /// Requires `Uninitialized`.
    pub async fn pre_setup(&mut self) -> OvmResult<PipelineMetrics> {
        self.expect_phase(BootstrapPhase::Uninitialized, "pre_setup")?;

        let metrics = self.run_phase("pre_setup").await?;
        self.phase = BootstrapPhase::BasicReady;
        Ok(metrics)
    }

    /// Phase two: provision sockets, SSH credentials, the SSH port and the
    /// target directory, then freeze everything into a [`Context`].
    ///
    /// Requires `BasicReady`.
    pub async fn setup(&mut self) -> OvmResult<Arc<Context>> {
        self.expect_phase(BootstrapPhase::BasicReady, "setup")?;

        self.run_phase("setup").await?;

        let context = match self.assemble_context().await {
            Ok(context) => Arc::new(context),
            Err(e) => {
                self.phase = BootstrapPhase::Failed;
                return Err(e);
            }
        };

        tracing::info!(
            instance = %context.name,
            endpoint = %context.endpoint,
            ssh_port = context.ssh.port,
            "Bootstrap complete"
        );

        self.phase = BootstrapPhase::Ready;
        self.context = Some(Arc::clone(&context));
        Ok(context)
    }

    fn expect_phase(&self, expected: BootstrapPhase, call: &str) -> OvmResult<()> {
        if self.phase != expected {
            return Err(OvmError::InvalidState(format!(
                "{} requires phase {:?}, bootstrap is {:?}",
                call, expected, self.phase
            )));
        }
        Ok(())
    }

    async fn run_phase(&mut self, name: &str) -> OvmResult<PipelineMetrics> {
        let plan = get_execution_plan(self.phase)?;

        match PipelineExecutor::execute(plan, Arc::clone(&self.ctx)).await {
            Ok(metrics) => {
                log_phase_metrics(name, &metrics);
                Ok(metrics)
            }
            Err(e) => {
                tracing::error!(phase = name, "Bootstrap phase failed: {}", e);
                self.phase = BootstrapPhase::Failed;
                Err(e)
            }
        }
    }

    async fn assemble_context(&self) -> OvmResult<Context> {
        let ctx = self.ctx.lock().await;

        let basic = ctx
            .basic_output
            .clone()
            .ok_or_else(|| OvmError::Internal("basic task must run first".into()))?;
        let log_path = ctx
            .log_output
            .clone()
            .ok_or_else(|| OvmError::Internal("log_dir task must run first".into()))?;
        let sockets = ctx
            .socket_output
            .clone()
            .ok_or_else(|| OvmError::Internal("socket_dir task must run first".into()))?;
        let ssh = ctx
            .ssh_output
            .clone()
            .ok_or_else(|| OvmError::Internal("ssh_key task must run first".into()))?;
        let port = ctx
            .ssh_port_output
            .ok_or_else(|| OvmError::Internal("ssh_port task must run first".into()))?;
        let target = ctx
            .target_output
            .clone()
            .ok_or_else(|| OvmError::Internal("target task must run first".into()))?;

        Ok(Context {
            name: basic.name,
            executable_path: basic.executable_path,
            lock_file: basic.lock_file,
            log_path,
            cpus: basic.cpus,
            memory_bytes: basic.memory_bytes,
            cli_mode: basic.cli_mode,
            bind_pid: basic.bind_pid,
            event_socket_path: basic.event_socket_path,
            power_save_mode: basic.power_save_mode,
            kernel_debug: basic.kernel_debug,
            endpoint: sockets.endpoint(),
            sockets,
            ssh: SshCredentials {
                paths: ssh.paths,
                public_key: ssh.public_key,
                port,
            },
            target,
        })
    }
}

/// Run both phases and return the finished context.
pub async fn run_bootstrap(
    options: BootstrapOptions,
    capabilities: Capabilities,
) -> OvmResult<Arc<Context>> {
    let mut bootstrap = Bootstrap::new(options, capabilities)?;
    bootstrap.pre_setup().await?;
    bootstrap.setup().await
}
