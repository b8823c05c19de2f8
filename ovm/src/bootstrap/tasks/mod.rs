//! Bootstrap tasks.
//!
//! ## Phases
//!
//! ```text
//! PreSetup (parallel): [Basic, LogDir]
//!
//! Setup (parallel):    [SocketDir, SshKey, SshPort, Target]
//!                                                    └─ reconcile → scratch disk
//! ```
//!
//! Setup tasks may rely on every PreSetup output but never on each other.

mod basic;
mod log_dir;
mod socket_dir;
mod ssh_key;
mod ssh_port;
mod target;

use super::types::BootstrapPipelineContext;
use ovm_shared::errors::OvmError;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type BootstrapCtx = Arc<Mutex<BootstrapPipelineContext>>;

async fn task_start(ctx: &BootstrapCtx, task_name: &str) -> String {
    let name = { ctx.lock().await.options.name.clone() };
    tracing::debug!(instance = %name, task = %task_name, "Executing task");
    name
}

fn log_task_error(instance: &str, task_name: &str, err: &OvmError) {
    tracing::error!(instance = %instance, task = %task_name, "Task failed: {}", err);
}

pub use basic::BasicTask;
pub use log_dir::LogDirTask;
pub use socket_dir::{SocketDirTask, reset_socket_dir};
pub use ssh_key::{SshKeyTask, ensure_keypair};
pub use ssh_port::SshPortTask;
pub use target::{TargetTask, ensure_scratch_disk, ensure_target};
