//! Task: Socket namespace.
//!
//! Wipes and recreates the directory that holds every Unix socket the
//! supervisor binds, so sockets left by a dead instance never look live.

use super::{BootstrapCtx, log_task_error, task_start};
use crate::paths::{SocketPaths, absolutize};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use ovm_shared::errors::{OvmError, OvmResult};
use std::path::Path;

pub struct SocketDirTask;

#[async_trait]
impl PipelineTask<BootstrapCtx> for SocketDirTask {
    async fn run(self: Box<Self>, ctx: BootstrapCtx) -> OvmResult<()> {
        let task_name = self.name();
        let instance = task_start(&ctx, task_name).await;

        let socket_dir = { ctx.lock().await.options.socket_dir.clone() };

        let sockets = reset_socket_dir(&socket_dir, &instance)
            .await
            .inspect_err(|e| log_task_error(&instance, task_name, e))?;

        let mut ctx = ctx.lock().await;
        ctx.socket_output = Some(sockets);

        Ok(())
    }

    fn name(&self) -> &str {
        "socket_dir"
    }
}

/// Remove `dir` with everything in it, recreate it empty and derive the
/// socket paths for instance `name`.
pub async fn reset_socket_dir(dir: &Path, name: &str) -> OvmResult<SocketPaths> {
    let dir = absolutize(dir)?;

    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => tracing::debug!(path = %dir.display(), "Removed previous socket directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(OvmError::Storage(format!(
                "Failed to remove socket directory {}: {}",
                dir.display(),
                e
            )));
        }
    }

    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(&dir)
        .await
        .map_err(|e| {
            OvmError::Storage(format!(
                "Failed to create socket directory {}: {}",
                dir.display(),
                e
            ))
        })?;

    Ok(SocketPaths::derive(&dir, name))
}
