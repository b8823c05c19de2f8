//! Task: Log directory.

use super::{BootstrapCtx, log_task_error, task_start};
use crate::paths::absolutize;
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use ovm_shared::errors::{OvmError, OvmResult};
use std::path::{Path, PathBuf};

pub struct LogDirTask;

#[async_trait]
impl PipelineTask<BootstrapCtx> for LogDirTask {
    async fn run(self: Box<Self>, ctx: BootstrapCtx) -> OvmResult<()> {
        let task_name = self.name();
        let instance = task_start(&ctx, task_name).await;

        let log_dir = { ctx.lock().await.options.log_dir.clone() };

        let log_path = run_log_dir(&log_dir)
            .await
            .inspect_err(|e| log_task_error(&instance, task_name, e))?;

        let mut ctx = ctx.lock().await;
        ctx.log_output = Some(log_path);

        Ok(())
    }

    fn name(&self) -> &str {
        "log_dir"
    }
}

async fn run_log_dir(log_dir: &Path) -> OvmResult<PathBuf> {
    let log_path = absolutize(log_dir)?;
    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(&log_path)
        .await
        .map_err(|e| {
            OvmError::Storage(format!(
                "Failed to create log directory {}: {}",
                log_path.display(),
                e
            ))
        })?;
    Ok(log_path)
}
