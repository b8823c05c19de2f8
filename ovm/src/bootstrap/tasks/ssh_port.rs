//! Task: SSH port allocation.

use super::{BootstrapCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use ovm_shared::errors::OvmResult;

pub struct SshPortTask;

#[async_trait]
impl PipelineTask<BootstrapCtx> for SshPortTask {
    async fn run(self: Box<Self>, ctx: BootstrapCtx) -> OvmResult<()> {
        let task_name = self.name();
        let instance = task_start(&ctx, task_name).await;

        let (preferred, prober) = {
            let ctx = ctx.lock().await;
            (ctx.options.ssh_port, ctx.capabilities.port_prober.clone())
        };

        let port = prober
            .find_usable_port(preferred)
            .await
            .inspect_err(|e| log_task_error(&instance, task_name, e))?;
        tracing::debug!(instance = %instance, port, "Allocated ssh port");

        let mut ctx = ctx.lock().await;
        ctx.ssh_port_output = Some(port);

        Ok(())
    }

    fn name(&self) -> &str {
        "ssh_port"
    }
}
