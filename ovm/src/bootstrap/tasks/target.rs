//! Task: Target assets and disks.
//!
//! Reconciles the boot assets against the manifest, then makes sure the
//! scratch disk exists. Both steps live in one task so the scratch disk is
//! only created once the target directory is known to be sound.

use super::{BootstrapCtx, log_task_error, task_start};
use crate::capability::{DiskAllocator, TargetReconciler, TargetSpec, ensure_disk_image};
use crate::paths::{TargetLayout, absolutize};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use ovm_shared::errors::{OvmError, OvmResult};
use std::path::Path;

pub struct TargetTask;

#[async_trait]
impl PipelineTask<BootstrapCtx> for TargetTask {
    async fn run(self: Box<Self>, ctx: BootstrapCtx) -> OvmResult<()> {
        let task_name = self.name();
        let instance = task_start(&ctx, task_name).await;

        let (options, capabilities) = {
            let ctx = ctx.lock().await;
            (ctx.options.clone(), ctx.capabilities.clone())
        };

        let layout = async {
            let layout = ensure_target(
                &options.target_dir,
                &options.kernel_path,
                &options.initrd_path,
                &options.rootfs_path,
                capabilities.target_reconciler.as_ref(),
            )
            .await?;

            ensure_scratch_disk(
                &layout.disk_tmp,
                options.scratch_disk_bytes,
                capabilities.disk_allocator.as_ref(),
            )
            .await?;

            Ok::<_, OvmError>(layout)
        }
        .await
        .inspect_err(|e| log_task_error(&instance, task_name, e))?;

        let mut ctx = ctx.lock().await;
        ctx.target_output = Some(layout);

        Ok(())
    }

    fn name(&self) -> &str {
        "target"
    }
}

/// Create the target directory, derive the canonical asset paths and hand
/// them to the reconciler.
pub async fn ensure_target(
    target_dir: &Path,
    kernel_src: &Path,
    initrd_src: &Path,
    rootfs_src: &Path,
    reconciler: &dyn TargetReconciler,
) -> OvmResult<TargetLayout> {
    let target_dir = absolutize(target_dir)?;

    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(&target_dir)
        .await
        .map_err(|e| {
            OvmError::Storage(format!(
                "Failed to create target directory {}: {}",
                target_dir.display(),
                e
            ))
        })?;

    let spec = TargetSpec {
        kernel_src: absolutize(kernel_src)?,
        initrd_src: absolutize(initrd_src)?,
        rootfs_src: absolutize(rootfs_src)?,
        layout: TargetLayout::derive(&target_dir, kernel_src, initrd_src, rootfs_src)?,
    };

    reconciler.reconcile(&spec).await?;

    Ok(spec.layout)
}

/// Create a sparse file of `size_bytes` at `path` unless something is
/// already there. An existing file is not opened or modified, and losing a
/// creation race to another bootstrap counts as success.
pub async fn ensure_scratch_disk(
    path: &Path,
    size_bytes: u64,
    allocator: &dyn DiskAllocator,
) -> OvmResult<()> {
    ensure_disk_image(allocator, path, size_bytes, "scratch disk").await
}
