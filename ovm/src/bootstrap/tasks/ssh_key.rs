//! Task: SSH keypair.
//!
//! Reuses an existing keypair, or regenerates both halves when either one is
//! missing. A partial keypair is never trusted.

use super::{BootstrapCtx, log_task_error, task_start};
use crate::bootstrap::types::SshKeyMaterial;
use crate::capability::KeyGenerator;
use crate::paths::{SshKeyPaths, absolutize};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use ovm_shared::errors::{OvmError, OvmResult};
use std::path::Path;

pub struct SshKeyTask;

#[async_trait]
impl PipelineTask<BootstrapCtx> for SshKeyTask {
    async fn run(self: Box<Self>, ctx: BootstrapCtx) -> OvmResult<()> {
        let task_name = self.name();
        let instance = task_start(&ctx, task_name).await;

        let (ssh_key_dir, generator) = {
            let ctx = ctx.lock().await;
            (
                ctx.options.ssh_key_dir.clone(),
                ctx.capabilities.key_generator.clone(),
            )
        };

        let material = ensure_keypair(&ssh_key_dir, &instance, generator.as_ref())
            .await
            .inspect_err(|e| log_task_error(&instance, task_name, e))?;

        let mut ctx = ctx.lock().await;
        ctx.ssh_output = Some(material);

        Ok(())
    }

    fn name(&self) -> &str {
        "ssh_key"
    }
}

/// Make sure `<dir>/<name>` and `<dir>/<name>.pub` exist as one pair and
/// return the trimmed public key.
pub async fn ensure_keypair(
    dir: &Path,
    name: &str,
    generator: &dyn KeyGenerator,
) -> OvmResult<SshKeyMaterial> {
    let dir = absolutize(dir)?;
    let paths = SshKeyPaths::derive(&dir, name);

    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(&dir)
        .await
        .map_err(|e| {
            OvmError::Storage(format!(
                "Failed to create ssh directory {}: {}",
                dir.display(),
                e
            ))
        })?;

    let (private, public) = tokio::join!(
        tokio::fs::metadata(&paths.private_key_path),
        tokio::fs::metadata(&paths.public_key_path),
    );

    if let Err(e) = private.and(public) {
        tracing::info!(
            dir = %dir.display(),
            reason = %e,
            "SSH keypair incomplete, regenerating"
        );

        remove_best_effort(&paths.private_key_path).await;
        remove_best_effort(&paths.public_key_path).await;

        generator.generate(&dir, name).await?;
    }

    let raw = tokio::fs::read_to_string(&paths.public_key_path)
        .await
        .map_err(|e| {
            OvmError::Credential(format!(
                "Failed to read public key {}: {}",
                paths.public_key_path.display(),
                e
            ))
        })?;

    let public_key = raw.trim().to_string();
    if public_key.is_empty() {
        return Err(OvmError::Credential(format!(
            "Public key {} is empty",
            paths.public_key_path.display()
        )));
    }

    Ok(SshKeyMaterial { paths, public_key })
}

/// Remove a file or directory, ignoring failures.
async fn remove_best_effort(path: &Path) {
    let removed = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(_) => return,
    };
    if let Err(e) = removed {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale key file");
    }
}
