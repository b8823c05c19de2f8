//! Task: Basic identity.
//!
//! Copies identity and sizing from the options, makes sure the scratch
//! directory exists and derives the lock file from the executable path.

use super::{BootstrapCtx, log_task_error, task_start};
use crate::bootstrap::types::BasicOutput;
use crate::options::BootstrapOptions;
use crate::paths::{absolutize, lock_file_path, resolve_executable};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use ovm_shared::errors::{OvmError, OvmResult};

pub struct BasicTask;

#[async_trait]
impl PipelineTask<BootstrapCtx> for BasicTask {
    async fn run(self: Box<Self>, ctx: BootstrapCtx) -> OvmResult<()> {
        let task_name = self.name();
        let instance = task_start(&ctx, task_name).await;

        let options = { ctx.lock().await.options.clone() };

        let output = run_basic(&options)
            .await
            .inspect_err(|e| log_task_error(&instance, task_name, e))?;

        let mut ctx = ctx.lock().await;
        ctx.basic_output = Some(output);

        Ok(())
    }

    fn name(&self) -> &str {
        "basic"
    }
}

async fn run_basic(options: &BootstrapOptions) -> OvmResult<BasicOutput> {
    let scratch_dir = absolutize(&options.scratch_dir)?;
    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(&scratch_dir)
        .await
        .map_err(|e| {
            OvmError::Storage(format!(
                "Failed to create scratch directory {}: {}",
                scratch_dir.display(),
                e
            ))
        })?;

    let explicit = options.executable_path.clone();
    let executable_path =
        tokio::task::spawn_blocking(move || resolve_executable(explicit.as_deref()))
            .await
            .map_err(|e| OvmError::Internal(format!("Executable lookup failed: {}", e)))??;

    let memory_bytes = options.memory_bytes().ok_or_else(|| {
        OvmError::Config(format!(
            "memory of {} MiB does not fit in a byte count",
            options.memory_mib
        ))
    })?;

    let lock_file = lock_file_path(&scratch_dir, &executable_path, &options.name);
    tracing::debug!(
        executable = %executable_path.display(),
        lock_file = %lock_file.display(),
        "Derived lock file"
    );

    let event_socket_path = options
        .event_socket_path
        .as_deref()
        .map(absolutize)
        .transpose()?;

    Ok(BasicOutput {
        name: options.name.clone(),
        cpus: options.cpus,
        memory_bytes,
        cli_mode: options.cli_mode,
        bind_pid: options.bind_pid,
        event_socket_path,
        power_save_mode: options.power_save_mode,
        kernel_debug: options.kernel_debug,
        executable_path,
        lock_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_basic_output() {
        let temp_dir = TempDir::new().unwrap();
        let exe = temp_dir.path().join("OVM");
        std::fs::write(&exe, b"").unwrap();

        let options = BootstrapOptions {
            name: "vm1".into(),
            memory_mib: 512,
            scratch_dir: temp_dir.path().join("scratch"),
            executable_path: Some(exe),
            event_socket_path: Some(PathBuf::from("events.sock")),
            ..BootstrapOptions::with_home(temp_dir.path())
        };

        let output = run_basic(&options).await.unwrap();

        assert!(temp_dir.path().join("scratch").is_dir());
        assert_eq!(output.memory_bytes, 512 * 1024 * 1024);
        assert!(output.executable_path.to_string_lossy().ends_with("/ovm"));
        assert!(output.lock_file.starts_with(temp_dir.path().join("scratch")));
        assert!(output.lock_file.to_string_lossy().ends_with("-vm1.pid"));
        assert!(output.event_socket_path.unwrap().is_absolute());
    }

    #[tokio::test]
    async fn test_oversized_memory_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let exe = temp_dir.path().join("ovm");
        std::fs::write(&exe, b"").unwrap();

        let options = BootstrapOptions {
            memory_mib: u64::MAX / 1024,
            scratch_dir: temp_dir.path().join("scratch"),
            executable_path: Some(exe),
            ..BootstrapOptions::with_home(temp_dir.path())
        };

        let err = run_basic(&options).await.unwrap_err();
        assert!(matches!(err, OvmError::Config(_)));
    }

    #[tokio::test]
    async fn test_unresolvable_executable() {
        let temp_dir = TempDir::new().unwrap();
        let options = BootstrapOptions {
            scratch_dir: temp_dir.path().join("scratch"),
            executable_path: Some(temp_dir.path().join("missing")),
            ..BootstrapOptions::with_home(temp_dir.path())
        };

        let err = run_basic(&options).await.unwrap_err();
        assert!(matches!(err, OvmError::Config(_)));
    }
}
