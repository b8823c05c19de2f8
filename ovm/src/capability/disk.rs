//! Sparse disk image allocation.

use super::DiskAllocator;
use async_trait::async_trait;
use ovm_shared::errors::{OvmError, OvmResult};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Creates sparse files with `File::set_len`.
///
/// The file is created exclusively, so an existing image is never truncated.
#[derive(Debug, Clone, Copy, Default)]
pub struct SparseFileAllocator;

#[async_trait]
impl DiskAllocator for SparseFileAllocator {
    async fn create_sparse_file(&self, path: &Path, size_bytes: u64) -> OvmResult<()> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || create_sparse_file(&path, size_bytes))
            .await
            .map_err(|e| OvmError::Internal(format!("Sparse file task failed: {}", e)))?
    }
}

/// Create a sparse image at `path` unless a file is already there.
///
/// An existing file is never opened. When allocation fails but the file has
/// appeared in the meantime, another process created it first and its file
/// is kept.
pub(crate) async fn ensure_disk_image(
    allocator: &dyn DiskAllocator,
    path: &Path,
    size_bytes: u64,
    label: &str,
) -> OvmResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(_) => {
            tracing::trace!(disk = label, path = %path.display(), "Disk image present");
            return Ok(());
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(OvmError::Storage(format!(
                "Failed to inspect {} {}: {}",
                label,
                path.display(),
                e
            )));
        }
    }

    tracing::info!(disk = label, path = %path.display(), size_bytes, "Creating disk image");
    match allocator.create_sparse_file(path, size_bytes).await {
        Ok(()) => Ok(()),
        Err(e) => match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {
                tracing::debug!(
                    disk = label,
                    path = %path.display(),
                    error = %e,
                    "Disk image created concurrently, keeping it"
                );
                Ok(())
            }
            _ => Err(e),
        },
    }
}

fn create_sparse_file(path: &Path, size_bytes: u64) -> OvmResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            OvmError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            OvmError::Storage(format!(
                "Failed to create disk image {}: {}",
                path.display(),
                e
            ))
        })?;

    if let Err(e) = file.set_len(size_bytes) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(OvmError::Storage(format!(
            "Failed to size disk image {} to {} bytes: {}",
            path.display(),
            size_bytes,
            e
        )));
    }

    tracing::debug!(
        path = %path.display(),
        size_bytes,
        "Created sparse disk image"
    );

    Ok(())
}
