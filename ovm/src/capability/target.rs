//! Boot asset reconciliation against `versions.json`.
//!
//! The manifest records, per asset kind, the file name placed in the target
//! directory and the SHA-256 of the source it was copied from. An asset is
//! refreshed when its destination is missing or the recorded digest no longer
//! matches the source.

use super::{DiskAllocator, TargetReconciler, TargetSpec, ensure_disk_image};
use crate::constants::disk;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ovm_shared::errors::{OvmError, OvmResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Contents of `versions.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: BTreeMap<String, AssetEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub file: String,
    pub sha256: String,
}

impl Manifest {
    /// Load the manifest; a missing or unreadable one counts as empty.
    pub async fn load(path: &Path) -> OvmResult<Self> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(OvmError::Storage(format!(
                    "Failed to read manifest {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        match serde_json::from_str(&raw) {
            Ok(manifest) => Ok(manifest),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Manifest is corrupt, rebuilding from sources"
                );
                Ok(Self::default())
            }
        }
    }

    async fn save(&self, path: &Path) -> OvmResult<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| OvmError::Internal(format!("Failed to encode manifest: {}", e)))?;
        let path = path.to_path_buf();
        blocking(move || write_atomic(&path, &json)).await
    }
}

/// Reconciler that copies assets from their sources and tracks them by digest.
pub struct ManifestReconciler {
    allocator: Arc<dyn DiskAllocator>,
    data_disk_bytes: u64,
}

impl ManifestReconciler {
    pub fn new(allocator: Arc<dyn DiskAllocator>) -> Self {
        Self {
            allocator,
            data_disk_bytes: disk::DATA_DISK_SIZE_BYTES,
        }
    }

    /// Logical size used when the data disk has to be created.
    pub fn with_data_disk_bytes(mut self, size_bytes: u64) -> Self {
        self.data_disk_bytes = size_bytes;
        self
    }
}

#[async_trait]
impl TargetReconciler for ManifestReconciler {
    async fn reconcile(&self, spec: &TargetSpec) -> OvmResult<()> {
        let layout = &spec.layout;
        let mut manifest = Manifest::load(&layout.versions).await?;
        let mut changed = false;

        for (kind, src, dest) in [
            ("kernel", &spec.kernel_src, &layout.kernel),
            ("initrd", &spec.initrd_src, &layout.initrd),
            ("rootfs", &spec.rootfs_src, &layout.rootfs),
        ] {
            changed |= sync_asset(&mut manifest, kind, src, dest).await?;
        }

        ensure_disk_image(
            self.allocator.as_ref(),
            &layout.disk_data,
            self.data_disk_bytes,
            "data disk",
        )
        .await?;

        if changed {
            manifest.updated_at = Some(Utc::now());
            manifest.save(&layout.versions).await?;
            tracing::info!(path = %layout.versions.display(), "Updated boot asset manifest");
        }

        Ok(())
    }
}

/// Bring one asset up to date. Returns whether the manifest changed.
async fn sync_asset(
    manifest: &mut Manifest,
    kind: &str,
    src: &Path,
    dest: &Path,
) -> OvmResult<bool> {
    let file = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            OvmError::Reconcile(format!("{} destination has no file name", kind))
        })?;

    let src_owned = src.to_path_buf();
    let digest = blocking(move || sha256_file(&src_owned))
        .await
        .map_err(|e| {
            OvmError::Reconcile(format!(
                "{} source {} is unusable: {}",
                kind,
                src.display(),
                e
            ))
        })?;

    let expected = AssetEntry {
        file,
        sha256: digest,
    };
    let dest_present = tokio::fs::metadata(dest)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);

    if dest_present && manifest.assets.get(kind) == Some(&expected) {
        tracing::trace!(asset = kind, path = %dest.display(), "Boot asset up to date");
        return Ok(false);
    }

    tracing::info!(
        asset = kind,
        src = %src.display(),
        dest = %dest.display(),
        "Updating boot asset"
    );

    let (src_owned, dest_owned) = (src.to_path_buf(), dest.to_path_buf());
    blocking(move || copy_atomic(&src_owned, &dest_owned))
        .await
        .map_err(|e| {
            OvmError::Reconcile(format!(
                "Failed to install {} at {}: {}",
                kind,
                dest.display(),
                e
            ))
        })?;

    manifest.assets.insert(kind.to_string(), expected);
    Ok(true)
}

async fn blocking<T, F>(f: F) -> OvmResult<T>
where
    F: FnOnce() -> OvmResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OvmError::Internal(format!("Blocking task failed: {}", e)))?
}

fn sha256_file(path: &Path) -> OvmResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn temp_in_parent(path: &Path) -> OvmResult<NamedTempFile> {
    let dir: PathBuf = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(NamedTempFile::new_in(dir)?)
}

fn copy_atomic(src: &Path, dest: &Path) -> OvmResult<()> {
    let mut tmp = temp_in_parent(dest)?;
    let mut file = std::fs::File::open(src)?;
    std::io::copy(&mut file, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| OvmError::Io(e.error))?;
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> OvmResult<()> {
    let mut tmp = temp_in_parent(path)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| OvmError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::SparseFileAllocator;
    use crate::paths::TargetLayout;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        sources: PathBuf,
        spec: TargetSpec,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let sources = temp.path().join("bundle");
        let target = temp.path().join("target");
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::create_dir_all(&target).unwrap();

        for (name, content) in [
            ("bzImage", "kernel-v1"),
            ("initrd.gz", "initrd-v1"),
            ("rootfs.erofs", "rootfs-v1"),
        ] {
            std::fs::write(sources.join(name), content).unwrap();
        }

        let kernel_src = sources.join("bzImage");
        let initrd_src = sources.join("initrd.gz");
        let rootfs_src = sources.join("rootfs.erofs");
        let layout = TargetLayout::derive(&target, &kernel_src, &initrd_src, &rootfs_src).unwrap();

        Fixture {
            _temp: temp,
            sources,
            spec: TargetSpec {
                kernel_src,
                initrd_src,
                rootfs_src,
                layout,
            },
        }
    }

    fn reconciler() -> ManifestReconciler {
        ManifestReconciler::new(Arc::new(SparseFileAllocator)).with_data_disk_bytes(1024 * 1024)
    }

    #[tokio::test]
    async fn test_first_reconcile_installs_everything() {
        let fx = fixture();
        reconciler().reconcile(&fx.spec).await.unwrap();

        let layout = &fx.spec.layout;
        assert_eq!(std::fs::read_to_string(&layout.kernel).unwrap(), "kernel-v1");
        assert_eq!(std::fs::read_to_string(&layout.initrd).unwrap(), "initrd-v1");
        assert_eq!(std::fs::read_to_string(&layout.rootfs).unwrap(), "rootfs-v1");
        assert_eq!(std::fs::metadata(&layout.disk_data).unwrap().len(), 1024 * 1024);

        let manifest = Manifest::load(&layout.versions).await.unwrap();
        assert!(manifest.updated_at.is_some());
        assert_eq!(manifest.assets.len(), 3);
        assert_eq!(manifest.assets["kernel"].file, "bzImage");
        assert_eq!(manifest.assets["kernel"].sha256.len(), 64);
    }

    #[tokio::test]
    async fn test_second_reconcile_is_noop() {
        let fx = fixture();
        let reconciler = reconciler();
        reconciler.reconcile(&fx.spec).await.unwrap();
        let before = std::fs::read(&fx.spec.layout.versions).unwrap();

        reconciler.reconcile(&fx.spec).await.unwrap();
        let after = std::fs::read(&fx.spec.layout.versions).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_changed_source_is_reinstalled() {
        let fx = fixture();
        let reconciler = reconciler();
        reconciler.reconcile(&fx.spec).await.unwrap();
        let old = Manifest::load(&fx.spec.layout.versions).await.unwrap();

        std::fs::write(fx.sources.join("rootfs.erofs"), "rootfs-v2").unwrap();
        reconciler.reconcile(&fx.spec).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&fx.spec.layout.rootfs).unwrap(),
            "rootfs-v2"
        );
        let new = Manifest::load(&fx.spec.layout.versions).await.unwrap();
        assert_ne!(old.assets["rootfs"], new.assets["rootfs"]);
        assert_eq!(old.assets["kernel"], new.assets["kernel"]);
    }

    #[tokio::test]
    async fn test_deleted_destination_is_restored() {
        let fx = fixture();
        let reconciler = reconciler();
        reconciler.reconcile(&fx.spec).await.unwrap();

        std::fs::remove_file(&fx.spec.layout.initrd).unwrap();
        reconciler.reconcile(&fx.spec).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&fx.spec.layout.initrd).unwrap(),
            "initrd-v1"
        );
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_rebuilt() {
        let fx = fixture();
        std::fs::write(&fx.spec.layout.versions, "{not json").unwrap();

        reconciler().reconcile(&fx.spec).await.unwrap();
        let manifest = Manifest::load(&fx.spec.layout.versions).await.unwrap();
        assert_eq!(manifest.assets.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let fx = fixture();
        std::fs::remove_file(&fx.spec.kernel_src).unwrap();

        let err = reconciler().reconcile(&fx.spec).await.unwrap_err();
        assert!(matches!(err, OvmError::Reconcile(_)));
        assert!(err.to_string().contains("kernel"));
    }

    #[tokio::test]
    async fn test_existing_data_disk_kept() {
        let fx = fixture();
        std::fs::write(&fx.spec.layout.disk_data, b"user data").unwrap();

        reconciler().reconcile(&fx.spec).await.unwrap();
        assert_eq!(
            std::fs::read(&fx.spec.layout.disk_data).unwrap(),
            b"user data"
        );
    }
}
