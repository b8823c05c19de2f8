//! External capabilities the bootstrap delegates to.
//!
//! The bootstrap only depends on these traits:
//!
//! - **KeyGenerator**: writes an SSH keypair at `<dir>/<name>{,.pub}`
//! - **PortProber**: finds a currently unbound TCP port
//! - **DiskAllocator**: creates a sparse file of a given logical size
//! - **TargetReconciler**: brings boot assets in line with their manifest
//!
//! `Capabilities::default()` wires the implementations shipped with this crate.

mod disk;
mod keygen;
mod port;
mod target;

pub use disk::SparseFileAllocator;
pub(crate) use disk::ensure_disk_image;
pub use keygen::SshKeygen;
pub use port::TcpPortProber;
pub use target::{AssetEntry, Manifest, ManifestReconciler};

use crate::paths::TargetLayout;
use async_trait::async_trait;
use ovm_shared::errors::OvmResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Generates SSH key material.
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    /// Write a fresh keypair at `<dir>/<base_name>` and `<dir>/<base_name>.pub`.
    ///
    /// Both files are expected to be absent when called.
    async fn generate(&self, dir: &Path, base_name: &str) -> OvmResult<()>;
}

/// Finds a TCP port nothing is bound to.
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Search starting at `preferred`. Fails with `ResourceExhausted` once the
    /// bounded search runs out of candidates.
    async fn find_usable_port(&self, preferred: u16) -> OvmResult<u16>;
}

/// Allocates disk image files.
#[async_trait]
pub trait DiskAllocator: Send + Sync {
    /// Create `path` with a logical size of exactly `size_bytes`, without
    /// allocating the underlying blocks.
    async fn create_sparse_file(&self, path: &Path, size_bytes: u64) -> OvmResult<()>;
}

/// Everything a reconciler needs to know about one target directory.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub kernel_src: PathBuf,
    pub initrd_src: PathBuf,
    pub rootfs_src: PathBuf,
    /// Canonical destinations, data disk and manifest path.
    pub layout: TargetLayout,
}

/// Keeps the versioned boot assets of a target directory up to date.
#[async_trait]
pub trait TargetReconciler: Send + Sync {
    /// Succeeds only when kernel, initrd, rootfs and the manifest are present
    /// and consistent at `spec.layout`, and the data disk exists.
    async fn reconcile(&self, spec: &TargetSpec) -> OvmResult<()>;
}

/// The set of capabilities one bootstrap run uses.
#[derive(Clone)]
pub struct Capabilities {
    pub key_generator: Arc<dyn KeyGenerator>,
    pub port_prober: Arc<dyn PortProber>,
    pub disk_allocator: Arc<dyn DiskAllocator>,
    pub target_reconciler: Arc<dyn TargetReconciler>,
}

impl Default for Capabilities {
    fn default() -> Self {
        let disk_allocator: Arc<dyn DiskAllocator> = Arc::new(SparseFileAllocator);
        Self {
            key_generator: Arc::new(SshKeygen::new()),
            port_prober: Arc::new(TcpPortProber::default()),
            target_reconciler: Arc::new(ManifestReconciler::new(Arc::clone(&disk_allocator))),
            disk_allocator,
        }
    }
}
