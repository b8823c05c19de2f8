//! ovm host bootstrap.
//!
//! Locates, validates and (re)creates everything a VM host process needs
//! before the supervisor starts: runtime paths, an SSH keypair, a free SSH
//! port, the socket namespace, versioned boot assets and backing disks. The
//! result is one immutable [`Context`].
//!
//! ```no_run
//! # async fn run() -> ovm::OvmResult<()> {
//! let options = ovm::BootstrapOptions::from_json(r#"{
//!     "name": "ovm",
//!     "kernel_path": "/bundle/bzImage",
//!     "initrd_path": "/bundle/initrd.gz",
//!     "rootfs_path": "/bundle/rootfs.erofs"
//! }"#)?;
//! let ctx = ovm::run_bootstrap(options, ovm::Capabilities::default()).await?;
//! ovm::init_logging_for(&ctx)?;
//! # Ok(())
//! # }
//! ```

mod bootstrap;
pub mod capability;
pub mod constants;
mod context;
mod logging;
mod options;
pub mod paths;
pub mod pipeline;

pub use bootstrap::{
    Bootstrap, BootstrapPhase, SshKeyMaterial, ensure_keypair, ensure_scratch_disk, ensure_target,
    reset_socket_dir, run_bootstrap,
};
pub use capability::{
    Capabilities, DiskAllocator, KeyGenerator, PortProber, TargetReconciler, TargetSpec,
};
pub use context::{Context, SshCredentials};
pub use logging::init_logging_for;
pub use options::BootstrapOptions;
pub use ovm_shared::{OvmError, OvmResult, Transport};
