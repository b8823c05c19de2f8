//! Path derivation for the bootstrap.
//!
//! Everything here is pure apart from reading the current directory (for
//! `absolutize`) and resolving the executable's real path.

use crate::constants::{filenames, sockets};
use ovm_shared::Transport;
use ovm_shared::errors::{OvmError, OvmResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against the current directory without touching symlinks.
pub fn absolutize(path: &Path) -> OvmResult<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        OvmError::Config(format!(
            "Failed to resolve absolute path for '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
///
/// Symlinks are not followed; two spellings of the same directory compare
/// equal only if they differ by `.` or `..` segments.
pub fn normalize(path: &Path) -> OvmResult<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in absolutize(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Resolve the running binary to its real, lower-cased path.
///
/// `explicit` overrides `std::env::current_exe()`; symlinks are resolved in
/// both cases.
pub fn resolve_executable(explicit: Option<&Path>) -> OvmResult<PathBuf> {
    let exe = match explicit {
        Some(p) => p.to_path_buf(),
        None => std::env::current_exe().map_err(|e| {
            OvmError::Config(format!("Failed to get executable path: {}", e))
        })?,
    };

    let real = exe.canonicalize().map_err(|e| {
        OvmError::Config(format!(
            "Failed to resolve symlinks for '{}': {}",
            exe.display(),
            e
        ))
    })?;

    Ok(PathBuf::from(real.to_string_lossy().to_lowercase()))
}

/// Lock file for single-instance enforcement.
///
/// `<scratch_dir>/<hex(sha256(executable)[..16])>-<name>.pid`. Two launches of
/// the same binary path collide; different paths do not.
pub fn lock_file_path(scratch_dir: &Path, executable: &Path, name: &str) -> PathBuf {
    let digest = Sha256::digest(executable.as_os_str().as_encoded_bytes());
    let hash = hex::encode(&digest[..16]);
    scratch_dir.join(format!("{}-{}.{}", hash, name, filenames::LOCK_FILE_EXT))
}

/// Unix socket endpoints living in the socket namespace directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketPaths {
    pub dir: PathBuf,
    pub forward: PathBuf,
    pub network: PathBuf,
    pub initrd_vsock: PathBuf,
    pub ready: PathBuf,
    pub restful: PathBuf,
    pub time_sync: PathBuf,
    pub ssh_auth: PathBuf,
}

impl SocketPaths {
    pub fn derive(dir: &Path, name: &str) -> Self {
        let sock = |suffix: &str| dir.join(format!("{}{}", name, suffix));
        Self {
            dir: dir.to_path_buf(),
            forward: sock(sockets::FORWARD),
            network: sock(sockets::NETWORK),
            initrd_vsock: sock(sockets::INITRD_VSOCK),
            ready: sock(sockets::READY),
            restful: sock(sockets::RESTFUL),
            time_sync: sock(sockets::TIME_SYNC),
            ssh_auth: sock(sockets::SSH_AUTH),
        }
    }

    /// All seven socket paths, in `sockets::ALL` order.
    pub fn all(&self) -> [&Path; 7] {
        [
            &self.forward,
            &self.network,
            &self.initrd_vsock,
            &self.ready,
            &self.restful,
            &self.time_sync,
            &self.ssh_auth,
        ]
    }

    /// Endpoint the supervisor exposes its network socket on.
    pub fn endpoint(&self) -> Transport {
        Transport::unix(&self.network)
    }
}

/// Keypair file locations: `<dir>/<name>` and `<dir>/<name>.pub`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyPaths {
    pub dir: PathBuf,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
}

impl SshKeyPaths {
    pub fn derive(dir: &Path, name: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            private_key_path: dir.join(name),
            public_key_path: dir.join(format!("{}.{}", name, filenames::PUBLIC_KEY_EXT)),
        }
    }
}

/// Canonical on-disk locations of the boot assets and disks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLayout {
    pub dir: PathBuf,
    pub versions: PathBuf,
    pub kernel: PathBuf,
    pub initrd: PathBuf,
    pub rootfs: PathBuf,
    pub disk_data: PathBuf,
    pub disk_tmp: PathBuf,
}

impl TargetLayout {
    /// Each boot asset keeps the basename of its source.
    pub fn derive(
        dir: &Path,
        kernel_src: &Path,
        initrd_src: &Path,
        rootfs_src: &Path,
    ) -> OvmResult<Self> {
        Ok(Self {
            dir: dir.to_path_buf(),
            versions: dir.join(filenames::VERSIONS),
            kernel: dir.join(basename(kernel_src)?),
            initrd: dir.join(basename(initrd_src)?),
            rootfs: dir.join(basename(rootfs_src)?),
            disk_data: dir.join(filenames::DATA_DISK),
            disk_tmp: dir.join(filenames::TMP_DISK),
        })
    }
}

fn basename(path: &Path) -> OvmResult<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| {
        OvmError::Config(format!("Path has no file name: '{}'", path.display()))
    })
}
