//! The configuration snapshot produced by a successful bootstrap.

use crate::paths::{SocketPaths, SshKeyPaths, TargetLayout};
use ovm_shared::Transport;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Provisioned SSH access to the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshCredentials {
    pub paths: SshKeyPaths,
    /// Contents of the public key file, whitespace-trimmed.
    pub public_key: String,
    /// Host port forwarded to the guest's SSH daemon.
    pub port: u16,
}

/// Every derived path and setting the supervisor needs.
///
/// Built once at the end of [`Bootstrap::setup`](crate::Bootstrap::setup) and
/// shared read-only as `Arc<Context>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    // === Identity ===
    pub name: String,
    /// Lower-cased, symlink-resolved path of the running binary.
    pub executable_path: PathBuf,
    pub lock_file: PathBuf,
    pub log_path: PathBuf,

    // === Resources & flags ===
    pub cpus: u32,
    pub memory_bytes: u64,
    pub cli_mode: bool,
    pub bind_pid: Option<u32>,
    pub event_socket_path: Option<PathBuf>,
    pub power_save_mode: bool,
    pub kernel_debug: bool,

    // === Provisioned resources ===
    /// Always `unix://<sockets.network>`.
    pub endpoint: Transport,
    pub sockets: SocketPaths,
    pub ssh: SshCredentials,
    pub target: TargetLayout,
}

impl Context {
    /// Directories the bootstrap created or verified.
    pub fn directories(&self) -> [&Path; 4] {
        [
            &self.log_path,
            &self.sockets.dir,
            &self.ssh.paths.dir,
            &self.target.dir,
        ]
    }

    /// Every path-valued field.
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = vec![
            &self.executable_path,
            &self.lock_file,
            &self.log_path,
            self.endpoint.socket_path(),
            &self.ssh.paths.dir,
            &self.ssh.paths.private_key_path,
            &self.ssh.paths.public_key_path,
            &self.target.dir,
            &self.target.versions,
            &self.target.kernel,
            &self.target.initrd,
            &self.target.rootfs,
            &self.target.disk_data,
            &self.target.disk_tmp,
        ];
        paths.push(&self.sockets.dir);
        paths.extend(self.sockets.all());
        if let Some(p) = &self.event_socket_path {
            paths.push(p);
        }
        paths
    }
}
