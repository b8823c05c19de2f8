//! Bootstrap configuration.
//!
//! Built once by the caller (from CLI flags, a JSON file, or code) and handed
//! to [`Bootstrap::new`](crate::Bootstrap::new). Nothing in the bootstrap reads
//! process-global configuration.

use crate::constants::{dirs as layout_dirs, disk, envs, vm_defaults};
use crate::paths::normalize;
use ovm_shared::errors::{OvmError, OvmResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Immutable inputs of a bootstrap run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapOptions {
    /// Instance name; prefixes socket names, key names and the lock file.
    pub name: String,
    pub cpus: u32,
    pub memory_mib: u64,
    pub cli_mode: bool,
    /// PID of the process this instance should follow.
    pub bind_pid: Option<u32>,
    pub event_socket_path: Option<PathBuf>,
    pub power_save_mode: bool,
    pub kernel_debug: bool,

    pub socket_dir: PathBuf,
    pub ssh_key_dir: PathBuf,
    pub log_dir: PathBuf,
    pub target_dir: PathBuf,

    /// Boot asset sources; their basenames become the names under `target_dir`.
    pub kernel_path: PathBuf,
    pub initrd_path: PathBuf,
    pub rootfs_path: PathBuf,

    /// Machine-wide directory for lock files.
    pub scratch_dir: PathBuf,
    /// Overrides `std::env::current_exe()` when deriving the lock file.
    pub executable_path: Option<PathBuf>,
    /// First port tried for guest SSH.
    pub ssh_port: u16,
    pub scratch_disk_bytes: u64,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        let home = default_home_dir();
        Self {
            name: vm_defaults::DEFAULT_NAME.to_string(),
            cpus: vm_defaults::DEFAULT_CPUS,
            memory_mib: vm_defaults::DEFAULT_MEMORY_MIB,
            cli_mode: false,
            bind_pid: None,
            event_socket_path: None,
            power_save_mode: false,
            kernel_debug: false,
            socket_dir: home.join(layout_dirs::SOCKETS_DIR),
            ssh_key_dir: home.join(layout_dirs::SSH_DIR),
            log_dir: home.join(layout_dirs::LOGS_DIR),
            target_dir: home.join(layout_dirs::TARGET_DIR),
            kernel_path: PathBuf::new(),
            initrd_path: PathBuf::new(),
            rootfs_path: PathBuf::new(),
            scratch_dir: PathBuf::from(layout_dirs::SCRATCH_DIR),
            executable_path: None,
            ssh_port: vm_defaults::DEFAULT_SSH_PORT,
            scratch_disk_bytes: disk::SCRATCH_DISK_SIZE_BYTES,
        }
    }
}

/// `$OVM_HOME`, else `~/.ovm`.
fn default_home_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(envs::OVM_HOME).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(layout_dirs::HOME_DIR)
}

impl BootstrapOptions {
    /// Options with every directory rooted at `home` (`sockets/`, `ssh/`,
    /// `logs/`, `target/`).
    pub fn with_home(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref();
        Self {
            socket_dir: home.join(layout_dirs::SOCKETS_DIR),
            ssh_key_dir: home.join(layout_dirs::SSH_DIR),
            log_dir: home.join(layout_dirs::LOGS_DIR),
            target_dir: home.join(layout_dirs::TARGET_DIR),
            ..Self::default()
        }
    }

    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> OvmResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| OvmError::Config(format!("Invalid bootstrap options: {}", e)))
    }

    /// Guest memory in bytes; `None` if `memory_mib` overflows.
    pub fn memory_bytes(&self) -> Option<u64> {
        self.memory_mib.checked_mul(1024 * 1024)
    }

    /// Validate options before any work is started.
    pub fn sanitize(&self) -> OvmResult<()> {
        if self.name.is_empty()
            || self.name == "."
            || self.name == ".."
            || self.name.contains(std::path::MAIN_SEPARATOR)
            || self.name.contains('/')
        {
            return Err(OvmError::Config(format!(
                "Invalid instance name: '{}'",
                self.name
            )));
        }

        if self.cpus == 0 {
            return Err(OvmError::Config("cpus must be at least 1".into()));
        }
        if self.memory_mib == 0 {
            return Err(OvmError::Config("memory must be at least 1 MiB".into()));
        }
        if self.memory_bytes().is_none() {
            return Err(OvmError::Config(format!(
                "memory of {} MiB does not fit in a byte count",
                self.memory_mib
            )));
        }
        if self.scratch_disk_bytes == 0 {
            return Err(OvmError::Config("scratch disk size must be non-zero".into()));
        }
        if self.ssh_port == 0 {
            return Err(OvmError::Config("preferred ssh port must be non-zero".into()));
        }

        for (what, path) in [
            ("kernel", &self.kernel_path),
            ("initrd", &self.initrd_path),
            ("rootfs", &self.rootfs_path),
        ] {
            if path.file_name().is_none() {
                return Err(OvmError::Config(format!(
                    "{} source path must name a file, got '{}'",
                    what,
                    path.display()
                )));
            }
        }

        // The socket directory is wiped while sibling tasks write into theirs,
        // so it must not overlap any of them. Compare normalized forms so
        // `..` aliases are caught.
        let socket_dir = normalize(&self.socket_dir)?;
        for (what, path) in [
            ("ssh key", &self.ssh_key_dir),
            ("log", &self.log_dir),
            ("target", &self.target_dir),
            ("scratch", &self.scratch_dir),
        ] {
            let other = normalize(path)?;
            if socket_dir.starts_with(&other) || other.starts_with(&socket_dir) {
                return Err(OvmError::Config(format!(
                    "socket directory {} overlaps {} directory {}",
                    socket_dir.display(),
                    what,
                    other.display()
                )));
            }
        }

        let event_socket = self.event_socket_path.iter().map(|p| ("event socket", p));
        for (what, path) in [
            ("kernel", &self.kernel_path),
            ("initrd", &self.initrd_path),
            ("rootfs", &self.rootfs_path),
        ]
        .into_iter()
        .chain(event_socket)
        {
            let other = normalize(path)?;
            if other.starts_with(&socket_dir) {
                return Err(OvmError::Config(format!(
                    "{} path {} lies inside socket directory {}",
                    what,
                    other.display(),
                    socket_dir.display()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_options() -> BootstrapOptions {
        BootstrapOptions {
            kernel_path: PathBuf::from("/bundle/bzImage"),
            initrd_path: PathBuf::from("/bundle/initrd.gz"),
            rootfs_path: PathBuf::from("/bundle/rootfs.erofs"),
            ..BootstrapOptions::with_home("/var/lib/ovm-test")
        }
    }

    #[test]
    fn test_with_home_layout() {
        let options = BootstrapOptions::with_home("/var/lib/ovm-test");
        assert_eq!(options.socket_dir, Path::new("/var/lib/ovm-test/sockets"));
        assert_eq!(options.ssh_key_dir, Path::new("/var/lib/ovm-test/ssh"));
        assert_eq!(options.log_dir, Path::new("/var/lib/ovm-test/logs"));
        assert_eq!(options.target_dir, Path::new("/var/lib/ovm-test/target"));
        assert_eq!(options.ssh_port, 2233);
        assert_eq!(options.scratch_disk_bytes, 1 << 40);
    }

    #[test]
    fn test_valid_options_pass() {
        valid_options().sanitize().unwrap();
    }

    #[test]
    fn test_rejects_bad_name() {
        for name in ["", "..", "a/b"] {
            let options = BootstrapOptions {
                name: name.to_string(),
                ..valid_options()
            };
            assert!(
                matches!(options.sanitize(), Err(OvmError::Config(_))),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_rejects_zero_resources() {
        let options = BootstrapOptions {
            cpus: 0,
            ..valid_options()
        };
        assert!(options.sanitize().is_err());

        let options = BootstrapOptions {
            ssh_port: 0,
            ..valid_options()
        };
        assert!(options.sanitize().is_err());
    }

    #[test]
    fn test_rejects_missing_asset_source() {
        let options = BootstrapOptions {
            initrd_path: PathBuf::new(),
            ..valid_options()
        };
        let err = options.sanitize().unwrap_err();
        assert!(err.to_string().contains("initrd"));
    }

    #[test]
    fn test_rejects_overlapping_socket_dir() {
        let options = BootstrapOptions {
            log_dir: PathBuf::from("/var/lib/ovm-test/sockets/logs"),
            ..valid_options()
        };
        let err = options.sanitize().unwrap_err();
        assert!(err.to_string().contains("overlaps log directory"));

        let options = BootstrapOptions {
            socket_dir: PathBuf::from("/var/lib/ovm-test/target"),
            ..valid_options()
        };
        assert!(options.sanitize().is_err());
    }

    #[test]
    fn test_rejects_socket_dir_aliased_with_dot_dot() {
        let options = BootstrapOptions {
            socket_dir: PathBuf::from("/var/lib/ovm-test/x/../logs"),
            ..valid_options()
        };
        let err = options.sanitize().unwrap_err();
        assert!(err.to_string().contains("overlaps log directory"));

        let options = BootstrapOptions {
            ssh_key_dir: PathBuf::from("/var/lib/ovm-test/ssh/../sockets/./keys"),
            ..valid_options()
        };
        assert!(matches!(options.sanitize(), Err(OvmError::Config(_))));
    }

    #[test]
    fn test_rejects_inputs_inside_socket_dir() {
        let options = BootstrapOptions {
            rootfs_path: PathBuf::from("/var/lib/ovm-test/sockets/rootfs.erofs"),
            ..valid_options()
        };
        let err = options.sanitize().unwrap_err();
        assert!(err.to_string().contains("rootfs path"));

        let options = BootstrapOptions {
            event_socket_path: Some(PathBuf::from("/var/lib/ovm-test/sockets/events.sock")),
            ..valid_options()
        };
        let err = options.sanitize().unwrap_err();
        assert!(err.to_string().contains("event socket path"));

        let options = BootstrapOptions {
            event_socket_path: Some(PathBuf::from("/run/ovm/events.sock")),
            ..valid_options()
        };
        options.sanitize().unwrap();
    }

    #[test]
    fn test_rejects_memory_overflowing_bytes() {
        let options = BootstrapOptions {
            memory_mib: u64::MAX / 1024,
            ..valid_options()
        };
        assert_eq!(options.memory_bytes(), None);
        let err = options.sanitize().unwrap_err();
        assert!(matches!(err, OvmError::Config(_)));

        assert_eq!(valid_options().memory_bytes(), Some(2048 * 1024 * 1024));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let options = BootstrapOptions::from_json(
            r#"{"name": "vm2", "cpus": 4, "kernel_path": "/k/bzImage"}"#,
        )
        .unwrap();
        assert_eq!(options.name, "vm2");
        assert_eq!(options.cpus, 4);
        assert_eq!(options.kernel_path, Path::new("/k/bzImage"));
        assert_eq!(options.memory_mib, 2048);
    }

    #[test]
    fn test_from_json_invalid() {
        let err = BootstrapOptions::from_json("{\"cpus\": \"many\"}").unwrap_err();
        assert!(matches!(err, OvmError::Config(_)));
    }
}
