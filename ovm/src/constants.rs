//! Constants for the ovm host bootstrap.
//!
//! Centralized location for fixed file names, socket suffixes and sizing
//! defaults.

pub mod envs {
    /// Overrides the base directory all default paths are rooted at.
    pub const OVM_HOME: &str = "OVM_HOME";
}

/// Default directory layout under the ovm home.
pub mod dirs {
    /// Home directory name under the user's home when `OVM_HOME` is unset.
    pub const HOME_DIR: &str = ".ovm";
    pub const SOCKETS_DIR: &str = "sockets";
    pub const SSH_DIR: &str = "ssh";
    pub const LOGS_DIR: &str = "logs";
    pub const TARGET_DIR: &str = "target";

    /// Machine-wide scratch directory holding lock files.
    pub const SCRATCH_DIR: &str = "/tmp/ovm";
}

/// Unix domain socket names, joined as `<name><suffix>`.
pub mod sockets {
    pub const FORWARD: &str = "-podman.sock";
    pub const NETWORK: &str = "-vfkit-network.sock";
    pub const INITRD_VSOCK: &str = "-initrd-vsock.sock";
    pub const READY: &str = "-ready.sock";
    pub const RESTFUL: &str = "-restful.sock";
    pub const TIME_SYNC: &str = "-sync-time.sock";
    pub const SSH_AUTH: &str = "-ssh-auth.sock";

    pub const ALL: [&str; 7] = [
        FORWARD,
        NETWORK,
        INITRD_VSOCK,
        READY,
        RESTFUL,
        TIME_SYNC,
        SSH_AUTH,
    ];
}

/// File naming patterns
pub mod filenames {
    /// Boot asset manifest inside the target directory.
    pub const VERSIONS: &str = "versions.json";
    /// Primary data disk inside the target directory.
    pub const DATA_DISK: &str = "data.img";
    /// Scratch disk inside the target directory.
    pub const TMP_DISK: &str = "tmp.img";
    pub const PUBLIC_KEY_EXT: &str = "pub";
    pub const LOCK_FILE_EXT: &str = "pid";
    /// Prefix of the rolling log file.
    pub const LOG_FILE: &str = "ovm.log";
}

/// Virtual machine resource defaults
pub mod vm_defaults {
    pub const DEFAULT_NAME: &str = "ovm";

    pub const DEFAULT_CPUS: u32 = 2;

    /// Default memory in MiB
    pub const DEFAULT_MEMORY_MIB: u64 = 2048;

    /// First port tried for guest SSH forwarding.
    pub const DEFAULT_SSH_PORT: u16 = 2233;

    /// Number of consecutive ports probed before giving up.
    pub const PORT_SEARCH_LIMIT: u16 = 100;
}

/// Disk image sizing (logical sizes, allocated sparse)
pub mod disk {
    const GIB: u64 = 1024 * 1024 * 1024;

    /// Scratch disk size: 1 TiB
    pub const SCRATCH_DISK_SIZE_BYTES: u64 = 1024 * GIB;

    /// Primary data disk size: 100 GiB
    pub const DATA_DISK_SIZE_BYTES: u64 = 100 * GIB;
}
