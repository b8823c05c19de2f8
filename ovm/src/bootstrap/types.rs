//! Type definitions for the bootstrap pipeline.

use crate::capability::Capabilities;
use crate::options::BootstrapOptions;
use crate::paths::{SocketPaths, SshKeyPaths, TargetLayout};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared bootstrap pipeline context.
///
/// Inputs are read-only. Each task owns exactly one output slot; tasks of
/// the same phase never read each other's slots.
pub struct BootstrapPipelineContext {
    pub options: Arc<BootstrapOptions>,
    pub capabilities: Capabilities,

    // PreSetup outputs
    pub basic_output: Option<BasicOutput>,
    pub log_output: Option<PathBuf>,

    // Setup outputs
    pub socket_output: Option<SocketPaths>,
    pub ssh_output: Option<SshKeyMaterial>,
    pub ssh_port_output: Option<u16>,
    pub target_output: Option<TargetLayout>,
}

impl BootstrapPipelineContext {
    pub fn new(options: Arc<BootstrapOptions>, capabilities: Capabilities) -> Self {
        Self {
            options,
            capabilities,
            basic_output: None,
            log_output: None,
            socket_output: None,
            ssh_output: None,
            ssh_port_output: None,
            target_output: None,
        }
    }
}

// ============================================================================
// TASK OUTPUT TYPES
// ============================================================================

/// Output from the basic task: identity, sizing and the lock file.
#[derive(Debug, Clone)]
pub struct BasicOutput {
    pub name: String,
    pub cpus: u32,
    pub memory_bytes: u64,
    pub cli_mode: bool,
    pub bind_pid: Option<u32>,
    pub event_socket_path: Option<PathBuf>,
    pub power_save_mode: bool,
    pub kernel_debug: bool,
    pub executable_path: PathBuf,
    pub lock_file: PathBuf,
}

/// Output from the SSH key task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyMaterial {
    pub paths: SshKeyPaths,
    pub public_key: String,
}
