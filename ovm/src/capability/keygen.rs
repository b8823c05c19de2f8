//! SSH key generation via `ssh-keygen`.

use super::KeyGenerator;
use async_trait::async_trait;
use ovm_shared::errors::{OvmError, OvmResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Runs `ssh-keygen` to produce an unencrypted keypair.
#[derive(Debug, Clone)]
pub struct SshKeygen {
    program: PathBuf,
    key_type: String,
}

impl SshKeygen {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ssh-keygen"),
            key_type: "ed25519".to_string(),
        }
    }

    /// Use a specific `ssh-keygen` binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for SshKeygen {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyGenerator for SshKeygen {
    async fn generate(&self, dir: &Path, base_name: &str) -> OvmResult<()> {
        let key_path = dir.join(base_name);

        tracing::info!(
            key_path = %key_path.display(),
            key_type = %self.key_type,
            "Generating SSH keypair"
        );

        let output = Command::new(&self.program)
            .arg("-t")
            .arg(&self.key_type)
            .arg("-N")
            .arg("")
            .arg("-C")
            .arg(base_name)
            .arg("-f")
            .arg(&key_path)
            .arg("-q")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                OvmError::Credential(format!(
                    "Failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(OvmError::Credential(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ssh_keygen_available() -> bool {
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join("ssh-keygen").is_file()))
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_missing_program_is_credential_error() {
        let temp_dir = TempDir::new().unwrap();
        let keygen = SshKeygen::new().with_program("/nonexistent/ssh-keygen");

        let err = keygen.generate(temp_dir.path(), "ovm").await.unwrap_err();
        assert!(matches!(err, OvmError::Credential(_)));
    }

    #[tokio::test]
    async fn test_generates_pair() {
        if !ssh_keygen_available() {
            return;
        }

        let temp_dir = TempDir::new().unwrap();
        SshKeygen::new()
            .generate(temp_dir.path(), "ovm")
            .await
            .unwrap();

        assert!(temp_dir.path().join("ovm").is_file());
        let public = std::fs::read_to_string(temp_dir.path().join("ovm.pub")).unwrap();
        assert!(public.starts_with("ssh-ed25519 "));
    }
}
