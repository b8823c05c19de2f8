use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Endpoint the VM supervisor is reached through.
///
/// Only Unix domain sockets are represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Transport {
    Unix { socket_path: PathBuf },
}

impl Transport {
    pub fn unix(socket_path: impl Into<PathBuf>) -> Self {
        Self::Unix {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        match self {
            Self::Unix { socket_path } => socket_path,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { socket_path } => write!(f, "unix://{}", socket_path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_endpoint_format() {
        let t = Transport::unix("/tmp/sockets/ovm-vfkit-network.sock");
        assert_eq!(t.to_string(), "unix:///tmp/sockets/ovm-vfkit-network.sock");
        assert_eq!(
            t.socket_path(),
            Path::new("/tmp/sockets/ovm-vfkit-network.sock")
        );
    }

    #[test]
    fn test_serde_shape() {
        let t = Transport::unix("/run/a.sock");
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"kind":"unix","socket_path":"/run/a.sock"}"#);
        let back: Transport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
