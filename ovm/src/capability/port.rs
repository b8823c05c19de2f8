//! Free TCP port discovery.

use super::PortProber;
use crate::constants::vm_defaults;
use async_trait::async_trait;
use ovm_shared::errors::{OvmError, OvmResult};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

/// Probes ports by binding them, scanning upward from the preferred port.
///
/// The probe listener is closed immediately, so another process may still
/// grab the port before it is used.
#[derive(Debug, Clone)]
pub struct TcpPortProber {
    host: IpAddr,
    max_attempts: u16,
}

impl TcpPortProber {
    pub fn new(host: IpAddr, max_attempts: u16) -> Self {
        Self {
            host,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for TcpPortProber {
    fn default() -> Self {
        Self::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            vm_defaults::PORT_SEARCH_LIMIT,
        )
    }
}

#[async_trait]
impl PortProber for TcpPortProber {
    async fn find_usable_port(&self, preferred: u16) -> OvmResult<u16> {
        if preferred == 0 {
            return Err(OvmError::Config(
                "preferred port must be non-zero".into(),
            ));
        }

        let last = preferred.saturating_add(self.max_attempts - 1);
        for port in preferred..=last {
            match TcpListener::bind(SocketAddr::new(self.host, port)).await {
                Ok(listener) => {
                    drop(listener);
                    if port != preferred {
                        tracing::debug!(preferred, port, "Preferred port busy, using next free one");
                    }
                    return Ok(port);
                }
                Err(e) => {
                    tracing::trace!(port, error = %e, "Port unavailable");
                }
            }
        }

        Err(OvmError::ResourceExhausted(format!(
            "no usable port on {} in range {}..={}",
            self.host, preferred, last
        )))
    }
}
