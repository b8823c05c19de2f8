//! Types shared between the ovm host crates.

pub mod errors;
mod transport;

pub use errors::{OvmError, OvmResult};
pub use transport::Transport;
