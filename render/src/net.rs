//! Networking collaborator interface.
//!
//! Reliable-datagram sockets are provided by an external implementation;
//! the engine defines only the facade it consumes. Connect, disconnect and
//! receive block up to the caller-supplied timeout and report expiry as
//! [`Error::TimeOut`](crate::error::Error::TimeOut).

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::Result;

/// Reliable datagram socket facade.
pub trait Socket: fmt::Debug {
    fn connect(&mut self, addr: SocketAddr, timeout: Duration) -> Result<()>;
    fn disconnect(&mut self, timeout: Duration) -> Result<()>;

    /// Queues a datagram for reliable delivery.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Blocks until a datagram arrives or `timeout` expires; returns the
    /// payload length written into `buf`.
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}
