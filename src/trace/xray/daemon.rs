//! Emission of segment documents to the local X-Ray daemon.

use std::fmt;
use std::net::{ToSocketAddrs, UdpSocket};

use crate::error::{TraceError, TraceResult};
use crate::trace::xray::segment::SegmentDocument;

/// Framing header preceding every daemon datagram.
pub(crate) const DAEMON_HEADER: &str = "{\"format\": \"json\", \"version\": 1}\n";

/// Sink for closed segment documents.
pub(crate) trait SegmentEmitter: Send + Sync + fmt::Debug {
    fn emit(&self, segment: &SegmentDocument) -> TraceResult<()>;
}

/// Sends segment documents to the X-Ray daemon over UDP.
pub(crate) struct DaemonEmitter {
    socket: UdpSocket,
    address: std::net::SocketAddr,
}

impl fmt::Debug for DaemonEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonEmitter")
            .field("address", &self.address)
            .finish()
    }
}

impl DaemonEmitter {
    /// Resolve the daemon address and bind the sending socket.
    pub(crate) fn connect(address: &str) -> TraceResult<Self> {
        let address = address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TraceError::Internal(format!("daemon address {address} resolved to nothing")))?;
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(DaemonEmitter { socket, address })
    }
}

impl SegmentEmitter for DaemonEmitter {
    fn emit(&self, segment: &SegmentDocument) -> TraceResult<()> {
        let body = serde_json::to_string(segment)?;
        let mut datagram = Vec::with_capacity(DAEMON_HEADER.len() + body.len());
        datagram.extend_from_slice(DAEMON_HEADER.as_bytes());
        datagram.extend_from_slice(body.as_bytes());
        self.socket.send_to(&datagram, self.address)?;
        Ok(())
    }
}
