//! Connected-UDP transport: bind locally, remember the remote peer, and
//! expose `send_raw`/`recv_raw` with the retry and timeout semantics the
//! protocol loop depends on.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::{Error, Result};

/// Largest legal frame this protocol ever sends or receives: the
/// login(12)/digest(76)/config(302) exchange dwarfs the 53-byte data frame,
/// so the receive buffer is sized generously above that to avoid truncation.
pub const MAX_FRAME_BYTES: usize = 512;

/// A bound UDP socket with a fixed remote peer. `send_raw`/`recv_raw` are
/// the only two operations the rest of the crate needs from a transport.
pub struct Transport {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl Transport {
    /// Bind on `local`, connect to `remote`, and remember it as the peer
    /// every send targets. Connecting (rather than plain bind) lets `recv`
    /// filter to datagrams actually from that peer.
    pub fn bind<A: ToSocketAddrs>(local: A, remote: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local)?;
        socket.connect(remote)?;
        Ok(Transport { socket, remote })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Send the exact byte string to the remote peer. The protocol has no
    /// fragmentation, so a short write is treated as an I/O error.
    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        let sent = self.socket.send(bytes)?;
        if sent != bytes.len() {
            return Err(Error::TransportIo(std::io::Error::new(
                ErrorKind::WriteZero,
                format!("short write: sent {sent} of {} bytes", bytes.len()),
            )));
        }
        Ok(())
    }

    /// Read one datagram, retrying on EINTR/EAGAIN. A platform timeout
    /// (WouldBlock/TimedOut after `set_read_timeout`) surfaces as
    /// [`Error::Timeout`].
    pub fn recv_raw(&self, timeout: Duration) -> Result<Vec<u8>> {
        self.socket.set_read_timeout(Some(timeout))?;
        let mut buf = [0u8; MAX_FRAME_BYTES];
        loop {
            match self.socket.recv(&mut buf) {
                Ok(len) => return Ok(buf[..len].to_vec()),
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    return Err(Error::Timeout)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::TransportIo(e)),
            }
        }
    }
}
