//! UDP implementation of the engine-peer channel.

use fsmrt_core::{Channel, Packet};
use fsmrt_protocol::MAX_DATAGRAM;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

/// Datagram channel with a fixed local bind and a fixed peer endpoint.
///
/// The socket is non-blocking; `send` and `poll` never wait. Datagrams
/// larger than [`MAX_DATAGRAM`] are truncated on receive.
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpChannel {
    /// Opens the socket. The socket closes when the channel is dropped.
    pub fn bind(bind_addr: SocketAddr, peer: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, peer })
    }

    /// The locally bound address (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Channel for UdpChannel {
    fn send(&self, pkt: &Packet) -> bool {
        match self.socket.send_to(pkt.json.as_bytes(), self.peer) {
            Ok(sent) => sent == pkt.json.len(),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                // Best-effort transport; a full send buffer just drops the
                // datagram.
                tracing::trace!("udp send would block, dropping datagram");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, peer = %self.peer, "udp send failed");
                false
            }
        }
    }

    fn poll(&self, pkt: &mut Packet) -> bool {
        let mut buf = [0u8; MAX_DATAGRAM];
        match self.socket.recv_from(&mut buf) {
            Ok((len, _)) => match std::str::from_utf8(&buf[..len]) {
                Ok(text) => {
                    pkt.json.clear();
                    pkt.json.push_str(text);
                    true
                }
                Err(_) => {
                    tracing::trace!("dropping non-UTF-8 datagram");
                    false
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => false,
            Err(e) => {
                tracing::trace!(error = %e, "udp recv failed");
                false
            }
        }
    }
}
