//! UDP transport for OSC messages to and from scsynth.
//!
//! Grounded on the teacher's `vibelang-core/src/osc.rs::OscClient`:
//! same bind-ephemeral-port-then-send/recv shape over `rosc`. The
//! teacher's blocking/non-blocking `recv_msg`/`try_recv_msg` split is
//! folded into [`OscClient::try_recv`] here since `scsession`'s reply
//! pump (`reply.rs`) always polls non-blocking from its own thread.

use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use rosc::{OscMessage, OscPacket, OscType};

use crate::errors::{Result, SessionError};

/// A UDP socket bound to talk to one scsynth instance.
#[derive(Clone)]
pub struct OscClient {
    sock: Arc<UdpSocket>,
    peer: String,
}

impl OscClient {
    /// Bind an ephemeral local UDP socket and target it at `peer`
    /// (`"127.0.0.1:57110"`-style address).
    pub fn connect(peer: impl Into<String>) -> Result<OscClient> {
        let sock = UdpSocket::bind("127.0.0.1:0")?;
        sock.set_nonblocking(true)?;
        Ok(OscClient { sock: Arc::new(sock), peer: peer.into() })
    }

    pub fn send(&self, address: &str, args: Vec<OscType>) -> Result<()> {
        let packet = OscPacket::Message(OscMessage { addr: address.to_string(), args });
        let bytes = rosc::encoder::encode(&packet).map_err(|e| SessionError::Osc(format!("{e:?}")))?;
        self.sock.send_to(&bytes, &self.peer)?;
        Ok(())
    }

    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        self.sock.send_to(bytes, &self.peer)?;
        Ok(())
    }

    /// Non-blocking receive; `Ok(None)` if nothing is queued yet.
    pub fn try_recv(&self) -> Result<Option<OscMessage>> {
        let mut buf = [0u8; 65536];
        match self.sock.recv(&mut buf) {
            Ok(size) => {
                let (_, packet) =
                    rosc::decoder::decode_udp(&buf[..size]).map_err(|e| SessionError::Osc(format!("{e:?}")))?;
                Ok(first_message(packet))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    /// Block up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<OscMessage>> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(msg) = self.try_recv()? {
                return Ok(Some(msg));
            }
            if std::time::Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

fn first_message(packet: OscPacket) -> Option<OscMessage> {
    match packet {
        OscPacket::Message(m) => Some(m),
        OscPacket::Bundle(b) => b.content.into_iter().find_map(first_message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_binds_a_local_socket() {
        let client = OscClient::connect("127.0.0.1:57110").unwrap();
        assert!(client.try_recv().unwrap().is_none());
    }

    #[test]
    fn send_to_unbound_peer_does_not_error() {
        // UDP "send" succeeds even with nothing listening; only later
        // receives reveal whether the peer replied.
        let client = OscClient::connect("127.0.0.1:1").unwrap();
        let result = client.send("/status", vec![]);
        assert!(result.is_ok());
    }
}
