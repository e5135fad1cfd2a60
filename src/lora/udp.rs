//! UDP datagram radio backend.
//!
//! Stands in for the air interface when two endpoints run on ordinary hosts:
//! each transmitted frame becomes one datagram to the peer address. There is
//! no RSSI or SNR on a socket, so received frames report fixed values.

use super::config::LORA_MTU;
use super::radio::{check_frame, Radio, RadioError, ReceivedPacket};
use log::{debug, info, warn};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Smallest read timeout accepted by the socket (zero means "block forever").
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// RSSI reported for datagram frames (dBm).
pub const UDP_RSSI: i16 = 0;

/// SNR reported for datagram frames (dB).
pub const UDP_SNR: i8 = 0;

/// Radio backed by a UDP socket talking to exactly one peer.
pub struct UdpRadio {
    socket: UdpSocket,
    peer: SocketAddr,
    buf: [u8; LORA_MTU + 1],
}

impl UdpRadio {
    /// Bind `local` and send frames to `peer`.
    pub fn bind(local: impl ToSocketAddrs, peer: impl ToSocketAddrs) -> Result<Self, RadioError> {
        let socket = UdpSocket::bind(local)?;
        let peer = peer.to_socket_addrs()?.next().ok_or_else(|| {
            RadioError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "peer address resolved to nothing",
            ))
        })?;

        info!(
            "UDP radio bound to {} (peer {})",
            socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            peer
        );

        Ok(Self {
            socket,
            peer,
            buf: [0u8; LORA_MTU + 1],
        })
    }

    /// Local socket address.
    pub fn local_addr(&self) -> Result<SocketAddr, RadioError> {
        Ok(self.socket.local_addr()?)
    }
}

impl Radio for UdpRadio {
    fn transmit(&mut self, data: &[u8]) -> Result<(), RadioError> {
        check_frame(data)?;
        self.socket.send_to(data, self.peer)?;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<ReceivedPacket>, RadioError> {
        self.socket
            .set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

        match self.socket.recv_from(&mut self.buf) {
            Ok((len, from)) => {
                if from != self.peer {
                    debug!("udp: ignoring {} bytes from stranger {}", len, from);
                    return Ok(None);
                }
                if len == 0 || len > LORA_MTU {
                    warn!("udp: discarding {}-byte datagram", len);
                    return Ok(None);
                }
                Ok(Some(ReceivedPacket::new(
                    self.buf[..len].to_vec(),
                    UDP_RSSI,
                    UDP_SNR,
                )))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(RadioError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_pair_exchanges_frames() {
        let probe_a = UdpSocket::bind("127.0.0.1:0").unwrap();
        let probe_b = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr_a = probe_a.local_addr().unwrap();
        let addr_b = probe_b.local_addr().unwrap();
        drop(probe_a);
        drop(probe_b);

        let mut a = UdpRadio::bind(addr_a, addr_b).unwrap();
        let mut b = UdpRadio::bind(addr_b, addr_a).unwrap();

        a.transmit(&[0x00, b'h', b'i']).unwrap();
        let frame = b.receive(Duration::from_millis(500)).unwrap().unwrap();
        assert_eq!(frame.data, vec![0x00, b'h', b'i']);
        assert_eq!(frame.rssi, UDP_RSSI);
    }

    #[test]
    fn test_udp_receive_times_out() {
        let mut radio = UdpRadio::bind("127.0.0.1:0", "127.0.0.1:9").unwrap();
        assert!(radio.receive(Duration::from_millis(5)).unwrap().is_none());
    }

    #[test]
    fn test_udp_rejects_oversized_frame() {
        let mut radio = UdpRadio::bind("127.0.0.1:0", "127.0.0.1:9").unwrap();
        assert!(matches!(
            radio.transmit(&[0u8; LORA_MTU + 1]),
            Err(RadioError::PacketTooLarge { .. })
        ));
    }
}
