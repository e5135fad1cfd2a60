//! Radio boundary.
//!
//! The SX1262 driver (SPI, modulation setup, IRQ handling) lives outside this
//! crate. The transport only needs to push a frame onto the air and to poll
//! for a received frame with a bounded wait, which is what [`Radio`] captures.
//!
//! Implementations must leave the radio listening after every transmission:
//! the engine is the only holder of the channel and assumes a frame arriving
//! right after its own TX is not lost to a radio still parked in standby.

use super::config::LORA_MTU;
use std::fmt;
use std::io;
use std::time::Duration;

/// A half-duplex packet radio.
pub trait Radio {
    /// Transmit one frame and return to receive mode.
    fn transmit(&mut self, data: &[u8]) -> Result<(), RadioError>;

    /// Wait up to `timeout` for one frame.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    fn receive(&mut self, timeout: Duration) -> Result<Option<ReceivedPacket>, RadioError>;
}

impl<R: Radio + ?Sized> Radio for Box<R> {
    fn transmit(&mut self, data: &[u8]) -> Result<(), RadioError> {
        (**self).transmit(data)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<ReceivedPacket>, RadioError> {
        (**self).receive(timeout)
    }
}

/// A received LoRa frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPacket {
    /// Raw frame bytes.
    pub data: Vec<u8>,
    /// RSSI in dBm.
    pub rssi: i16,
    /// SNR in dB.
    pub snr: i8,
}

impl ReceivedPacket {
    pub fn new(data: Vec<u8>, rssi: i16, snr: i8) -> Self {
        Self { data, rssi, snr }
    }

    /// Signal quality this frame arrived with.
    pub fn quality(&self) -> LinkQuality {
        LinkQuality {
            rssi: self.rssi,
            snr: self.snr,
        }
    }
}

/// RSSI/SNR captured when a frame was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkQuality {
    /// RSSI in dBm.
    pub rssi: i16,
    /// SNR in dB.
    pub snr: i8,
}

/// Check a frame against the radio limits before it goes on the air.
pub fn check_frame(data: &[u8]) -> Result<(), RadioError> {
    if data.is_empty() {
        return Err(RadioError::EmptyPacket);
    }
    if data.len() > LORA_MTU {
        return Err(RadioError::PacketTooLarge {
            size: data.len(),
            max: LORA_MTU,
        });
    }
    Ok(())
}

/// Radio errors.
#[derive(Debug)]
pub enum RadioError {
    /// Backend I/O error.
    Io(io::Error),
    /// The other end of the link is gone.
    Disconnected,
    /// Radio did not complete the operation in time.
    Timeout,
    /// Packet too large.
    PacketTooLarge { size: usize, max: usize },
    /// Empty packet.
    EmptyPacket,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "radio I/O error: {}", e),
            Self::Disconnected => write!(f, "radio link disconnected"),
            Self::Timeout => write!(f, "radio timeout"),
            Self::PacketTooLarge { size, max } => {
                write!(f, "packet too large: {} bytes (max {})", size, max)
            }
            Self::EmptyPacket => write!(f, "empty packet"),
        }
    }
}

impl std::error::Error for RadioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RadioError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
