//! LoRa radio support.
//!
//! This module contains:
//! - [`config`]: Region and modulation settings of the deployed link
//! - [`airtime`]: Time-on-air calculation for LoRa frames
//! - [`radio`]: The [`Radio`] boundary the transport drives
//! - [`sim`]: In-memory radio pair for host testing
//! - [`udp`]: UDP datagram backend for host-to-host links

mod airtime;
mod config;
mod radio;
pub mod sim;
pub mod udp;

pub use airtime::{calculate_airtime_ms, calculate_airtime_us, exchange_airtime, LoRaParams};
pub use config::{
    RadioSettings, Region, BANDWIDTH_HZ, CODING_RATE, LORA_MTU, PREAMBLE_LENGTH,
    SPREADING_FACTOR, TX_POWER,
};
pub use radio::{check_frame, LinkQuality, Radio, RadioError, ReceivedPacket};
pub use sim::SimRadio;
pub use udp::UdpRadio;
