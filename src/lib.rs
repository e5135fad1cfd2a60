//! Reliable message transport over a half-duplex LoRa link.
//!
//! Two serial-attached hosts exchange messages of up to 5040 bytes over a
//! 255-byte-MTU radio. The library holds the platform-independent parts so
//! they can be tested on the host machine without radio hardware:
//!
//! - [`transport`]: frame format, fragmentation, reassembly and acknowledged
//!   delivery ([`LinkEngine`])
//! - [`host`]: JSON-lines command interface ([`HostAdapter`])
//! - [`lora`]: the [`Radio`] boundary plus simulated and UDP backends
//! - [`config`], [`stats`], [`stats_server`]: tuning, counters and monitoring

pub mod config;
pub mod host;
pub mod lora;
pub mod stats;
pub mod stats_server;
pub mod transport;

// Re-export commonly used items
pub use config::{ConfigError, LinkConfig};
pub use host::{HostAdapter, HostError};
pub use lora::{LinkQuality, Radio, RadioError, RadioSettings, ReceivedPacket};
pub use stats::{LinkStats, StatsSnapshot};
pub use transport::{Delivery, LinkEngine, Packet, SendError, SendReport, Seq};
