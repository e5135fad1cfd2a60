//! Host-facing line protocol.
//!
//! This module contains:
//! - [`protocol`]: Request, reply and event messages (JSON lines)
//! - [`line`]: Splitting the host byte stream into lines
//! - [`adapter`]: [`HostAdapter`], which drives a link engine from host requests

pub mod adapter;
pub mod line;
pub mod protocol;

pub use adapter::HostAdapter;
pub use line::{LineBuffer, LineEvent, MAX_LINE_LEN};
pub use protocol::{
    decode_payload, parse_command, Command, HostError, FIRMWARE_NAME, FIRMWARE_VERSION,
};
