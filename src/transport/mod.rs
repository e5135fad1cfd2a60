//! Reliable message transport over a LoRa link.
//!
//! This module contains:
//! - [`packet`]: On-air frame format (DATA, FRAG, ACK, FRAG_ACK)
//! - [`fragment`]: Splitting large messages and rebuilding them
//! - [`engine`]: Acknowledged delivery with retries, and the receive path

pub mod engine;
pub mod fragment;
pub mod packet;

pub use engine::{Delivery, LinkEngine, SendError, SendReport};
pub use fragment::{
    FragmentError, FragmentOutcome, Fragmenter, Reassembled, Reassembler, RejectReason,
    MAX_FRAGMENTS, MAX_MESSAGE_SIZE,
};
pub use packet::{
    Packet, PacketError, PacketType, Seq, FRAG_ACK_SIZE, FRAG_HEADER_SIZE, MAX_FRAGMENT_PAYLOAD,
    MAX_SINGLE_PAYLOAD, SINGLE_HEADER_SIZE,
};
