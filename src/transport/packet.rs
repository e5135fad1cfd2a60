//! Over-the-air frame format.
//!
//! Byte 0 of every frame carries the packet type in its top two bits and a
//! 6-bit sequence number in the rest:
//!
//! ```text
//! DATA:     [00|seq] [payload 1-254]
//! FRAG:     [01|seq] [index] [total] [payload 1-252]
//! ACK:      [10|seq]
//! FRAG_ACK: [11|seq] [index]
//! ```
//!
//! The two type bits cover exactly four variants, so decoding can never
//! misclassify a frame; it can only reject one that is too short.

use crate::lora::LORA_MTU;
use std::fmt;

/// Mask for the packet type bits of byte 0.
pub const TYPE_MASK: u8 = 0xC0;

/// Mask for the sequence bits of byte 0.
pub const SEQ_MASK: u8 = 0x3F;

/// Header size of DATA and ACK frames.
pub const SINGLE_HEADER_SIZE: usize = 1;

/// Header size of FRAG frames (type/seq, index, total).
pub const FRAG_HEADER_SIZE: usize = 3;

/// Size of a FRAG_ACK frame.
pub const FRAG_ACK_SIZE: usize = 2;

/// Largest payload carried by a single DATA frame.
pub const MAX_SINGLE_PAYLOAD: usize = LORA_MTU - SINGLE_HEADER_SIZE;

/// Largest payload carried by one FRAG frame.
pub const MAX_FRAGMENT_PAYLOAD: usize = LORA_MTU - FRAG_HEADER_SIZE;

/// Packet type, as encoded in the top two bits of byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Data = 0x00,
    Frag = 0x40,
    Ack = 0x80,
    FragAck = 0xC0,
}

impl PacketType {
    /// Extract the type from a header byte.
    pub fn from_header(byte: u8) -> Self {
        match byte & TYPE_MASK {
            0x00 => Self::Data,
            0x40 => Self::Frag,
            0x80 => Self::Ack,
            _ => Self::FragAck,
        }
    }

    fn header(self, seq: Seq) -> u8 {
        self as u8 | seq.value()
    }
}

/// 6-bit message sequence number.
///
/// One value tags a whole message, all of its fragments included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Seq(u8);

impl Seq {
    /// Number of distinct sequence values.
    pub const MODULUS: u8 = SEQ_MASK + 1;

    /// Create a sequence number, keeping the low 6 bits.
    pub const fn new(value: u8) -> Self {
        Self(value & SEQ_MASK)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// The following sequence number, wrapping 63 -> 0.
    pub const fn next(self) -> Self {
        Self::new(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// A complete message in one frame.
    Data { seq: Seq, payload: Vec<u8> },
    /// One slice of a fragmented message.
    Frag {
        seq: Seq,
        index: u8,
        total: u8,
        payload: Vec<u8>,
    },
    /// Acknowledges a DATA frame.
    Ack { seq: Seq },
    /// Acknowledges one fragment.
    FragAck { seq: Seq, index: u8 },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Data { .. } => PacketType::Data,
            Self::Frag { .. } => PacketType::Frag,
            Self::Ack { .. } => PacketType::Ack,
            Self::FragAck { .. } => PacketType::FragAck,
        }
    }

    pub fn seq(&self) -> Seq {
        match self {
            Self::Data { seq, .. }
            | Self::Frag { seq, .. }
            | Self::Ack { seq }
            | Self::FragAck { seq, .. } => *seq,
        }
    }

    /// The acknowledgement a receiver returns for this frame, if any.
    pub fn ack(&self) -> Option<Packet> {
        match self {
            Self::Data { seq, .. } => Some(Self::Ack { seq: *seq }),
            Self::Frag { seq, index, .. } => Some(Self::FragAck {
                seq: *seq,
                index: *index,
            }),
            Self::Ack { .. } | Self::FragAck { .. } => None,
        }
    }

    /// Whether `self` is the acknowledgement for `sent`.
    ///
    /// The kind must match (ACK for DATA, FRAG_ACK for FRAG), the sequence
    /// must match, and a FRAG_ACK must name the fragment index that was sent.
    pub fn acknowledges(&self, sent: &Packet) -> bool {
        match (self, sent) {
            (Self::Ack { seq }, Self::Data { seq: sent_seq, .. }) => seq == sent_seq,
            (
                Self::FragAck { seq, index },
                Self::Frag {
                    seq: sent_seq,
                    index: sent_index,
                    ..
                },
            ) => seq == sent_seq && index == sent_index,
            _ => false,
        }
    }

    /// Serialize to the on-air format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = self.packet_type().header(self.seq());
        match self {
            Self::Data { payload, .. } => {
                let mut bytes = Vec::with_capacity(SINGLE_HEADER_SIZE + payload.len());
                bytes.push(header);
                bytes.extend_from_slice(payload);
                bytes
            }
            Self::Frag {
                index,
                total,
                payload,
                ..
            } => {
                let mut bytes = Vec::with_capacity(FRAG_HEADER_SIZE + payload.len());
                bytes.push(header);
                bytes.push(*index);
                bytes.push(*total);
                bytes.extend_from_slice(payload);
                bytes
            }
            Self::Ack { .. } => vec![header],
            Self::FragAck { index, .. } => vec![header, *index],
        }
    }

    /// Parse a received frame.
    ///
    /// A DATA frame with no payload is accepted (it is still acknowledged);
    /// a FRAG frame must carry at least one payload byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let (&header, rest) = bytes.split_first().ok_or(PacketError::Empty)?;
        let seq = Seq::new(header);

        match PacketType::from_header(header) {
            PacketType::Data => Ok(Self::Data {
                seq,
                payload: rest.to_vec(),
            }),
            PacketType::Frag => {
                if bytes.len() < FRAG_HEADER_SIZE + 1 {
                    return Err(PacketError::TooShort {
                        packet_type: PacketType::Frag,
                        len: bytes.len(),
                    });
                }
                Ok(Self::Frag {
                    seq,
                    index: bytes[1],
                    total: bytes[2],
                    payload: bytes[FRAG_HEADER_SIZE..].to_vec(),
                })
            }
            PacketType::Ack => Ok(Self::Ack { seq }),
            PacketType::FragAck => {
                let index = *rest.first().ok_or(PacketError::TooShort {
                    packet_type: PacketType::FragAck,
                    len: bytes.len(),
                })?;
                Ok(Self::FragAck { seq, index })
            }
        }
    }
}

/// Errors from decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Zero-length frame.
    Empty,
    /// Frame shorter than its type requires.
    TooShort { packet_type: PacketType, len: usize },
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty frame"),
            Self::TooShort { packet_type, len } => {
                write!(f, "{:?} frame too short: {} bytes", packet_type, len)
            }
        }
    }
}

impl std::error::Error for PacketError {}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Seq Tests ====================

    #[test]
    fn test_seq_masks_to_six_bits() {
        assert_eq!(Seq::new(5).value(), 5);
        assert_eq!(Seq::new(64).value(), 0);
        assert_eq!(Seq::new(0xFF).value(), 63);
    }

    #[test]
    fn test_seq_wraps() {
        assert_eq!(Seq::new(62).next(), Seq::new(63));
        assert_eq!(Seq::new(63).next(), Seq::new(0));
    }

    // ==================== Encode Tests ====================

    #[test]
    fn test_encode_header_bytes() {
        let seq = Seq::new(5);
        assert_eq!(
            Packet::Data {
                seq,
                payload: vec![0xAA]
            }
            .to_bytes(),
            vec![0x05, 0xAA]
        );
        assert_eq!(
            Packet::Frag {
                seq,
                index: 1,
                total: 3,
                payload: vec![0xBB]
            }
            .to_bytes(),
            vec![0x45, 1, 3, 0xBB]
        );
        assert_eq!(Packet::Ack { seq }.to_bytes(), vec![0x85]);
        assert_eq!(Packet::FragAck { seq, index: 2 }.to_bytes(), vec![0xC5, 2]);
    }

    #[test]
    fn test_max_payload_sizes() {
        assert_eq!(MAX_SINGLE_PAYLOAD, 254);
        assert_eq!(MAX_FRAGMENT_PAYLOAD, 252);
    }

    // ==================== Decode Tests ====================

    #[test]
    fn test_data_roundtrip_at_length_limits() {
        for len in [1usize, 100, MAX_SINGLE_PAYLOAD] {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let packet = Packet::Data {
                seq: Seq::new(63),
                payload,
            };
            let bytes = packet.to_bytes();
            assert!(bytes.len() <= LORA_MTU);
            assert_eq!(Packet::from_bytes(&bytes).unwrap(), packet);
        }
    }

    #[test]
    fn test_decode_type_from_top_bits() {
        for byte in 0..=u8::MAX {
            let expected = match byte >> 6 {
                0 => PacketType::Data,
                1 => PacketType::Frag,
                2 => PacketType::Ack,
                _ => PacketType::FragAck,
            };
            assert_eq!(PacketType::from_header(byte), expected);
        }
    }

    #[test]
    fn test_decode_empty_data_payload() {
        assert_eq!(
            Packet::from_bytes(&[0x07]).unwrap(),
            Packet::Data {
                seq: Seq::new(7),
                payload: vec![]
            }
        );
    }

    #[test]
    fn test_decode_rejects_short_frames() {
        assert_eq!(Packet::from_bytes(&[]), Err(PacketError::Empty));
        assert!(matches!(
            Packet::from_bytes(&[0x41, 0, 2]),
            Err(PacketError::TooShort {
                packet_type: PacketType::Frag,
                ..
            })
        ));
        assert!(matches!(
            Packet::from_bytes(&[0xC1]),
            Err(PacketError::TooShort {
                packet_type: PacketType::FragAck,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_ignores_trailing_ack_bytes() {
        assert_eq!(
            Packet::from_bytes(&[0x83, 0xFF]).unwrap(),
            Packet::Ack { seq: Seq::new(3) }
        );
    }

    // ==================== Ack Matching Tests ====================

    #[test]
    fn test_ack_for_data_and_frag() {
        let data = Packet::Data {
            seq: Seq::new(9),
            payload: vec![1],
        };
        assert_eq!(data.ack(), Some(Packet::Ack { seq: Seq::new(9) }));

        let frag = Packet::Frag {
            seq: Seq::new(9),
            index: 4,
            total: 5,
            payload: vec![1],
        };
        assert_eq!(
            frag.ack(),
            Some(Packet::FragAck {
                seq: Seq::new(9),
                index: 4
            })
        );
        assert_eq!(Packet::Ack { seq: Seq::new(9) }.ack(), None);
    }

    #[test]
    fn test_acknowledges_requires_kind_seq_and_index() {
        let seq = Seq::new(12);
        let data = Packet::Data {
            seq,
            payload: vec![1],
        };
        let frag = Packet::Frag {
            seq,
            index: 1,
            total: 2,
            payload: vec![1],
        };

        assert!(Packet::Ack { seq }.acknowledges(&data));
        assert!(!Packet::Ack { seq: seq.next() }.acknowledges(&data));
        assert!(!Packet::FragAck { seq, index: 0 }.acknowledges(&data));

        assert!(Packet::FragAck { seq, index: 1 }.acknowledges(&frag));
        assert!(!Packet::FragAck { seq, index: 0 }.acknowledges(&frag));
        assert!(!Packet::FragAck {
            seq: seq.next(),
            index: 1
        }
        .acknowledges(&frag));
        assert!(!Packet::Ack { seq }.acknowledges(&frag));
    }
}
