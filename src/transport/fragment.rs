//! Message fragmentation and reassembly.
//!
//! A LoRa frame holds at most 255 bytes, while host messages can be up to
//! [`MAX_MESSAGE_SIZE`] bytes. Messages that fit one DATA frame are sent
//! as-is; larger ones are cut into indexed FRAG frames sharing the message's
//! sequence number.
//!
//! # Single reassembly slot
//!
//! The [`Reassembler`] holds at most one partial message. A fragment carrying
//! a different sequence number replaces the partial message without notice,
//! and a partial message that sees no new fragment for the reassembly timeout
//! is dropped. Neither loss is reported to the sender.
//!
//! # Example
//!
//! ```
//! use linkmaster_lora::lora::LinkQuality;
//! use linkmaster_lora::transport::{FragmentOutcome, Fragmenter, Packet, Reassembler, Seq};
//! use std::time::{Duration, Instant};
//!
//! let fragmenter = Fragmenter::new(20);
//! let message = vec![7u8; 600];
//! let packets = fragmenter.fragment(Seq::new(3), &message).unwrap();
//! assert_eq!(packets.len(), 3);
//!
//! let mut reassembler = Reassembler::new(Duration::from_secs(30), 20);
//! let mut result = None;
//! for packet in packets {
//!     if let Packet::Frag { seq, index, total, payload } = packet {
//!         let outcome = reassembler.accept(
//!             seq, index, total, &payload, LinkQuality::default(), Instant::now());
//!         if let FragmentOutcome::Complete(done) = outcome {
//!             result = Some(done.payload);
//!         }
//!     }
//! }
//! assert_eq!(result, Some(message));
//! ```

use super::packet::{Packet, Seq, MAX_FRAGMENT_PAYLOAD, MAX_SINGLE_PAYLOAD};
use crate::lora::LinkQuality;
use log::{debug, warn};
use std::fmt;
use std::time::{Duration, Instant};

/// Default maximum fragments per message.
pub const MAX_FRAGMENTS: u8 = 20;

/// Largest message the link carries with the default fragment limit.
pub const MAX_MESSAGE_SIZE: usize = MAX_FRAGMENTS as usize * MAX_FRAGMENT_PAYLOAD;

/// Errors from planning an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    /// Nothing to send.
    EmptyMessage,
    /// The message needs more fragments than allowed.
    TooManyFragments { needed: usize, max: u8 },
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "cannot send empty message"),
            Self::TooManyFragments { needed, max } => {
                write!(f, "message needs {} fragments (max {})", needed, max)
            }
        }
    }
}

impl std::error::Error for FragmentError {}

/// Splits outbound messages into frames.
#[derive(Debug, Clone, Copy)]
pub struct Fragmenter {
    max_fragments: u8,
}

impl Fragmenter {
    pub fn new(max_fragments: u8) -> Self {
        Self { max_fragments }
    }

    /// Largest message this fragmenter accepts.
    pub fn max_message_size(&self) -> usize {
        self.max_fragments as usize * MAX_FRAGMENT_PAYLOAD
    }

    /// Check if a message needs more than one DATA frame.
    pub fn needs_fragmentation(&self, len: usize) -> bool {
        len > MAX_SINGLE_PAYLOAD
    }

    /// Number of frames a message of `len` bytes is sent as.
    pub fn frame_count(&self, len: usize) -> usize {
        if self.needs_fragmentation(len) {
            len.div_ceil(MAX_FRAGMENT_PAYLOAD)
        } else {
            1
        }
    }

    /// Plan the frames for one message.
    ///
    /// Returns a single DATA packet, or FRAG packets in index order. An
    /// oversize message fails here, before anything reaches the radio.
    pub fn fragment(&self, seq: Seq, message: &[u8]) -> Result<Vec<Packet>, FragmentError> {
        if message.is_empty() {
            return Err(FragmentError::EmptyMessage);
        }

        if !self.needs_fragmentation(message.len()) {
            return Ok(vec![Packet::Data {
                seq,
                payload: message.to_vec(),
            }]);
        }

        let needed = self.frame_count(message.len());
        if needed > self.max_fragments as usize {
            return Err(FragmentError::TooManyFragments {
                needed,
                max: self.max_fragments,
            });
        }

        // needed <= max_fragments <= u8::MAX
        let total = needed as u8;
        Ok(message
            .chunks(MAX_FRAGMENT_PAYLOAD)
            .enumerate()
            .map(|(index, chunk)| Packet::Frag {
                seq,
                index: index as u8,
                total,
                payload: chunk.to_vec(),
            })
            .collect())
    }
}

/// A fully reassembled inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub seq: Seq,
    pub payload: Vec<u8>,
    /// Link quality of the last fragment received.
    pub quality: LinkQuality,
}

/// Why a fragment was not taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `total` is zero or above the fragment limit.
    InvalidTotal,
    /// `index` is not below `total`.
    IndexOutOfRange,
    /// Payload longer than a fragment can be.
    Oversized,
    /// `total` differs from the one recorded for this sequence.
    TotalMismatch { expected: u8 },
}

/// Result of offering a fragment to the reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// Stored; more fragments are needed.
    Stored { received: usize, total: u8 },
    /// This index was already stored.
    Duplicate,
    /// Last missing fragment; the message is complete.
    Complete(Reassembled),
    /// Ignored.
    Rejected(RejectReason),
}

/// The one partial inbound message.
#[derive(Debug)]
struct ReassemblyContext {
    seq: Seq,
    total: u8,
    /// Per-index payloads; `Some` marks the index as received.
    fragments: Vec<Option<Vec<u8>>>,
    received: usize,
    last_fragment_at: Instant,
    quality: LinkQuality,
}

impl ReassemblyContext {
    fn new(seq: Seq, total: u8, now: Instant) -> Self {
        Self {
            seq,
            total,
            fragments: vec![None; total as usize],
            received: 0,
            last_fragment_at: now,
            quality: LinkQuality::default(),
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.total as usize
    }

    /// Concatenate the fragments in index order, each at its own length.
    fn assemble(self) -> Reassembled {
        let payload = self.fragments.into_iter().flatten().flatten().collect();
        Reassembled {
            seq: self.seq,
            payload,
            quality: self.quality,
        }
    }
}

/// Rebuilds fragmented inbound messages.
#[derive(Debug)]
pub struct Reassembler {
    timeout: Duration,
    max_fragments: u8,
    context: Option<ReassemblyContext>,
}

impl Reassembler {
    /// Create a reassembler that drops partial messages idle for `timeout`.
    pub fn new(timeout: Duration, max_fragments: u8) -> Self {
        Self {
            timeout,
            max_fragments,
            context: None,
        }
    }

    /// Offer one fragment received at `now`.
    pub fn accept(
        &mut self,
        seq: Seq,
        index: u8,
        total: u8,
        payload: &[u8],
        quality: LinkQuality,
        now: Instant,
    ) -> FragmentOutcome {
        if total == 0 || total > self.max_fragments {
            return FragmentOutcome::Rejected(RejectReason::InvalidTotal);
        }
        if index >= total {
            return FragmentOutcome::Rejected(RejectReason::IndexOutOfRange);
        }
        if payload.len() > MAX_FRAGMENT_PAYLOAD {
            return FragmentOutcome::Rejected(RejectReason::Oversized);
        }

        self.expire(now);

        let context = match self.context.take() {
            Some(context) if context.seq == seq => context,
            previous => {
                if let Some(old) = previous {
                    debug!(
                        "abandoning partial message seq {} ({}/{} fragments) for seq {}",
                        old.seq, old.received, old.total, seq
                    );
                }
                ReassemblyContext::new(seq, total, now)
            }
        };
        let context = self.context.insert(context);

        if context.total != total {
            return FragmentOutcome::Rejected(RejectReason::TotalMismatch {
                expected: context.total,
            });
        }

        let slot = &mut context.fragments[index as usize];
        let duplicate = slot.is_some();
        if !duplicate {
            *slot = Some(payload.to_vec());
            context.received += 1;
        }
        context.quality = quality;
        context.last_fragment_at = now;

        if context.is_complete() {
            return match self.context.take() {
                Some(done) => FragmentOutcome::Complete(done.assemble()),
                None => FragmentOutcome::Duplicate,
            };
        }

        if duplicate {
            FragmentOutcome::Duplicate
        } else {
            FragmentOutcome::Stored {
                received: context.received,
                total,
            }
        }
    }

    /// Drop the partial message if it has been idle for the timeout.
    ///
    /// Returns true if a partial message was discarded.
    pub fn expire(&mut self, now: Instant) -> bool {
        let idle = match &self.context {
            Some(context) => now.saturating_duration_since(context.last_fragment_at),
            None => return false,
        };
        if idle < self.timeout {
            return false;
        }
        if let Some(old) = self.context.take() {
            warn!(
                "reassembly of seq {} timed out with {}/{} fragments",
                old.seq, old.received, old.total
            );
        }
        true
    }

    /// Whether a partial message is being held.
    pub fn is_active(&self) -> bool {
        self.context.is_some()
    }

    /// Sequence number of the partial message, if any.
    pub fn active_seq(&self) -> Option<Seq> {
        self.context.as_ref().map(|c| c.seq)
    }

    /// Distinct fragments stored for the partial message.
    pub fn received_count(&self) -> usize {
        self.context.as_ref().map_or(0, |c| c.received)
    }

    /// Discard any partial message.
    pub fn clear(&mut self) {
        self.context = None;
    }
}
