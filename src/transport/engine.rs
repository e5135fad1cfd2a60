//! Reliable delivery over one half-duplex radio.
//!
//! [`LinkEngine`] owns everything one endpoint needs: the radio, the outbound
//! sequence counter, the reassembly slot and the counters. A send runs the
//! transmit, wait-for-ack, retry cycle per frame, strictly in fragment order,
//! and blocks until the message is acknowledged or a frame runs out of
//! attempts.
//!
//! # Multiplexing
//!
//! The radio can only be polled from one place at a time, so the ack-wait loop
//! is also the receive path while a send is pending: any frame that is not the
//! expected acknowledgement goes through the same inbound handler as
//! [`LinkEngine::poll`]. DATA and FRAG from the peer are acknowledged and
//! delivered even in the middle of our own send.
//!
//! Completed inbound messages are queued and handed out by
//! [`LinkEngine::take_deliveries`].

use super::fragment::{FragmentError, FragmentOutcome, Fragmenter, Reassembler};
use super::packet::{Packet, Seq};
use crate::config::LinkConfig;
use crate::lora::{LinkQuality, Radio, RadioError, ReceivedPacket};
use crate::stats::LinkStats;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Outcome of a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Sequence number the message went out with.
    pub seq: Seq,
    /// Frames the message was sent as (1 for an unfragmented message).
    pub frags: usize,
    /// Retransmissions across all frames.
    pub retries: u32,
}

/// Why a send failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Nothing to send.
    Empty,
    /// The message exceeds the fragment limit; nothing was transmitted.
    TooLarge { len: usize, max: usize },
    /// A frame was not acknowledged within its attempts.
    NoAck {
        seq: Seq,
        /// Failing fragment index, `None` for an unfragmented message.
        frag: Option<u8>,
        /// Retransmissions up to and including the failing frame.
        retries: u32,
    },
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty message"),
            Self::TooLarge { len, max } => {
                write!(f, "message too large: {} bytes (max {})", len, max)
            }
            Self::NoAck {
                seq,
                frag: Some(index),
                retries,
            } => write!(
                f,
                "no ack for seq {} fragment {} ({} retries)",
                seq, index, retries
            ),
            Self::NoAck {
                seq,
                frag: None,
                retries,
            } => write!(f, "no ack for seq {} ({} retries)", seq, retries),
        }
    }
}

impl std::error::Error for SendError {}

/// A message received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub seq: Seq,
    pub payload: Vec<u8>,
    /// Quality of the frame that completed the message.
    pub quality: LinkQuality,
}

/// One endpoint of the reliable link.
pub struct LinkEngine<R: Radio> {
    radio: R,
    config: LinkConfig,
    fragmenter: Fragmenter,
    reassembler: Reassembler,
    tx_seq: Seq,
    /// Last delivered DATA seq, for optional duplicate suppression.
    last_data: Option<(Seq, Instant)>,
    stats: Arc<LinkStats>,
    inbox: VecDeque<Delivery>,
}

impl<R: Radio> LinkEngine<R> {
    /// Create an engine with its own counters.
    pub fn new(radio: R, config: LinkConfig) -> Self {
        Self::with_stats(radio, config, Arc::new(LinkStats::new()))
    }

    /// Create an engine that records into shared counters.
    pub fn with_stats(radio: R, config: LinkConfig, stats: Arc<LinkStats>) -> Self {
        info!(
            "link engine: ack timeout {:?}, {} retries, reassembly timeout {:?}, max {} fragments",
            config.ack_timeout, config.max_retries, config.reassembly_timeout, config.max_fragments
        );
        Self {
            radio,
            fragmenter: Fragmenter::new(config.max_fragments),
            reassembler: Reassembler::new(config.reassembly_timeout, config.max_fragments),
            config,
            tx_seq: Seq::default(),
            last_data: None,
            stats,
            inbox: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<LinkStats> {
        &self.stats
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Sequence number the next message will use.
    pub fn next_seq(&self) -> Seq {
        self.tx_seq
    }

    /// Whether a partial inbound message is being held.
    pub fn reassembly_active(&self) -> bool {
        self.reassembler.is_active()
    }

    /// Deliver one message to the peer, blocking until it is acknowledged.
    ///
    /// Rejected messages (empty, oversize) do not consume a sequence number.
    pub fn send(&mut self, message: &[u8]) -> Result<SendReport, SendError> {
        let seq = self.tx_seq;
        let packets = self
            .fragmenter
            .fragment(seq, message)
            .map_err(|e| match e {
                FragmentError::EmptyMessage => SendError::Empty,
                FragmentError::TooManyFragments { .. } => SendError::TooLarge {
                    len: message.len(),
                    max: self.fragmenter.max_message_size(),
                },
            })?;
        self.tx_seq = seq.next();

        let frags = packets.len();
        debug!(
            "sending seq {}: {} bytes in {} frame(s)",
            seq,
            message.len(),
            frags
        );

        let mut retries = 0u32;
        for packet in &packets {
            if !self.transmit_reliably(packet, &mut retries) {
                let frag = match packet {
                    Packet::Frag { index, .. } => Some(*index),
                    _ => None,
                };
                self.stats.record_failed_send();
                warn!(
                    "send of seq {} failed (fragment {:?}, {} retries)",
                    seq, frag, retries
                );
                return Err(SendError::NoAck { seq, frag, retries });
            }
        }

        self.stats.record_tx();
        debug!("seq {} delivered with {} retries", seq, retries);
        Ok(SendReport {
            seq,
            frags,
            retries,
        })
    }

    /// Run the attempt loop for one frame. Returns true once acknowledged.
    fn transmit_reliably(&mut self, packet: &Packet, retries: &mut u32) -> bool {
        let bytes = packet.to_bytes();
        for attempt in 0..self.config.attempts() {
            if attempt > 0 {
                *retries += 1;
                self.stats.record_retry();
                warn!(
                    "retransmitting {:?} seq {} (attempt {}/{})",
                    packet.packet_type(),
                    packet.seq(),
                    attempt + 1,
                    self.config.attempts()
                );
            }

            // A refused frame still uses up the attempt.
            if let Err(e) = self.radio.transmit(&bytes) {
                warn!("transmit failed: {}", e);
                continue;
            }

            if self.wait_for_ack(packet) {
                return true;
            }
        }
        false
    }

    /// Poll until `sent` is acknowledged or the ack timeout passes.
    ///
    /// Everything else received meanwhile goes to the inbound handler.
    fn wait_for_ack(&mut self, sent: &Packet) -> bool {
        let deadline = Instant::now() + self.config.ack_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let slice = remaining.min(self.config.poll_interval);

            match self.radio.receive(slice) {
                Ok(Some(frame)) => match Packet::from_bytes(&frame.data) {
                    Ok(packet) if packet.acknowledges(sent) => {
                        self.stats.record_ack();
                        debug!("{:?} seq {} acknowledged", sent.packet_type(), sent.seq());
                        return true;
                    }
                    Ok(packet) => self.handle_packet(packet, frame.quality()),
                    Err(e) => warn!("dropping malformed frame: {}", e),
                },
                Ok(None) => {}
                Err(e) => {
                    warn!("receive failed while waiting for ack: {}", e);
                    thread::sleep(slice);
                }
            }

            self.expire_reassembly(Instant::now());
        }
    }

    /// Wait up to `timeout` for one inbound frame and handle it.
    pub fn poll(&mut self, timeout: Duration) -> Result<(), RadioError> {
        let frame = self.radio.receive(timeout);
        // Expiry runs even when the radio fails.
        self.expire_reassembly(Instant::now());
        if let Some(frame) = frame? {
            self.handle_frame(frame);
        }
        Ok(())
    }

    /// Decode and dispatch one received frame.
    pub fn handle_frame(&mut self, frame: ReceivedPacket) {
        match Packet::from_bytes(&frame.data) {
            Ok(packet) => self.handle_packet(packet, frame.quality()),
            Err(e) => warn!("dropping malformed frame: {}", e),
        }
    }

    fn handle_packet(&mut self, packet: Packet, quality: LinkQuality) {
        let now = Instant::now();
        match packet {
            Packet::Data { seq, payload } => {
                debug!("rx DATA seq {} ({} bytes)", seq, payload.len());
                self.send_ack(Packet::Ack { seq });

                if payload.is_empty() {
                    return;
                }
                if self.config.suppress_duplicate_data && self.is_repeat(seq, now) {
                    debug!("suppressing repeated DATA seq {}", seq);
                    return;
                }
                self.last_data = Some((seq, now));
                self.deliver(Delivery {
                    seq,
                    payload,
                    quality,
                });
            }
            Packet::Frag {
                seq,
                index,
                total,
                payload,
            } => {
                if total == 0 || total > self.config.max_fragments || index >= total {
                    warn!(
                        "dropping invalid fragment {}/{} of seq {}",
                        index, total, seq
                    );
                    return;
                }
                debug!(
                    "rx FRAG seq {} {}/{} ({} bytes)",
                    seq,
                    index,
                    total,
                    payload.len()
                );
                self.send_ack(Packet::FragAck { seq, index });

                self.expire_reassembly(now);
                match self
                    .reassembler
                    .accept(seq, index, total, &payload, quality, now)
                {
                    FragmentOutcome::Stored { received, total } => {
                        debug!("seq {}: {}/{} fragments", seq, received, total)
                    }
                    FragmentOutcome::Duplicate => {
                        debug!("duplicate fragment {} of seq {}", index, seq)
                    }
                    FragmentOutcome::Complete(done) => self.deliver(Delivery {
                        seq: done.seq,
                        payload: done.payload,
                        quality: done.quality,
                    }),
                    FragmentOutcome::Rejected(reason) => {
                        debug!("fragment {} of seq {} ignored: {:?}", index, seq, reason)
                    }
                }
            }
            Packet::Ack { .. } | Packet::FragAck { .. } => {
                debug!("ignoring stray {:?} seq {}", packet.packet_type(), packet.seq())
            }
        }
    }

    fn is_repeat(&self, seq: Seq, now: Instant) -> bool {
        match self.last_data {
            Some((last, at)) => {
                last == seq && now.saturating_duration_since(at) < self.config.reassembly_timeout
            }
            None => false,
        }
    }

    fn send_ack(&mut self, ack: Packet) {
        if let Err(e) = self.radio.transmit(&ack.to_bytes()) {
            warn!("failed to send {:?} seq {}: {}", ack.packet_type(), ack.seq(), e);
        }
    }

    fn deliver(&mut self, delivery: Delivery) {
        debug!(
            "delivering seq {} ({} bytes)",
            delivery.seq,
            delivery.payload.len()
        );
        self.stats.record_rx();
        self.inbox.push_back(delivery);
    }

    fn expire_reassembly(&mut self, now: Instant) {
        if self.reassembler.expire(now) {
            self.stats.record_expired_reassembly();
        }
    }

    /// Take every message received so far, oldest first.
    pub fn take_deliveries(&mut self) -> Vec<Delivery> {
        self.inbox.drain(..).collect()
    }

    /// Number of received messages not yet taken.
    pub fn pending_deliveries(&self) -> usize {
        self.inbox.len()
    }
}
