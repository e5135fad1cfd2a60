//! Reliable-link parameters.
//!
//! # Example
//!
//! ```
//! use linkmaster_lora::config::LinkConfig;
//! use std::time::Duration;
//!
//! let config = LinkConfig {
//!     ack_timeout: Duration::from_millis(500),
//!     ..LinkConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! assert_eq!(config.max_message_size(), 5040);
//! ```

use crate::lora::{exchange_airtime, LoRaParams, LORA_MTU};
use crate::transport::{FRAG_ACK_SIZE, MAX_FRAGMENTS, MAX_FRAGMENT_PAYLOAD};
use std::fmt;
use std::time::Duration;

/// How long to wait for an ACK/FRAG_ACK before retransmitting.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(3000);

/// Retransmissions after the first attempt.
pub const DEFAULT_MAX_RETRIES: u8 = 3;

/// How long a partial inbound message survives without a new fragment.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Granularity of the ack-wait and idle poll loops.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Parameters of one link endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Wait for an acknowledgement per attempt.
    pub ack_timeout: Duration,
    /// Retransmissions per frame after the first attempt.
    pub max_retries: u8,
    /// Idle time after which a partial inbound message is dropped.
    pub reassembly_timeout: Duration,
    /// Longest single radio poll inside wait loops.
    pub poll_interval: Duration,
    /// Fragments allowed per message, in either direction.
    pub max_fragments: u8,
    /// Re-ACK but do not redeliver a DATA frame repeating the last seq.
    ///
    /// Off by default: a lost ACK then yields a second delivery of the same
    /// payload, which is what the peer firmware does.
    pub suppress_duplicate_data: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_fragments: MAX_FRAGMENTS,
            suppress_duplicate_data: false,
        }
    }
}

impl LinkConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ack_timeout.is_zero() {
            return Err(ConfigError::ZeroAckTimeout);
        }
        if self.reassembly_timeout.is_zero() {
            return Err(ConfigError::ZeroReassemblyTimeout);
        }
        if self.poll_interval.is_zero() || self.poll_interval > self.ack_timeout {
            return Err(ConfigError::InvalidPollInterval {
                poll: self.poll_interval,
                ack_timeout: self.ack_timeout,
            });
        }
        if self.max_fragments == 0 {
            return Err(ConfigError::ZeroFragments);
        }
        Ok(())
    }

    /// Transmission attempts per frame.
    pub fn attempts(&self) -> u32 {
        1 + u32::from(self.max_retries)
    }

    /// Largest message that can be sent or received.
    pub fn max_message_size(&self) -> usize {
        self.max_fragments as usize * MAX_FRAGMENT_PAYLOAD
    }

    /// Upper bound on how long one send can block.
    pub fn worst_case_send_time(&self) -> Duration {
        self.ack_timeout * self.attempts() * u32::from(self.max_fragments)
    }

    /// Shortest ack timeout that can cover a full-MTU frame plus its FRAG_ACK.
    pub fn minimum_ack_timeout(params: &LoRaParams) -> Duration {
        exchange_airtime(LORA_MTU, FRAG_ACK_SIZE, params)
    }

    /// Whether the ack timeout covers the on-air round trip at `params`.
    pub fn ack_timeout_fits(&self, params: &LoRaParams) -> bool {
        self.ack_timeout >= Self::minimum_ack_timeout(params)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Ack timeout is zero.
    ZeroAckTimeout,
    /// Reassembly timeout is zero.
    ZeroReassemblyTimeout,
    /// Poll interval is zero or longer than the ack timeout.
    InvalidPollInterval { poll: Duration, ack_timeout: Duration },
    /// Fragment limit is zero.
    ZeroFragments,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAckTimeout => write!(f, "ack timeout must be non-zero"),
            Self::ZeroReassemblyTimeout => write!(f, "reassembly timeout must be non-zero"),
            Self::InvalidPollInterval { poll, ack_timeout } => write!(
                f,
                "poll interval {:?} must be non-zero and at most the ack timeout {:?}",
                poll, ack_timeout
            ),
            Self::ZeroFragments => write!(f, "fragment limit must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Default Tests ====================

    #[test]
    fn test_defaults_match_deployed_link() {
        let config = LinkConfig::default();
        assert_eq!(config.ack_timeout, Duration::from_millis(3000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.reassembly_timeout, Duration::from_millis(30_000));
        assert_eq!(config.max_fragments, 20);
        assert!(!config.suppress_duplicate_data);
        assert_eq!(config.attempts(), 4);
        assert_eq!(config.max_message_size(), 5040);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worst_case_send_time() {
        let config = LinkConfig::default();
        assert_eq!(config.worst_case_send_time(), Duration::from_secs(240));
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_zero_timeouts_rejected() {
        let config = LinkConfig {
            ack_timeout: Duration::ZERO,
            ..LinkConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroAckTimeout));

        let config = LinkConfig {
            reassembly_timeout: Duration::ZERO,
            ..LinkConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroReassemblyTimeout));
    }

    #[test]
    fn test_poll_interval_bounds() {
        let config = LinkConfig {
            poll_interval: Duration::ZERO,
            ..LinkConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPollInterval { .. })
        ));

        let config = LinkConfig {
            ack_timeout: Duration::from_millis(10),
            poll_interval: Duration::from_millis(20),
            ..LinkConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPollInterval { .. })
        ));
    }

    #[test]
    fn test_zero_fragments_rejected() {
        let config = LinkConfig {
            max_fragments: 0,
            ..LinkConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFragments));
    }

    // ==================== Airtime Tests ====================

    #[test]
    fn test_default_timeout_covers_sf10_round_trip() {
        let params = LoRaParams::default();
        assert!(LinkConfig::default().ack_timeout_fits(&params));
    }

    #[test]
    fn test_default_timeout_too_short_for_sf12() {
        let params = LoRaParams {
            spreading_factor: 12,
            ..LoRaParams::default()
        };
        assert!(LinkConfig::minimum_ack_timeout(&params) > DEFAULT_ACK_TIMEOUT);
        assert!(!LinkConfig::default().ack_timeout_fits(&params));
    }
}
