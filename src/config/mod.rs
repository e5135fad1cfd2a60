//! Link configuration.
//!
//! Timing, retry and size limits of the reliable transport. The defaults are
//! the parameters the deployed peer firmware runs with; changing them only
//! affects this endpoint, so the ack timeout in particular must stay above
//! the on-air round trip of the slowest frame.

mod link;

pub use link::{
    ConfigError, LinkConfig, DEFAULT_ACK_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL,
    DEFAULT_REASSEMBLY_TIMEOUT,
};
