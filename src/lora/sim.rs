//! In-memory radio link for host testing.
//!
//! [`pair`] returns two radios joined by channels: whatever one transmits the
//! other receives. A drop filter simulates frames lost on the air, which is
//! how retries and at-least-once delivery are exercised without hardware.
//!
//! # Example
//!
//! ```
//! use linkmaster_lora::lora::{sim, Radio};
//! use std::time::Duration;
//!
//! let (mut a, mut b) = sim::pair();
//! a.transmit(&[0x80]).unwrap();
//! let frame = b.receive(Duration::from_millis(10)).unwrap().unwrap();
//! assert_eq!(frame.data, vec![0x80]);
//! ```

use super::radio::{check_frame, Radio, RadioError, ReceivedPacket};
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

/// RSSI reported for simulated frames unless overridden (dBm).
pub const DEFAULT_SIM_RSSI: i16 = -60;

/// SNR reported for simulated frames unless overridden (dB).
pub const DEFAULT_SIM_SNR: i8 = 9;

type DropFilter = Box<dyn FnMut(&[u8]) -> bool + Send>;

/// One end of a simulated radio link.
pub struct SimRadio {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    rssi: i16,
    snr: i8,
    drop_filter: Option<DropFilter>,
    transmitted: Arc<AtomicUsize>,
}

/// Create two radios that hear each other.
pub fn pair() -> (SimRadio, SimRadio) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (SimRadio::new(a_tx, a_rx), SimRadio::new(b_tx, b_rx))
}

impl SimRadio {
    fn new(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        Self {
            tx,
            rx,
            rssi: DEFAULT_SIM_RSSI,
            snr: DEFAULT_SIM_SNR,
            drop_filter: None,
            transmitted: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the link quality reported for frames this radio receives.
    pub fn with_link_quality(mut self, rssi: i16, snr: i8) -> Self {
        self.rssi = rssi;
        self.snr = snr;
        self
    }

    /// Lose every outgoing frame for which `filter` returns true.
    pub fn with_drop_filter<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        self.drop_filter = Some(Box::new(filter));
        self
    }

    /// Shared counter of transmission attempts, including dropped frames.
    pub fn transmit_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.transmitted)
    }
}

impl Radio for SimRadio {
    fn transmit(&mut self, data: &[u8]) -> Result<(), RadioError> {
        check_frame(data)?;
        self.transmitted.fetch_add(1, Ordering::Relaxed);

        if let Some(filter) = self.drop_filter.as_mut() {
            if filter(data) {
                debug!("sim: frame {:#04x} lost on air", data[0]);
                return Ok(());
            }
        }

        self.tx
            .send(data.to_vec())
            .map_err(|_| RadioError::Disconnected)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<ReceivedPacket>, RadioError> {
        match self.rx.recv_timeout(timeout) {
            Ok(data) => Ok(Some(ReceivedPacket::new(data, self.rssi, self.snr))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(RadioError::Disconnected),
        }
    }
}
