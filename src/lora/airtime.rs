//! LoRa time-on-air calculation.
//!
//! Uses the formula from the Semtech SX1262 datasheet (Section 6.1.4). The
//! link uses it to check that the ack timeout leaves room for a full frame
//! and its acknowledgement to cross the air.
//!
//! # Example
//!
//! ```
//! use linkmaster_lora::lora::{calculate_airtime_us, LoRaParams};
//!
//! let params = LoRaParams::default();
//! let airtime = calculate_airtime_us(50, &params);
//! println!("50-byte frame takes {} us ({:.2} ms)", airtime, airtime as f64 / 1000.0);
//! ```

use std::time::Duration;

/// LoRa modulation parameters for airtime calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoRaParams {
    /// Spreading factor (7-12)
    pub spreading_factor: u8,
    /// Bandwidth in Hz (typically 125000, 250000, or 500000)
    pub bandwidth_hz: u32,
    /// Coding rate denominator (5-8 for 4/5 to 4/8)
    pub coding_rate: u8,
    /// Preamble length in symbols (typically 8)
    pub preamble_symbols: u8,
    /// Whether explicit header mode is used
    pub explicit_header: bool,
    /// Whether CRC is enabled
    pub crc_enabled: bool,
}

impl Default for LoRaParams {
    /// SF10 / 125 kHz / CR 4/5, explicit header with CRC.
    fn default() -> Self {
        Self {
            spreading_factor: 10,
            bandwidth_hz: 125_000,
            coding_rate: 5,
            preamble_symbols: 8,
            explicit_header: true,
            crc_enabled: true,
        }
    }
}

impl LoRaParams {
    /// Whether low data rate optimization applies.
    ///
    /// Required when symbol time exceeds 16ms (SF11/SF12 at 125kHz).
    pub fn low_data_rate_optimize(&self) -> bool {
        self.symbol_duration_us() > 16_000
    }

    /// Symbol duration in microseconds: 2^SF / BW.
    pub fn symbol_duration_us(&self) -> u64 {
        let sf = self.spreading_factor as u64;
        let bw = self.bandwidth_hz as u64;
        if bw == 0 {
            return 0;
        }
        (1u64 << sf) * 1_000_000 / bw
    }
}

/// Calculate frame airtime in microseconds.
pub fn calculate_airtime_us(payload_bytes: usize, params: &LoRaParams) -> u64 {
    let sf = params.spreading_factor as f64;
    let bw = params.bandwidth_hz as f64;

    if bw == 0.0 {
        return 0;
    }

    let t_sym_us = (2.0_f64.powf(sf) / bw) * 1_000_000.0;
    let t_preamble_us = (params.preamble_symbols as f64 + 4.25) * t_sym_us;

    let de = if params.low_data_rate_optimize() { 1.0 } else { 0.0 };
    let h = if params.explicit_header { 0.0 } else { 1.0 };
    let crc_bits = if params.crc_enabled { 16.0 } else { 0.0 };

    // 8*PL - 4*SF + 28 + 16*CRC - 20*H over 4*(SF - 2*DE)
    let numerator = 8.0 * payload_bytes as f64 - 4.0 * sf + 28.0 + crc_bits - 20.0 * h;
    let denominator = 4.0 * (sf - 2.0 * de);

    let cr = params.coding_rate as f64;
    let payload_symbols = if denominator > 0.0 {
        8.0 + (numerator / denominator).ceil().max(0.0) * cr
    } else {
        8.0
    };

    (t_preamble_us + payload_symbols * t_sym_us) as u64
}

/// Calculate airtime in milliseconds (convenience wrapper).
pub fn calculate_airtime_ms(payload_bytes: usize, params: &LoRaParams) -> f64 {
    calculate_airtime_us(payload_bytes, params) as f64 / 1000.0
}

/// Airtime of a frame followed by its acknowledgement.
pub fn exchange_airtime(frame_bytes: usize, ack_bytes: usize, params: &LoRaParams) -> Duration {
    Duration::from_micros(
        calculate_airtime_us(frame_bytes, params) + calculate_airtime_us(ack_bytes, params),
    )
}
