//! LoRa region and modulation settings.
//!
//! The radio itself is configured by the driver; these values describe the
//! deployed link so the host can report them (STATUS) and so timeouts can be
//! checked against the real time-on-air.

use super::LoRaParams;

/// Frequency band region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// India 865-867 MHz band
    In865,
    /// EU 863-870 MHz band
    Eu868,
    /// US 902-928 MHz band
    Us915,
    /// Australia 915-928 MHz
    Au915,
    /// Asia 920-923 MHz
    As923,
}

impl Region {
    /// Get the operating frequency for this region in Hz.
    pub fn frequency(self) -> u32 {
        match self {
            Self::In865 => 865_000_000,
            Self::Eu868 => 868_100_000,
            Self::Us915 => 915_000_000,
            Self::Au915 => 915_000_000,
            Self::As923 => 923_200_000,
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        #[cfg(feature = "region-eu868")]
        return Self::Eu868;
        #[cfg(feature = "region-us915")]
        return Self::Us915;
        #[cfg(feature = "region-au915")]
        return Self::Au915;
        #[cfg(feature = "region-as923")]
        return Self::As923;
        #[cfg(not(any(
            feature = "region-eu868",
            feature = "region-us915",
            feature = "region-au915",
            feature = "region-as923"
        )))]
        Self::In865
    }
}

// ==================== Standard Link Parameters ====================

/// Spreading factor (SF10 - long range at moderate airtime).
pub const SPREADING_FACTOR: u8 = 10;

/// Bandwidth in Hz (125 kHz - standard LoRa).
pub const BANDWIDTH_HZ: u32 = 125_000;

/// Coding rate denominator (5 = 4/5 coding rate).
pub const CODING_RATE: u8 = 5;

/// TX power in dBm (SX1262 maximum).
pub const TX_POWER: i8 = 22;

/// Preamble length in symbols.
pub const PREAMBLE_LENGTH: u8 = 8;

/// Largest frame the radio accepts in one transmission.
pub const LORA_MTU: usize = 255;

/// Modulation settings of one radio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioSettings {
    pub region: Region,
    pub spreading_factor: u8,
    pub bandwidth_hz: u32,
    pub coding_rate: u8,
    pub tx_power_dbm: i8,
    pub preamble_symbols: u8,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            region: Region::default(),
            spreading_factor: SPREADING_FACTOR,
            bandwidth_hz: BANDWIDTH_HZ,
            coding_rate: CODING_RATE,
            tx_power_dbm: TX_POWER,
            preamble_symbols: PREAMBLE_LENGTH,
        }
    }
}

impl RadioSettings {
    /// Operating frequency in Hz.
    pub fn frequency_hz(&self) -> u32 {
        self.region.frequency()
    }

    /// Bandwidth in kHz, as reported to the host.
    pub fn bandwidth_khz(&self) -> u32 {
        self.bandwidth_hz / 1000
    }

    /// Parameters for time-on-air calculation.
    ///
    /// Frames are sent in explicit header mode with CRC enabled.
    pub fn airtime_params(&self) -> LoRaParams {
        LoRaParams {
            spreading_factor: self.spreading_factor,
            bandwidth_hz: self.bandwidth_hz,
            coding_rate: self.coding_rate,
            preamble_symbols: self.preamble_symbols,
            explicit_header: true,
            crc_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_frequencies() {
        assert_eq!(Region::In865.frequency(), 865_000_000);
        assert_eq!(Region::Eu868.frequency(), 868_100_000);
        assert_eq!(Region::Us915.frequency(), 915_000_000);
        assert_eq!(Region::As923.frequency(), 923_200_000);
    }

    #[test]
    fn test_default_region() {
        assert_eq!(Region::default(), Region::In865);
    }

    #[test]
    fn test_default_settings_match_deployed_link() {
        let settings = RadioSettings::default();
        assert_eq!(settings.frequency_hz(), 865_000_000);
        assert_eq!(settings.spreading_factor, 10);
        assert_eq!(settings.bandwidth_khz(), 125);
        assert_eq!(settings.tx_power_dbm, 22);
    }

    #[test]
    fn test_airtime_params_follow_settings() {
        let settings = RadioSettings {
            spreading_factor: 12,
            ..Default::default()
        };
        let params = settings.airtime_params();
        assert_eq!(params.spreading_factor, 12);
        assert_eq!(params.bandwidth_hz, 125_000);
        assert!(params.explicit_header);
        assert!(params.crc_enabled);
    }
}
