//! JSON-lines host protocol.
//!
//! One JSON object per line in each direction:
//!
//! ```text
//! > {"cmd":"LORA_SEND","data":"aGVsbG8="}
//! < {"ok":true,"data":{"seq":0,"frags":1,"retries":0}}
//! > {"cmd":"STATUS"}
//! < {"ok":true,"data":{"uptime_ms":5120,"fw":"L1-LinkMaster-LoRa",...}}
//! < {"event":"LORA_RX","data":"cG9uZw==","rssi":-71,"snr":8,"len":4}
//! ```
//!
//! Field order of the reply structs is the key order on the wire.

use crate::lora::RadioSettings;
use crate::stats::StatsSnapshot;
use crate::transport::{Delivery, SendError, SendReport};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::{self, Write};

/// Identity reported in STATUS and the boot line.
pub const FIRMWARE_NAME: &str = "L1-LinkMaster-LoRa";

/// Version reported in STATUS and the boot line.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Event name of an inbound message.
pub const RX_EVENT: &str = "LORA_RX";

/// A host request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `LORA_SEND`; `data` is the raw base64 field, if present.
    Send { data: Option<String> },
    /// `STATUS`.
    Status,
}

/// Parse one request line.
///
/// Any valid JSON is accepted; a missing or non-string `cmd` is treated as
/// an unknown command.
pub fn parse_command(line: &str) -> Result<Command, HostError> {
    let value: Value = serde_json::from_str(line).map_err(|_| HostError::JsonParse)?;
    match value.get("cmd").and_then(Value::as_str).unwrap_or("") {
        "LORA_SEND" => Ok(Command::Send {
            data: value.get("data").and_then(Value::as_str).map(str::to_owned),
        }),
        "STATUS" => Ok(Command::Status),
        _ => Err(HostError::UnknownCommand),
    }
}

/// Decode the base64 payload of a `LORA_SEND`.
pub fn decode_payload(data: Option<&str>, max_len: usize) -> Result<Vec<u8>, HostError> {
    let data = match data {
        Some(d) if !d.is_empty() => d,
        _ => return Err(HostError::MissingData),
    };
    let payload = BASE64.decode(data).map_err(|_| HostError::Base64Decode)?;
    if payload.len() > max_len {
        return Err(HostError::PayloadTooLarge {
            len: payload.len(),
            max: max_len,
        });
    }
    Ok(payload)
}

/// Errors reported to the host as `{"ok":false,"error":<code>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Line is not valid JSON.
    JsonParse,
    /// `cmd` missing or not recognised.
    UnknownCommand,
    /// `data` missing or empty.
    MissingData,
    /// `data` is not valid base64.
    Base64Decode,
    /// Decoded payload exceeds the message limit.
    PayloadTooLarge { len: usize, max: usize },
    /// Line exceeded the input limit.
    InputTooLong,
    /// The peer did not acknowledge.
    NoAck { seq: u8, frag: Option<u8> },
}

impl HostError {
    /// Stable error code sent to the host.
    pub fn code(&self) -> &'static str {
        match self {
            Self::JsonParse => "json_parse_error",
            Self::UnknownCommand => "unknown_command",
            Self::MissingData => "missing_data",
            Self::Base64Decode => "base64_decode_error",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::InputTooLong => "input_too_long",
            Self::NoAck { .. } => "no_ack",
        }
    }

    pub fn to_reply(&self) -> ErrorReply {
        let (seq, frag) = match self {
            Self::NoAck { seq, frag } => (Some(*seq), *frag),
            _ => (None, None),
        };
        ErrorReply {
            ok: false,
            error: self.code(),
            seq,
            frag,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload too large: {} bytes (max {})", len, max)
            }
            Self::NoAck {
                seq,
                frag: Some(frag),
            } => write!(f, "no ack for seq {} fragment {}", seq, frag),
            Self::NoAck { seq, frag: None } => write!(f, "no ack for seq {}", seq),
            other => write!(f, "{}", other.code()),
        }
    }
}

impl std::error::Error for HostError {}

impl From<SendError> for HostError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::Empty => Self::MissingData,
            SendError::TooLarge { len, max } => Self::PayloadTooLarge { len, max },
            SendError::NoAck { seq, frag, .. } => Self::NoAck {
                seq: seq.value(),
                frag,
            },
        }
    }
}

/// `{"ok":true,"data":...}`
#[derive(Debug, Serialize)]
pub struct OkReply<T> {
    pub ok: bool,
    pub data: T,
}

impl<T: Serialize> OkReply<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// `{"ok":false,"error":...}`, with `seq`/`frag` for send failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReply {
    pub ok: bool,
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frag: Option<u8>,
}

/// Payload of a successful `LORA_SEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SendData {
    pub seq: u8,
    pub frags: usize,
    pub retries: u32,
}

impl From<SendReport> for SendData {
    fn from(report: SendReport) -> Self {
        Self {
            seq: report.seq.value(),
            frags: report.frags,
            retries: report.retries,
        }
    }
}

/// Payload of `STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusData {
    pub uptime_ms: u64,
    pub fw: &'static str,
    pub ver: &'static str,
    pub freq_hz: u32,
    pub sf: u8,
    pub bw_khz: u32,
    pub tx_power: i8,
    pub tx_count: usize,
    pub rx_count: usize,
    pub ack_count: usize,
    pub retry_count: usize,
}

impl StatusData {
    pub fn new(settings: &RadioSettings, stats: &StatsSnapshot) -> Self {
        Self {
            uptime_ms: stats.uptime_ms,
            fw: FIRMWARE_NAME,
            ver: FIRMWARE_VERSION,
            freq_hz: settings.frequency_hz(),
            sf: settings.spreading_factor,
            bw_khz: settings.bandwidth_khz(),
            tx_power: settings.tx_power_dbm,
            tx_count: stats.tx_count,
            rx_count: stats.rx_count,
            ack_count: stats.ack_count,
            retry_count: stats.retry_count,
        }
    }
}

/// Payload of the line written at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootData {
    pub fw: &'static str,
    pub ver: &'static str,
    /// Carrier frequency in MHz.
    pub freq: u32,
    pub sf: u8,
}

impl BootData {
    pub fn new(settings: &RadioSettings) -> Self {
        Self {
            fw: FIRMWARE_NAME,
            ver: FIRMWARE_VERSION,
            freq: settings.frequency_hz() / 1_000_000,
            sf: settings.spreading_factor,
        }
    }
}

/// Unsolicited inbound-message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RxEvent {
    pub event: &'static str,
    pub data: String,
    pub rssi: i16,
    pub snr: i8,
    pub len: usize,
}

impl From<&Delivery> for RxEvent {
    fn from(delivery: &Delivery) -> Self {
        Self {
            event: RX_EVENT,
            data: BASE64.encode(&delivery.payload),
            rssi: delivery.quality.rssi,
            snr: delivery.quality.snr,
            len: delivery.payload.len(),
        }
    }
}

/// Write `message` as one JSON line.
pub fn write_line<W: Write, T: Serialize>(out: &mut W, message: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, message)?;
    out.write_all(b"\n")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lora::LinkQuality;
    use crate::transport::Seq;

    fn json<T: Serialize>(message: &T) -> String {
        let mut out = Vec::new();
        write_line(&mut out, message).unwrap();
        String::from_utf8(out).unwrap()
    }

    // ==================== Request Tests ====================

    #[test]
    fn test_parse_send_and_status() {
        assert_eq!(
            parse_command(r#"{"cmd":"LORA_SEND","data":"aGk="}"#),
            Ok(Command::Send {
                data: Some("aGk=".to_string())
            })
        );
        assert_eq!(
            parse_command(r#"{"cmd":"LORA_SEND"}"#),
            Ok(Command::Send { data: None })
        );
        assert_eq!(parse_command(r#"{"cmd":"STATUS"}"#), Ok(Command::Status));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_command("{not json"), Err(HostError::JsonParse));
        assert_eq!(parse_command(r#"{"cmd":"REBOOT"}"#), Err(HostError::UnknownCommand));
        assert_eq!(parse_command(r#"{"data":"aGk="}"#), Err(HostError::UnknownCommand));
        assert_eq!(parse_command(r#"{"cmd":7}"#), Err(HostError::UnknownCommand));
        assert_eq!(parse_command("[1,2]"), Err(HostError::UnknownCommand));
        assert_eq!(parse_command(r#"{"cmd":"status"}"#), Err(HostError::UnknownCommand));
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload(Some("aGk="), 5040), Ok(b"hi".to_vec()));
        assert_eq!(decode_payload(None, 5040), Err(HostError::MissingData));
        assert_eq!(decode_payload(Some(""), 5040), Err(HostError::MissingData));
        assert_eq!(decode_payload(Some("@@@"), 5040), Err(HostError::Base64Decode));
        assert_eq!(
            decode_payload(Some("aGVsbG8="), 4),
            Err(HostError::PayloadTooLarge { len: 5, max: 4 })
        );
    }

    // ==================== Reply Tests ====================

    #[test]
    fn test_send_reply_format() {
        let reply = OkReply::new(SendData {
            seq: 0,
            frags: 1,
            retries: 0,
        });
        assert_eq!(
            json(&reply),
            "{\"ok\":true,\"data\":{\"seq\":0,\"frags\":1,\"retries\":0}}\n"
        );
    }

    #[test]
    fn test_error_reply_format() {
        assert_eq!(
            json(&HostError::JsonParse.to_reply()),
            "{\"ok\":false,\"error\":\"json_parse_error\"}\n"
        );
        assert_eq!(
            json(&HostError::NoAck { seq: 5, frag: None }.to_reply()),
            "{\"ok\":false,\"error\":\"no_ack\",\"seq\":5}\n"
        );
        assert_eq!(
            json(
                &HostError::NoAck {
                    seq: 5,
                    frag: Some(2)
                }
                .to_reply()
            ),
            "{\"ok\":false,\"error\":\"no_ack\",\"seq\":5,\"frag\":2}\n"
        );
    }

    #[test]
    fn test_send_error_mapping() {
        let err: HostError = SendError::NoAck {
            seq: Seq::new(9),
            frag: Some(1),
            retries: 3,
        }
        .into();
        assert_eq!(err, HostError::NoAck { seq: 9, frag: Some(1) });

        let err: HostError = SendError::TooLarge { len: 6000, max: 5040 }.into();
        assert_eq!(err.code(), "payload_too_large");
    }

    #[test]
    fn test_status_key_order() {
        let settings = RadioSettings::default();
        let snapshot = StatsSnapshot {
            uptime_ms: 1234,
            tx_count: 1,
            rx_count: 2,
            ack_count: 3,
            retry_count: 4,
            failed_sends: 0,
            expired_reassemblies: 0,
        };
        let line = json(&OkReply::new(StatusData::new(&settings, &snapshot)));
        let keys = [
            "uptime_ms",
            "fw",
            "ver",
            "freq_hz",
            "sf",
            "bw_khz",
            "tx_power",
            "tx_count",
            "rx_count",
            "ack_count",
            "retry_count",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| line.find(&format!("\"{}\":", k)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(line.contains("\"sf\":10"));
        assert!(line.contains("\"bw_khz\":125"));
        assert!(line.contains("\"tx_power\":22"));
        assert!(line.contains("\"retry_count\":4"));
    }

    #[test]
    fn test_rx_event_format() {
        let delivery = Delivery {
            seq: Seq::new(1),
            payload: b"pong".to_vec(),
            quality: LinkQuality { rssi: -71, snr: 8 },
        };
        assert_eq!(
            json(&RxEvent::from(&delivery)),
            "{\"event\":\"LORA_RX\",\"data\":\"cG9uZw==\",\"rssi\":-71,\"snr\":8,\"len\":4}\n"
        );
    }
}
