//! Line accumulator for the host byte stream.
//!
//! Bytes arrive from the serial port in arbitrary chunks. Complete lines are
//! handed out trimmed, with `\r` dropped. A line longer than the limit is
//! reported once and the rest of it, up to the next `\n`, is thrown away.

/// Longest accepted host line, in bytes.
///
/// Fits a `LORA_SEND` carrying the largest message (6720 base64 chars).
pub const MAX_LINE_LEN: usize = 8192;

/// What one input byte produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete, trimmed, non-empty line.
    Line(String),
    /// The current line exceeded the limit and is being discarded.
    TooLong,
}

/// Splits a byte stream into lines.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_len: usize,
    in_overflow: bool,
}

impl LineBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
            in_overflow: false,
        }
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> Option<LineEvent> {
        match byte {
            b'\n' => {
                // The newline ends an overflowing line without producing it.
                if std::mem::take(&mut self.in_overflow) {
                    return None;
                }
                let line = std::mem::take(&mut self.buf);
                let line = String::from_utf8_lossy(&line).trim().to_string();
                if line.is_empty() {
                    None
                } else {
                    Some(LineEvent::Line(line))
                }
            }
            b'\r' => None,
            _ if self.in_overflow => None,
            _ => {
                if self.buf.len() >= self.max_len {
                    self.buf.clear();
                    self.in_overflow = true;
                    return Some(LineEvent::TooLong);
                }
                self.buf.push(byte);
                None
            }
        }
    }

    /// Feed a chunk, returning every event it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LineEvent> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Bytes of the current partial line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(MAX_LINE_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> LineEvent {
        LineEvent::Line(s.to_string())
    }

    #[test]
    fn test_lines_across_chunks() {
        let mut lines = LineBuffer::default();
        assert!(lines.feed(b"{\"cmd\":").is_empty());
        assert_eq!(
            lines.feed(b"\"STATUS\"}\n{\"a\":1}\n{"),
            vec![line("{\"cmd\":\"STATUS\"}"), line("{\"a\":1}")]
        );
        assert_eq!(lines.pending(), 1);
    }

    #[test]
    fn test_crlf_and_whitespace_trimmed() {
        let mut lines = LineBuffer::default();
        assert_eq!(lines.feed(b"  STATUS \r\n"), vec![line("STATUS")]);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut lines = LineBuffer::default();
        assert!(lines.feed(b"\n\r\n   \n").is_empty());
    }

    #[test]
    fn test_overflow_reported_once_and_rest_discarded() {
        let mut lines = LineBuffer::new(4);
        assert_eq!(lines.feed(b"abcd"), vec![]);
        assert_eq!(lines.feed(b"efghij"), vec![LineEvent::TooLong]);
        assert_eq!(lines.feed(b"kl\nok\n"), vec![line("ok")]);
    }

    #[test]
    fn test_line_at_limit_accepted() {
        let mut lines = LineBuffer::new(4);
        assert_eq!(lines.feed(b"abcd\n"), vec![line("abcd")]);
    }
}
