//! Host adapter.
//!
//! Connects the host byte stream to a [`LinkEngine`]: requests are read as
//! JSON lines, replies and `LORA_RX` events are written as JSON lines. A
//! `LORA_SEND` blocks until the engine reports an outcome; messages the peer
//! sent meanwhile are written as events before the send's reply.

use super::line::{LineBuffer, LineEvent, MAX_LINE_LEN};
use super::protocol::{
    decode_payload, parse_command, write_line, BootData, Command, HostError, OkReply, RxEvent,
    SendData, StatusData,
};
use crate::lora::{Radio, RadioSettings};
use crate::transport::LinkEngine;
use log::{debug, info, warn};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

/// Serves one host connection over one link engine.
pub struct HostAdapter<R: Radio, W: Write> {
    engine: LinkEngine<R>,
    settings: RadioSettings,
    lines: LineBuffer,
    out: W,
}

impl<R: Radio, W: Write> HostAdapter<R, W> {
    pub fn new(engine: LinkEngine<R>, settings: RadioSettings, out: W) -> Self {
        Self {
            engine,
            settings,
            lines: LineBuffer::new(MAX_LINE_LEN),
            out,
        }
    }

    pub fn engine(&self) -> &LinkEngine<R> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut LinkEngine<R> {
        &mut self.engine
    }

    /// Output written so far.
    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Write the startup identity line.
    pub fn write_boot(&mut self) -> io::Result<()> {
        info!(
            "{} {} ready ({} MHz, SF{})",
            super::FIRMWARE_NAME,
            super::FIRMWARE_VERSION,
            self.settings.frequency_hz() / 1_000_000,
            self.settings.spreading_factor
        );
        write_line(&mut self.out, &OkReply::new(BootData::new(&self.settings)))
    }

    /// Feed raw bytes from the host; every completed line is handled.
    pub fn feed(&mut self, bytes: &[u8]) -> io::Result<()> {
        for event in self.lines.feed(bytes) {
            match event {
                LineEvent::Line(line) => self.handle_line(&line)?,
                LineEvent::TooLong => {
                    warn!("host line exceeds {} bytes, discarding", MAX_LINE_LEN);
                    self.reply_error(&HostError::InputTooLong)?;
                }
            }
        }
        Ok(())
    }

    /// Handle one request line and write its reply.
    pub fn handle_line(&mut self, line: &str) -> io::Result<()> {
        debug!("host request: {} bytes", line.len());
        match parse_command(line) {
            Ok(Command::Send { data }) => self.handle_send(data.as_deref()),
            Ok(Command::Status) => self.handle_status(),
            Err(e) => {
                debug!("rejecting host line: {}", e);
                self.reply_error(&e)
            }
        }
    }

    fn handle_send(&mut self, data: Option<&str>) -> io::Result<()> {
        let max = self.engine.config().max_message_size();
        let payload = match decode_payload(data, max) {
            Ok(payload) => payload,
            Err(e) => return self.reply_error(&e),
        };

        let result = self.engine.send(&payload);
        self.flush_events()?;

        match result {
            Ok(report) => write_line(&mut self.out, &OkReply::new(SendData::from(report))),
            Err(e) => self.reply_error(&HostError::from(e)),
        }
    }

    fn handle_status(&mut self) -> io::Result<()> {
        let status = self.status();
        write_line(&mut self.out, &OkReply::new(status))
    }

    /// Counters and radio configuration.
    pub fn status(&self) -> StatusData {
        StatusData::new(&self.settings, &self.engine.stats().snapshot())
    }

    /// Service the radio for up to `timeout`, emitting any completed messages.
    ///
    /// Radio errors are logged and the call sleeps out the timeout.
    pub fn poll(&mut self, timeout: Duration) -> io::Result<()> {
        if let Err(e) = self.engine.poll(timeout) {
            warn!("radio poll failed: {}", e);
            thread::sleep(timeout);
        }
        self.flush_events()
    }

    fn flush_events(&mut self) -> io::Result<()> {
        for delivery in self.engine.take_deliveries() {
            write_line(&mut self.out, &RxEvent::from(&delivery))?;
        }
        Ok(())
    }

    fn reply_error(&mut self, error: &HostError) -> io::Result<()> {
        write_line(&mut self.out, &error.to_reply())
    }
}
