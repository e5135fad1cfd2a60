//! Host-side link endpoint.
//!
//! Speaks the JSON-lines protocol on stdin/stdout and carries messages to a
//! peer endpoint over a UDP datagram link standing in for the LoRa air
//! interface. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Terminal 1
//! cargo run --bin linkmaster -- --local 127.0.0.1:4700 --peer 127.0.0.1:4701
//! # Terminal 2
//! cargo run --bin linkmaster -- --local 127.0.0.1:4701 --peer 127.0.0.1:4700
//! ```
//!
//! Then type `{"cmd":"LORA_SEND","data":"aGVsbG8="}` into either terminal.

use clap::Parser;
use linkmaster_lora::lora::UdpRadio;
use linkmaster_lora::stats_server::StatsServer;
use linkmaster_lora::{HostAdapter, LinkConfig, LinkEngine, LinkStats, RadioSettings};
use log::{error, info, warn};
use std::error::Error;
use std::io::{self, Read};
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long each idle radio poll waits between host input checks.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Reliable LoRa link endpoint (JSON lines on stdin/stdout)
#[derive(Parser, Debug)]
#[command(name = "linkmaster")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local UDP address of the radio link
    #[arg(long, default_value = "127.0.0.1:4700")]
    local: String,

    /// UDP address of the peer endpoint
    #[arg(long, default_value = "127.0.0.1:4701")]
    peer: String,

    /// Serve link counters at http://0.0.0.0:<PORT>/stats
    #[arg(long)]
    stats_port: Option<u16>,

    /// Wait for an acknowledgement per attempt, in milliseconds
    #[arg(long, default_value_t = 3000)]
    ack_timeout_ms: u64,

    /// Retransmissions per frame after the first attempt
    #[arg(long, default_value_t = 3)]
    retries: u8,

    /// Drop partial inbound messages idle this long, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    reassembly_timeout_ms: u64,

    /// Do not redeliver a DATA frame repeating the last sequence number
    #[arg(long)]
    suppress_duplicates: bool,
}

impl Cli {
    fn link_config(&self) -> LinkConfig {
        LinkConfig {
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            max_retries: self.retries,
            reassembly_timeout: Duration::from_millis(self.reassembly_timeout_ms),
            suppress_duplicate_data: self.suppress_duplicates,
            ..LinkConfig::default()
        }
    }
}

fn main() -> ExitCode {
    // stdout carries the host protocol; env_logger writes to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = cli.link_config();
    config.validate()?;

    let settings = RadioSettings::default();
    let params = settings.airtime_params();
    if !config.ack_timeout_fits(&params) {
        warn!(
            "ack timeout {:?} is shorter than a full-size frame round trip ({:?})",
            config.ack_timeout,
            LinkConfig::minimum_ack_timeout(&params)
        );
    }

    let radio = UdpRadio::bind(cli.local.as_str(), cli.peer.as_str())?;
    let stats = Arc::new(LinkStats::new());

    // Kept alive for Drop
    let _stats_server = cli.stats_port.and_then(|port| {
        match StatsServer::start(None, port, stats.clone()) {
            Ok(server) => Some(server),
            Err(e) => {
                warn!("Failed to start stats server: {}", e);
                None
            }
        }
    });

    let engine = LinkEngine::with_stats(radio, config, stats);
    let mut adapter = HostAdapter::new(engine, settings, io::stdout().lock());
    adapter.write_boot()?;

    let input = spawn_input_reader();
    loop {
        loop {
            match input.try_recv() {
                Ok(chunk) => adapter.feed(&chunk)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("host input closed, exiting");
                    return Ok(());
                }
            }
        }
        adapter.poll(IDLE_POLL)?;
    }
}

/// Read stdin on its own thread so the radio keeps being polled.
fn spawn_input_reader() -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
