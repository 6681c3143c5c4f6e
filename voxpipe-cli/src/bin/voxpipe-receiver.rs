//! Voxpipe Receiver - decrypts incoming RTP voice datagrams
//!
//! Authenticates and decrypts every datagram on the listen address, reports
//! statistics and optionally writes the recovered Opus frames out in the
//! same length-prefixed format the sender reads.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use voxpipe::source;
use voxpipe_cli::{display_compact_stats, init_tracing, Config, ReceiverConfig, ReceiverStats};
use voxpipe_crypto::DecryptionStrategy;
use voxpipe_io::{Transport, UdpTransport};

/// Receive buffer; larger than any datagram the sender produces
const RECV_BUFFER_SIZE: usize = 4096;

#[derive(Parser, Debug)]
#[command(name = "voxpipe-receiver")]
#[command(about = "Encrypted RTP voice receiver", long_about = None)]
struct Args {
    /// Configuration file with a [receiver] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Write decrypted frames here ('-' for stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Print an example configuration and exit
    #[arg(long)]
    example_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> anyhow::Result<ReceiverConfig> {
    let Some(path) = &args.config else {
        anyhow::bail!("A configuration file is required (see --example-config)");
    };

    let mut config = Config::from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?
        .receiver
        .with_context(|| format!("{} has no [receiver] table", path.display()))?;

    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(output) = &args.output {
        config.output = Some(output.clone());
    }
    Ok(config)
}

async fn open_output(output: Option<&str>) -> anyhow::Result<Option<Box<dyn AsyncWrite + Unpin + Send>>> {
    match output {
        None => Ok(None),
        Some("-") => Ok(Some(Box::new(tokio::io::stdout()))),
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path))?;
            Ok(Some(Box::new(file)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.example_config {
        print!("{}", toml::to_string_pretty(&Config::example_receiver())?);
        return Ok(());
    }

    let config = load_config(&args)?;
    let mut suite = config.session()?.crypto_suite()?;
    let transport = UdpTransport::bind(config.listen, config.listen)?;
    let mut output = open_output(config.output.as_deref()).await?;

    tracing::info!("Voxpipe receiver starting...");
    tracing::info!(listen = %transport.local_addr()?, suite = %config.suite, "Listening");

    let show_stats = config.stats_interval().is_some();
    let mut ticker = tokio::time::interval(config.stats_interval().unwrap_or(Duration::from_secs(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut stats = ReceiverStats::default();
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let started = Instant::now();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Interrupted, stopping...");
                break;
            }
            _ = ticker.tick(), if show_stats => {
                display_compact_stats(&stats, started.elapsed());
            }
            received = transport.receive(&mut buf) => {
                let (n, from) = received?;
                match suite.decrypt(&buf[..n]) {
                    Ok(packet) => {
                        stats.record(packet.header.sequence, n);
                        tracing::trace!(%from, seq = packet.header.sequence, ts = packet.header.timestamp, "packet");

                        if let Some(out) = output.as_mut() {
                            let mut framed = Vec::with_capacity(packet.body.len() + 2);
                            source::encode_frame(Some(&packet.body[..]), &mut framed)?;
                            out.write_all(&framed).await?;
                        }
                    }
                    Err(e) => {
                        stats.record_rejected();
                        tracing::debug!(%from, error = %e, "Dropping datagram");
                    }
                }
            }
        }
    }

    if let Some(out) = output.as_mut() {
        out.flush().await?;
    }
    display_compact_stats(&stats, started.elapsed());
    eprintln!();
    Ok(())
}
