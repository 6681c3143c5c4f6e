//! Voxpipe Sender - paced, encrypted RTP voice sender
//!
//! Reads length-prefixed Opus frames from a file or stdin and sends them to a
//! media server every 20ms.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use voxpipe::source;
use voxpipe::{FramePacer, LocalSession, PacketProvider};
use voxpipe_cli::{display_pacer_stats, generate_key, init_tracing, Config, SenderConfig};
use voxpipe_io::{discover_address, UdpTransport, DISCOVERY_TIMEOUT};

#[derive(Parser, Debug)]
#[command(name = "voxpipe-sender")]
#[command(about = "Encrypted RTP voice sender", long_about = None)]
struct Args {
    /// Configuration file with a [sender] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input: file of length-prefixed Opus frames, '-' for stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Media server address
    #[arg(short, long)]
    remote: Option<SocketAddr>,

    /// Print an example configuration and exit
    #[arg(long)]
    example_config: bool,

    /// Print fresh base64 key material for SUITE and exit
    #[arg(long, value_name = "SUITE")]
    generate_key: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> anyhow::Result<SenderConfig> {
    let Some(path) = &args.config else {
        anyhow::bail!("A configuration file is required (see --example-config)");
    };

    let mut config = Config::from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?
        .sender
        .with_context(|| format!("{} has no [sender] table", path.display()))?;

    if let Some(input) = &args.input {
        config.input = input.clone();
    }
    if let Some(remote) = args.remote {
        config.remote = remote;
    }
    Ok(config)
}

async fn open_input(input: &str) -> anyhow::Result<Box<dyn AsyncRead + Unpin + Send>> {
    if input == "-" {
        tracing::info!("Reading frames from stdin");
        Ok(Box::new(tokio::io::stdin()))
    } else {
        tracing::info!("Reading frames from {}", input);
        let file = tokio::fs::File::open(input)
            .await
            .with_context(|| format!("Failed to open {}", input))?;
        Ok(Box::new(file))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.example_config {
        print!("{}", toml::to_string_pretty(&Config::example_sender())?);
        return Ok(());
    }
    if let Some(suite) = &args.generate_key {
        println!("{}", generate_key(suite)?);
        return Ok(());
    }

    let config = load_config(&args)?;
    let session = config.session()?;
    let suite = session.crypto_suite()?;

    tracing::info!("Voxpipe sender starting...");
    tracing::info!(remote = %config.remote, ssrc = session.ssrc, suite = %session.suite, "Session");

    let transport = match config.bind {
        Some(local) => UdpTransport::bind(local, config.remote)?,
        None => UdpTransport::connect(config.remote)?,
    };

    if config.discovery {
        let external =
            discover_address(&transport, config.remote, session.ssrc, DISCOVERY_TIMEOUT).await?;
        tracing::info!(%external, "External address");
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping...");
            interrupt.cancel();
        }
    });

    let input = open_input(&config.input).await?;
    let provider = PacketProvider::new(session.ssrc, suite);
    let mut pacer = FramePacer::new(provider, transport, LocalSession).with_cancellation(cancel);

    let started = Instant::now();
    let stats = pacer.run(source::length_prefixed(input)).await?;

    if config.stats {
        display_pacer_stats(&stats, started.elapsed());
    }
    Ok(())
}
