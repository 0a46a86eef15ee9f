//! powermate CLI: probe and watch a Griffin PowerMate.

mod hidapi_host;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hidapi_host::HidapiHost;
use powermate_core::classify::ClassifyStrategy;
use powermate_core::config::{self, SessionConfig};
use powermate_core::device::SelectionPolicy;
use powermate_core::dispatch::{DispatchSink, Dispatched, StopToken};
use powermate_core::host::DeviceHandle;
use powermate_core::queue::ValueEvent;
use powermate_core::session::{self, Session};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "powermate",
    version,
    about = "Watch a Griffin PowerMate's button and dial over USB HID"
)]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Options {
    /// JSON session configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// USB vendor ID (hex with 0x prefix, or decimal).
    #[arg(long, global = true)]
    vid: Option<String>,
    /// USB product ID (hex with 0x prefix, or decimal).
    #[arg(long, global = true)]
    pid: Option<String>,
    /// Event queue capacity (1-4096).
    #[arg(long, global = true)]
    capacity: Option<usize>,
    /// Fail instead of picking the first device when several match.
    #[arg(long, global = true)]
    strict: bool,
    /// Classify elements by usage instead of position.
    #[arg(long, global = true)]
    semantic: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List matching devices and their elements, and switch the LED off.
    Probe,
    /// Print button and dial events until interrupted (default).
    Watch,
}

/// Prints dispatched events as plain lines on stdout.
struct StdoutSink;

impl DispatchSink for StdoutSink {
    fn device_matched(&mut self, device: &DeviceHandle) {
        println!("Device attached: {}", device.path);
    }

    fn device_removed(&mut self, device: &DeviceHandle) {
        println!("Device removed: {}", device.path);
    }

    fn dispatched(&mut self, _event: &ValueEvent, outcome: &Dispatched) {
        println!("{outcome}");
    }
}

fn build_config(options: &Options) -> Result<SessionConfig> {
    let config = match &options.config {
        Some(path) => config::load_config(path)?,
        None => SessionConfig::default(),
    };
    apply_overrides(config, options)
}

/// Command-line flags win over the configuration file.
fn apply_overrides(mut config: SessionConfig, options: &Options) -> Result<SessionConfig> {
    if let Some(vid) = &options.vid {
        config.identity.vendor_id = config::parse_usb_id(vid)?;
    }
    if let Some(pid) = &options.pid {
        config.identity.product_id = config::parse_usb_id(pid)?;
    }
    if let Some(capacity) = options.capacity {
        config.queue_capacity = capacity;
    }
    if options.strict {
        config.selection = SelectionPolicy::Unique;
    }
    if options.semantic {
        config.classification = ClassifyStrategy::Semantic;
    }
    config.validate()?;
    Ok(config)
}

fn probe(config: &SessionConfig) -> Result<()> {
    let mut host = HidapiHost::new()?;
    let report = session::probe(&mut host, config.identity)?;

    println!("Device count: {}", report.devices.len());
    for device in &report.devices {
        println!("Element count: {}", device.element_count);
        for element in &device.scanned {
            println!("{}", element.describe());
        }
    }
    Ok(())
}

fn watch(config: &SessionConfig) -> Result<()> {
    let stop = StopToken::new();
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_stop.stop()) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    let mut host = HidapiHost::new()?;
    let session = Session::open(&mut host, config)?;
    let name = session
        .info
        .model
        .map(|m| m.name().to_string())
        .or_else(|| session.info.product.clone())
        .unwrap_or_else(|| "HID device".to_string());
    println!("Watching {name} ({}, path: {})", config.identity, session.device.path);

    let summary = session
        .into_loop(&mut host, config)
        .run(&mut StdoutSink, &stop)
        .context("dispatch loop failed")?;
    if summary.dropped > 0 {
        println!("{} events lost to queue overflow", summary.dropped);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli.options)?;
    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Probe => probe(&config),
        Commands::Watch => watch(&config),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(Cli::parse()) {
        println!("Error: {e:#}");
        std::process::exit(1);
    }
}
