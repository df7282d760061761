//! fm96 - FM stereo MPX encoder.

mod args;

use anyhow::Context;
use args::Cli;
use clap::Parser;
use fm96_core::StereoEncoder;
use fm96_io::{CancelToken, CpalBackend, Ports, RealtimeLoop, SystemBackend};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "fm96 (an FM processor) version {}",
        env!("CARGO_PKG_VERSION")
    );

    if cli.list_devices {
        return list_devices();
    }

    let config = cli.resolve().context("invalid configuration")?;
    tracing::info!(
        stereo = config.stereo,
        sample_rate = config.sample_rate,
        input = %config.input,
        output = %config.output,
        mpx = %config.mpx.as_ref().map_or_else(|| "none".to_string(), ToString::to_string),
        "configuration"
    );

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install signal handler")?;

    let backend = SystemBackend::new();
    let ports = Ports::open(&backend, &config)?;

    let mut engine = RealtimeLoop::new(StereoEncoder::new(&config.encoder_settings()));
    let summary = engine.run(ports, &cancel)?;

    tracing::info!(
        seconds = summary.frames as f64 / f64::from(config.sample_rate),
        "done"
    );
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    let devices = CpalBackend::new().list_devices()?;

    if devices.is_empty() {
        println!("No audio devices found.");
        return Ok(());
    }

    let inputs: Vec<_> = devices.iter().filter(|d| d.is_input).collect();
    if !inputs.is_empty() {
        println!("Input Devices:");
        for device in &inputs {
            println!("  {} ({} Hz)", device.name, device.default_sample_rate);
        }
        println!();
    }

    let outputs: Vec<_> = devices.iter().filter(|d| d.is_output).collect();
    if !outputs.is_empty() {
        println!("Output Devices:");
        for device in &outputs {
            println!("  {} ({} Hz)", device.name, device.default_sample_rate);
        }
        println!();
    }

    println!("Use any part of a device name with --input, --output or --mpx.");
    Ok(())
}
