//! Audio Sender Application
//!
//! Captures the VB-Cable output device and streams raw PCM to one or more
//! receivers over UDP, with a text menu to pause/resume or exit.

use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cable_streamer::{
    audio::{list_input_devices, CpalBackend},
    config::AppConfig,
    StreamConfig, StreamEngine, StreamWorker,
};

/// Stream the VB-Cable capture device to LAN receivers over UDP
#[derive(Debug, Parser)]
#[command(name = "sender", author, version)]
struct CliArgs {
    /// Load settings from a TOML file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Destination UDP port (default 12345)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Input device name fragment (default "CABLE Output")
    #[arg(short, long, value_name = "NAME")]
    device: Option<String>,

    /// Save the effective settings and continue
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Print input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Receiver IP addresses; prompted for when none are configured
    #[arg(value_name = "IP")]
    destinations: Vec<String>,
}

fn print_banner() {
    println!(
        r"
 _____       _ _     _____
|  _  |_ _ _| |_|___|   __|___ ___ _ _
|     | | | . | | . |__   | -_|  _| | |
|__|__|___|___|_|___|_____|___|_|   _/
                                  |___|
"
    );
}

fn print_menu() {
    println!("\n=== Audio Streamer Menu ===");
    println!("1. Pause/Resume");
    println!("2. Exit");
    println!("===========================");
    prompt("Enter your choice: ");
}

fn prompt(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

fn print_devices() {
    println!("\n=== Available Input Devices ===");
    match list_input_devices() {
        Ok(devices) if devices.is_empty() => println!("  (none)"),
        Ok(devices) => {
            for device in &devices {
                let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
                println!("  #{} {}{}", device.index, device.name, default_marker);
                println!("    Sample rates: {:?}", device.sample_rates);
                println!("    Channels: {:?}", device.channels);
            }
        }
        Err(e) => println!("  Failed to enumerate devices: {}", e),
    }
    println!();
}

/// Forward console lines from a plain thread.
///
/// A blocking stdin read cannot be cancelled, so it must not live on the
/// runtime's blocking pool: shutdown would wait for the next Enter press.
/// The thread is left detached and dies with the process.
fn spawn_console_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to start console reader")?;
    Ok(rx)
}

async fn read_line(input: &mut mpsc::UnboundedReceiver<String>) -> Result<String> {
    input
        .recv()
        .await
        .map(|line| line.trim().to_string())
        .context("stdin closed")
}

/// Ask for the number of receivers, then each receiver's IP
async fn prompt_destinations(input: &mut mpsc::UnboundedReceiver<String>) -> Result<Vec<String>> {
    prompt("Enter the number of target IP addresses: ");
    let count: usize = read_line(input)
        .await?
        .parse()
        .context("expected a number")?;
    if count == 0 {
        bail!("Number of IP addresses must be greater than 0.");
    }

    let mut destinations = Vec::with_capacity(count);
    while destinations.len() < count {
        prompt(&format!("Enter IP address {}: ", destinations.len() + 1));
        let ip = read_line(input).await?;
        if ip.parse::<IpAddr>().is_ok() {
            destinations.push(ip);
        } else {
            println!("\"{}\" is not a valid IP address, try again.", ip);
        }
    }

    Ok(destinations)
}

/// Resolves once the engine thread has exited
async fn engine_exited(worker: &StreamWorker) {
    while !worker.is_finished() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Why the menu loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuExit {
    /// Option 2 was chosen
    Requested,
    /// stdin reached end of file
    InputClosed,
    /// The engine stopped by itself, or through Ctrl+C
    EngineExited,
}

async fn run_menu(worker: &StreamWorker, input: &mut mpsc::UnboundedReceiver<String>) -> MenuExit {
    loop {
        print_menu();
        tokio::select! {
            line = input.recv() => match line {
                Some(choice) => match choice.trim() {
                    "1" => {
                        if worker.pause_resume() {
                            println!("Audio stream paused.");
                        } else {
                            println!("Audio stream resumed.");
                        }
                    }
                    "2" => {
                        worker.stop();
                        return MenuExit::Requested;
                    }
                    _ => println!("Invalid choice. Please enter a valid option."),
                },
                None => {
                    worker.stop();
                    return MenuExit::InputClosed;
                }
            },
            _ = engine_exited(worker) => {
                println!();
                return MenuExit::EngineExited;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::load_or_default()?,
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();
    print_devices();
    if args.list_devices {
        return Ok(ExitCode::SUCCESS);
    }

    if !args.destinations.is_empty() {
        config.network.destinations = args.destinations;
    }
    if let Some(port) = args.port {
        config.network.port = port;
    }
    if let Some(device) = args.device {
        config.audio.device_match = device;
    }

    let mut input = spawn_console_reader()?;
    if config.network.destinations.is_empty() {
        config.network.destinations = prompt_destinations(&mut input).await?;
    }

    if let Some(path) = &args.write_config {
        config.save(path)?;
        tracing::info!("Saved settings to {}", path.display());
    }

    let stream_config = StreamConfig::from_app_config(&config)?;
    tracing::info!(
        "Streaming \"{}\" to {:?} on port {}",
        stream_config.device_match(),
        stream_config.destinations(),
        stream_config.port()
    );

    let engine = StreamEngine::new(stream_config, CpalBackend::new())?;
    let worker = StreamWorker::spawn(engine)?;
    let control = worker.control().clone();

    {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                control.stop();
            }
        });
    }

    let exit = run_menu(&worker, &mut input).await;
    tracing::debug!("Menu closed: {:?}", exit);

    let result = tokio::task::spawn_blocking(move || worker.join()).await?;
    let stats = control.stats();
    println!(
        "Stream stopped: {} buffers captured, {} datagrams sent, {} send failures.",
        stats.buffers_captured, stats.datagrams_sent, stats.send_failures
    );

    // The engine has already logged the cause of a failed session
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
