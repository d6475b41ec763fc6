// bandlink: desktop CLI for the band SDK
//
// Cross-platform (macOS, Linux, Windows) command-line interface: scan for the
// band, run the authentication handshake and read its sensors.

mod ble;
mod config;

use anyhow::{Context, Result};
use bandlink_core::{AuthOptions, Band, CompletionMode, DEFAULT_MEASUREMENT_TIMEOUT};
use clap::{Parser, Subcommand};
use colored::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bandlink")]
#[command(about = "bandlink: talk to your fitness band over Bluetooth LE", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List advertising Bluetooth LE devices
    Scan {
        /// Seconds to listen (defaults to scan_seconds)
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Authenticate with the band
    Auth {
        /// Per-attempt timeout in seconds, 0 waits forever
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Extra attempts after a rejected or timed-out handshake
        #[arg(short, long)]
        retries: Option<u32>,
        /// Wait for the band's verdict instead of the first response
        #[arg(long)]
        full: bool,
    },
    /// Show battery state
    Battery,
    /// Show device name, serial number and revisions
    Info,
    /// Show today's step counters
    Steps,
    /// Measure the heart rate
    HeartRate {
        /// Seconds to wait for a measurement
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Keep streaming realtime values until Ctrl-C
        #[arg(short, long)]
        watch: bool,
    },
    /// Print device events (taps on the band) until Ctrl-C
    Events,
    /// Show local authorization state and settings
    Status,
    /// Forget the stored authorization
    Forget,
    /// Remove the pairing with the band
    Unpair,
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Scan { seconds } => cmd_scan(seconds).await,
        Commands::Auth {
            timeout,
            retries,
            full,
        } => cmd_auth(timeout, retries, full).await,
        Commands::Battery => cmd_battery().await,
        Commands::Info => cmd_info().await,
        Commands::Steps => cmd_steps().await,
        Commands::HeartRate { timeout, watch } => cmd_heart_rate(timeout, watch).await,
        Commands::Events => cmd_events().await,
        Commands::Status => cmd_status(),
        Commands::Forget => cmd_forget(),
        Commands::Unpair => cmd_unpair().await,
        Commands::Config { action } => cmd_config(action),
    }
}

fn open_band(config: &config::Config) -> Result<Band> {
    let storage = config.storage_dir()?;
    std::fs::create_dir_all(&storage).context("Failed to create storage directory")?;
    Band::with_storage(&storage, config.band_config()).context("Failed to open band storage")
}

/// Find the configured band and attach it to a fresh `Band`
async fn connect_band(config: &config::Config) -> Result<Band> {
    let band = open_band(config)?;

    println!(
        "{} Looking for {}...",
        "→".cyan(),
        config.device_name.bright_white()
    );
    let peripheral =
        ble::find_band(&config.device_name, Duration::from_secs(config.scan_seconds)).await?;
    let link = ble::BtleLink::connect(peripheral).await?;
    band.connect(Arc::new(link));

    if let Some(id) = band.device_id() {
        println!("  {} Connected to {}", "✓".green(), id.dimmed());
    }
    Ok(band)
}

async fn cmd_scan(seconds: Option<u64>) -> Result<()> {
    let config = config::Config::load()?;
    let seconds = seconds.unwrap_or(config.scan_seconds);

    println!("{} Scanning for {}s...", "→".cyan(), seconds);
    let devices = ble::scan(Duration::from_secs(seconds)).await?;

    if devices.is_empty() {
        println!("{}", "No devices found".yellow());
        return Ok(());
    }

    for device in devices {
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "-".to_string());
        let name = if device.name == config.device_name {
            device.name.green().bold()
        } else {
            device.name.normal()
        };
        println!("  {:<24} {}  {}", name, device.address.dimmed(), rssi);
    }
    Ok(())
}

async fn cmd_auth(timeout: Option<u64>, retries: Option<u32>, full: bool) -> Result<()> {
    let config = config::Config::load()?;
    let band = connect_band(&config).await?;

    let mut options: AuthOptions = config.auth_options();
    if let Some(secs) = timeout {
        options.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(retries) = retries {
        options.retries = retries;
    }
    if full {
        options.completion = CompletionMode::Handshake;
    }

    if !band.is_authenticated() {
        println!("{}", "Tap the band when it vibrates to confirm pairing".yellow());
    }

    let result = band.authenticate_with(&options).await;
    band.disconnect().await?;

    if result.context("Authentication failed")? {
        println!("{} Band authenticated", "✓".green());
    } else if options.completion == CompletionMode::FirstFrame {
        println!(
            "{} Band answered but the handshake is not finished, retry with {}",
            "…".yellow(),
            "--full".bold()
        );
    } else {
        println!("{} Band rejected the handshake", "✗".red());
    }
    Ok(())
}

async fn cmd_battery() -> Result<()> {
    let config = config::Config::load()?;
    let band = connect_band(&config).await?;
    let battery = band.battery_state().await;
    band.disconnect().await?;
    let battery = battery.context("Failed to read battery")?;

    println!("{}", "Battery".bold());
    println!("  Level:       {}%", battery.charge_level);
    println!(
        "  Charging:    {}",
        if battery.is_charging {
            "yes".green()
        } else {
            "no".normal()
        }
    );
    match battery.last_charge {
        Some(ts) => println!("  Last charge: {}", ts),
        None => println!("  Last charge: {}", "unknown".dimmed()),
    }
    println!("  Cycles:      {}", battery.cycles);
    Ok(())
}

async fn cmd_info() -> Result<()> {
    let config = config::Config::load()?;
    let band = connect_band(&config).await?;
    let info = band.device_info().await;
    band.disconnect().await?;
    let info = info.context("Failed to read device info")?;

    println!("{}", "Device".bold());
    println!("  Name:     {}", info.device_name);
    println!("  Serial:   {}", info.serial_number);
    println!("  Hardware: {}", info.hardware_revision);
    println!("  Software: {}", info.software_revision);
    Ok(())
}

async fn cmd_steps() -> Result<()> {
    let config = config::Config::load()?;
    let band = connect_band(&config).await?;
    let steps = band.step_info().await;
    band.disconnect().await?;
    let steps = steps.context("Failed to read step counters")?;

    println!("{}", "Activity".bold());
    println!("  Steps:    {}", steps.steps);
    println!("  Distance: {} m", steps.distance);
    println!("  Calories: {} kcal", steps.calories);
    Ok(())
}

async fn cmd_heart_rate(timeout: Option<u64>, watch: bool) -> Result<()> {
    let config = config::Config::load()?;
    let band = connect_band(&config).await?;

    if !watch {
        let limit = timeout.map_or(DEFAULT_MEASUREMENT_TIMEOUT, Duration::from_secs);
        println!("{} Measuring, keep the band on your wrist...", "→".cyan());
        let bpm = band.heart_rate(limit).await;
        band.disconnect().await?;
        let bpm = bpm.context("Heart rate measurement failed")?;
        println!("  {} {} bpm", "♥".red(), bpm);
        return Ok(());
    }

    let mut samples = match band.start_realtime_heart_rate().await {
        Ok(samples) => samples,
        Err(e) => {
            band.disconnect().await?;
            return Err(e).context("Failed to start realtime heart rate");
        }
    };
    println!("{} Streaming heart rate, Ctrl-C to stop", "→".cyan());

    loop {
        tokio::select! {
            sample = samples.recv() => match sample {
                Some(bpm) => println!("  {} {} bpm", "♥".red(), bpm),
                None => {
                    println!("{}", "Band stopped sending values".yellow());
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Err(e) = band.stop_realtime_heart_rate().await {
        tracing::warn!("Failed to stop realtime heart rate: {}", e);
    }
    band.disconnect().await?;
    Ok(())
}

async fn cmd_events() -> Result<()> {
    let config = config::Config::load()?;
    let band = connect_band(&config).await?;

    let mut events = match band.subscribe_device_events().await {
        Ok(events) => events,
        Err(e) => {
            band.disconnect().await?;
            return Err(e).context("Failed to subscribe to device events");
        }
    };
    println!("{} Waiting for device events, Ctrl-C to stop", "→".cyan());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) if event.is_button_press() => {
                    println!("  {} Button pressed", "●".green());
                }
                Some(event) => println!(
                    "  Event 0x{:02x} {:?}",
                    event.code,
                    event.payload
                ),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    band.disconnect().await?;
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = config::Config::load()?;
    let band = open_band(&config)?;

    println!("{}", "Status".bold());
    println!("  Band:       {}", config.device_name);
    println!(
        "  Authorized: {}",
        if band.is_authenticated() {
            "yes".green()
        } else {
            "no".yellow()
        }
    );
    println!("  Storage:    {}", config.storage_dir()?.display());
    Ok(())
}

fn cmd_forget() -> Result<()> {
    let config = config::Config::load()?;
    let band = open_band(&config)?;
    band.forget_authorization()
        .context("Failed to clear authorization")?;
    println!("{} Authorization forgotten", "✓".green());
    Ok(())
}

async fn cmd_unpair() -> Result<()> {
    let config = config::Config::load()?;
    let band = connect_band(&config).await?;
    let result = band.unpair().await;
    if result.is_err() {
        band.disconnect().await?;
    }
    result.context("Failed to unpair")?;
    println!("{} Band unpaired", "✓".green());
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let mut config = config::Config::load()?;

    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} {} = {}", "✓".green(), key.bold(), value);
        }
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => println!("{}", "(not set)".dimmed()),
        },
        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            for (key, value) in config.list() {
                println!("  {:<22} {}", key, value);
            }
            println!();
            println!("  {}", config::Config::config_file()?.display().to_string().dimmed());
        }
    }
    Ok(())
}
