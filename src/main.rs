use std::path::PathBuf;

use anyhow::{Result, anyhow};
use ble_explorer_lib::commands;
use ble_explorer_lib::config::AppConfig;
use ble_explorer_lib::core::bluetooth::codec;
use ble_explorer_lib::core::bluetooth::constants::service_label;
use ble_explorer_lib::core::bluetooth::{CharacteristicInfo, SelectedSession};
use ble_explorer_lib::logging;
use ble_explorer_lib::state::AppState;
use clap::{Parser, Subcommand};
use log::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "ble-explorer")]
#[command(about = "Discover BLE peripherals and read/write their characteristics")]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan and list nearby devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Service UUID to filter on (repeatable); `--filter any` disables filtering
        #[arg(short, long)]
        filter: Vec<String>,
    },
    /// Connect to a device and print its services and characteristics
    Inspect { device_id: String },
    /// Read a characteristic
    Read {
        device_id: String,
        service: String,
        characteristic: String,
    },
    /// Write text to a characteristic
    Write {
        device_id: String,
        service: String,
        characteristic: String,
        text: String,
    },
    /// Write the effective config to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::Debug } else { Level::Info };
    logging::setup_logging(level, None);

    let config_path = match args.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load(&config_path).await?;

    if let Command::InitConfig = args.command {
        return config.save(&config_path).await;
    }

    let app_state = AppState::new(config);
    let result = run(&app_state, args.command).await;

    if let Err(e) = commands::disconnect(&app_state).await {
        log::warn!("Cleanup failed: {}", e);
    }
    result
}

async fn run(app_state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Scan { duration, filter } => {
            let filter = if filter.is_empty() {
                None
            } else if filter.len() == 1 && filter[0] == "any" {
                Some(Vec::new())
            } else {
                Some(filter)
            };
            let devices = commands::scan_devices(app_state, duration, filter)
                .await
                .map_err(|e| anyhow!(e))?;
            info!("Scan finished with {} device(s)", devices.len());
            println!("Available Devices");
            for device in devices {
                let connectable = if device.is_connectable() { "connectable" } else { "-" };
                println!(
                    "  {:<40} {:<24} {:<17} rssi {:>4}  {}",
                    device.id,
                    device.display_name(),
                    device.address.as_deref().unwrap_or("-"),
                    device.rssi.map(|r| r.to_string()).unwrap_or_else(|| "?".into()),
                    connectable
                );
            }
        }
        Command::Inspect { device_id } => {
            let session = commands::inspect_device(app_state, &device_id)
                .await
                .map_err(|e| anyhow!(e))?;
            print_session(&session);
        }
        Command::Read {
            device_id,
            service,
            characteristic,
        } => {
            let chr = commands::read_characteristic(app_state, &device_id, &service, &characteristic)
                .await
                .map_err(|e| anyhow!(e))?;
            print_characteristic(&chr);
        }
        Command::Write {
            device_id,
            service,
            characteristic,
            text,
        } => {
            let chr = commands::write_characteristic(app_state, &device_id, &service, &characteristic, &text)
                .await
                .map_err(|e| anyhow!(e))?;
            print_characteristic(&chr);
        }
        Command::InitConfig => {}
    }
    Ok(())
}

fn print_session(session: &SelectedSession) {
    println!("{} ({})", session.device.display_name(), session.device.id);
    for detail in &session.details {
        println!("{}: {}", service_label(&detail.service.uuid), detail.service.uuid);
        for chr in &detail.characteristics {
            print_characteristic(chr);
        }
    }
}

fn print_characteristic(chr: &CharacteristicInfo) {
    println!("    Characteristic: {}", chr.uuid);
    println!("      Properties: {}", chr.properties.labels().join(", "));
    match chr.decoded_value() {
        Ok(bytes) if !bytes.is_empty() => {
            println!("      Value: {}", codec::to_text(&bytes));
            println!("      Hex: {}", codec::to_hex(&bytes));
            if let Some(number) = codec::to_integer(&bytes) {
                println!("      Integer: {}", number);
            }
        }
        Ok(_) => {}
        Err(e) => println!("      Value: <{}>", e),
    }
    if let Some(message) = &chr.message {
        println!("      Log: {}", message);
    }
}
