use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use ble_thermometer::config::AppConfig;
use ble_thermometer::core::Reading;
use ble_thermometer::state::ThermometerContext;
use ble_thermometer::{commands, logging};
use clap::{Parser, Subcommand};
use log::info;

#[derive(Parser, Debug)]
#[command(version, about = "Talk to a BLE thermometer")]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level, overrides the configured one
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List nearby thermometers
    Scan {
        /// Scan duration in seconds
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Print one reading
    Read {
        #[arg(long)]
        address: String,
        /// Seconds to wait for each step
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
    /// Toggle between Celsius and Fahrenheit
    Unit {
        #[arg(long)]
        address: String,
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
    /// Toggle between body and surface mode
    Mode {
        #[arg(long)]
        address: String,
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
    /// Write the default configuration file
    InitConfig,
}

fn print_reading(reading: &Reading) -> Result<()> {
    println!("{}", serde_json::to_string(reading)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };

    if let Command::InitConfig = cli.command {
        let _ = logging::init(cli.log_level.as_deref().unwrap_or("info"));
        commands::init_config(&config_path).await?;
        println!("{}", config_path.display());
        return Ok(());
    }

    let config = AppConfig::load_config(&config_path).await?;
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    if let Err(e) = logging::init(&level) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let context = ThermometerContext::new(config).await?;
    let result = run(&context, cli.command).await;
    context.close();
    result
}

async fn run(context: &ThermometerContext, command: Command) -> Result<()> {
    match command {
        Command::Scan { duration } => {
            let secs = duration.unwrap_or(context.config.scan.duration_secs);
            let devices = commands::scan_devices(context, Duration::from_secs(secs)).await?;
            info!("Scan finished, {} device(s) found", devices.len());
        }
        Command::Read { address, wait } => {
            let wait = Duration::from_secs(wait);
            commands::connect_to_device(context, &address, wait).await?;
            print_reading(&commands::read_temperature(context, wait).await?)?;
        }
        Command::Unit { address, wait } => {
            let wait = Duration::from_secs(wait);
            commands::connect_to_device(context, &address, wait).await?;
            let (before, after) = commands::change_unit(context, wait).await?;
            print_reading(&before)?;
            print_reading(&after)?;
        }
        Command::Mode { address, wait } => {
            let wait = Duration::from_secs(wait);
            commands::connect_to_device(context, &address, wait).await?;
            let (before, after) = commands::change_mode(context, wait).await?;
            print_reading(&before)?;
            print_reading(&after)?;
        }
        Command::InitConfig => {}
    }
    context.manager.disconnect();
    Ok(())
}
