mod cli;

use clap::Parser;
use tapo_core::{Tapo, TapoOptions};

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::DEBUG)
            .init();
    }

    let options = TapoOptions::new().with_handshake_delay(cli.handshake_duration);

    let mut plug = match Tapo::connect(&cli.ip, &cli.email, &cli.password, options).await {
        Ok(plug) => plug,
        Err(e) => {
            eprintln!("Error: Could not connect to {}: {}", cli.ip, e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::DeviceInfo => plug.device_info().await,
        Command::On => plug.turn_on().await,
        Command::Off => plug.turn_off().await,
        Command::EnergyUsage => plug.energy_usage().await,
    };

    match result {
        Ok(response) => match serde_json::to_string(&response) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: Failed to serialize response: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
