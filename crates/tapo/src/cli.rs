use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Parses a duration literal: `1s`, `750ms`, or a bare number of seconds.
pub fn parse_duration(arg: &str) -> Result<Duration, String> {
    let arg = arg.trim();
    if let Some(millis) = arg.strip_suffix("ms") {
        millis
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| format!("invalid duration: '{}'", arg))
    } else if let Some(secs) = arg.strip_suffix('s') {
        secs.parse()
            .map(Duration::from_secs)
            .map_err(|_| format!("invalid duration: '{}'", arg))
    } else {
        arg.parse()
            .map(Duration::from_secs)
            .map_err(|_| format!("invalid duration: '{}'", arg))
    }
}

/// TP-Link Tapo smart plug client (KLAP protocol)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// TP-Link cloud account email.
    /// Can also be set via the TAPO_EMAIL environment variable.
    #[arg(long, env = "TAPO_EMAIL")]
    pub email: String,

    /// TP-Link cloud account password.
    /// Can also be set via the TAPO_PASSWORD environment variable.
    #[arg(long, env = "TAPO_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Device IPv4 address
    #[arg(long)]
    pub ip: String,

    /// Command to execute
    #[arg(long, value_enum, default_value = "device-info")]
    pub command: Command,

    /// Pause around handshake phase 2 (e.g. "1s", "500ms").
    /// The device silently rejects sessions set up faster than ~500ms.
    #[arg(long, value_parser = parse_duration, default_value = "1s")]
    pub handshake_duration: Duration,
}

/// Supported device commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Command {
    /// Query device metadata and relay state
    DeviceInfo,
    /// Turn the relay on
    On,
    /// Turn the relay off
    Off,
    /// Query energy-metering counters
    EnergyUsage,
}
