//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use ppa_core::config::{DEFAULT_COMPONENT_ID, DEFAULT_PORT};

/// PPA CLI - discover and control PPA amplifiers on the local network
#[derive(Parser, Debug)]
#[command(name = "ppa-cli")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format (one object per line)
    #[arg(long, global = true)]
    pub json: bool,

    /// UDP port the devices listen on
    #[arg(short, long, global = true, default_value_t = DEFAULT_PORT, env = "PPA_PORT")]
    pub port: u16,

    /// Component id put in outgoing headers (decimal or 0x-prefixed hex)
    #[arg(
        short,
        long,
        global = true,
        default_value_t = DEFAULT_COMPONENT_ID,
        value_parser = parse_u8
    )]
    pub component_id: u8,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch for devices answering broadcast pings
    Discover(DiscoverArgs),

    /// Ping devices every 5 seconds and print their replies
    Ping(PingArgs),

    /// Recall a preset by index
    Recall(RecallArgs),

    /// Set the master volume
    Volume(VolumeArgs),

    /// Run a simulated device
    Simulate(SimulateArgs),
}

/// Which devices a command talks to.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Device addresses, comma separated (host or host:port)
    #[arg(short, long, value_delimiter = ',')]
    pub addresses: Vec<String>,

    /// Also address every device found by broadcast discovery
    #[arg(short, long)]
    pub discover: bool,

    /// Restrict discovery to these interfaces (repeatable)
    #[arg(short, long = "interface")]
    pub interfaces: Vec<String>,
}

// ==================== Discover ====================

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Restrict discovery to these interfaces (repeatable)
    #[arg(short, long = "interface")]
    pub interfaces: Vec<String>,

    /// Stop after this many seconds and print a summary (default: run until Ctrl+C)
    #[arg(short, long)]
    pub duration: Option<u64>,
}

// ==================== Ping ====================

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Print a hex dump of every received datagram
    #[arg(long)]
    pub dump: bool,
}

// ==================== Recall ====================

#[derive(Args, Debug)]
pub struct RecallArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Preset index to recall
    #[arg(long)]
    pub preset: u8,

    /// Keep recalling every 5 seconds, cycling through presets 0-4
    #[arg(short = 'l', long = "loop")]
    pub repeat: bool,
}

// ==================== Volume ====================

#[derive(Args, Debug)]
pub struct VolumeArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Master volume between 0.0 and 1.0
    #[arg(long)]
    pub volume: f32,

    /// Resend the volume every 5 seconds
    #[arg(short = 'l', long = "loop")]
    pub repeat: bool,
}

// ==================== Simulate ====================

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    pub address: String,

    /// Bind the socket to this interface
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Device unique id as 8 hex digits
    #[arg(long, default_value = "00010203", value_parser = parse_unique_id)]
    pub unique_id: [u8; 4],
}

/// Parse a byte given in decimal or `0x` hex.
pub fn parse_u8(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid byte '{}': {}", s, e))
}

/// Parse a 4-byte device id written as 8 hex digits.
pub fn parse_unique_id(s: &str) -> Result<[u8; 4], String> {
    let hex = s.trim_start_matches("0x");
    if hex.len() != 8 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("unique id '{}' must be 8 hex digits", s));
    }

    let mut id = [0u8; 4];
    for (i, byte) in id.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| format!("invalid unique id '{}': {}", s, e))?;
    }
    Ok(id)
}
