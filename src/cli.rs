use std::path::PathBuf;

use clap::Parser;

/// xarb — inter-exchange order book arbitrage monitor.
#[derive(Parser, Debug)]
#[command(name = "xarb", version)]
pub struct Cli {
    /// Path to the JSON config file.
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
