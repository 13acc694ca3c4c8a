use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for ChatRelay
#[derive(Parser, Debug)]
#[command(
    name = "chatrelay",
    version = env!("CARGO_PKG_VERSION"),
    about = "Multi-client TCP chat relay",
    long_about = "A line-oriented chat relay: the server rebroadcasts every line a client sends to all other connected clients, the client reads broadcasts and sends typed lines concurrently."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat relay server
    Server(ServerArgs),
    /// Connect to a chat relay server
    Client(ClientArgs),
    /// Configuration management commands
    Config(ConfigArgs),
}

/// Server arguments
#[derive(ClapArgs, Debug)]
pub struct ServerArgs {
    /// Listening port (defaults to the configured port, 1025)
    pub port: Option<u16>,
}

/// Client arguments
#[derive(ClapArgs, Debug)]
pub struct ClientArgs {
    /// Server host (defaults to the configured host, localhost)
    pub host: Option<String>,
    /// Server port (defaults to the configured port, 1025)
    pub port: Option<u16>,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Create a project configuration in the current directory
    Init,
    /// Show where configuration files are looked up
    Path,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// TOML text output
    Text,
    /// JSON output
    Json,
}
