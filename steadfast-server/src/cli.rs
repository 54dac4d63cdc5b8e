use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "steadfast",
    about = "Steadfast - resilient data-access daemon",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "STEADFAST_PORT", default_value = "8050")]
    pub port: u16,

    #[arg(long, env = "STEADFAST_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the HTTP server (default if no command specified)")]
    Serve {
        #[arg(short, long, env = "STEADFAST_PORT", default_value = "8050")]
        port: u16,
    },

    #[command(about = "Probe the primary transport once; exit code reflects the result")]
    Probe,

    #[command(subcommand, about = "View configuration")]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show current configuration")]
    Show {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },
}
