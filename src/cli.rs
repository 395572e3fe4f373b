//! Command-line interface definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CliOverrides;

/// Local media server for the video recording kiosk
#[derive(Debug, Parser)]
#[command(name = "kiosk-recorder", version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the server and present the kiosk content until closed
    Run(ServeArgs),
    /// Start only the server, until SIGINT/SIGTERM
    Serve(ServeArgs),
    /// Print the content the kiosk window would show
    Resolve(ServeArgs),
    /// Print the effective configuration
    Info(ServeArgs),
}

/// Options shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Config file (default: ./kiosk.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(long)]
    pub bind: Option<String>,

    /// Directory for uploaded recordings
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Directory served at / in production
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Development mode: show and proxy the front-end dev server
    #[arg(long)]
    pub dev: bool,

    /// Front-end dev server origin
    #[arg(long)]
    pub dev_server_url: Option<String>,

    /// Maximum upload size in MiB
    #[arg(long)]
    pub max_upload_mb: Option<usize>,

    /// Request body read timeout in seconds
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Response write timeout in seconds
    #[arg(long)]
    pub write_timeout: Option<u64>,

    /// Keep-alive idle timeout in seconds
    #[arg(long)]
    pub idle_timeout: Option<u64>,
}

impl ServeArgs {
    /// Values to layer over the config file
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port,
            bind: self.bind.clone(),
            upload_dir: self.upload_dir.clone(),
            static_dir: self.static_dir.clone(),
            dev: self.dev,
            dev_server_url: self.dev_server_url.clone(),
            max_upload_mb: self.max_upload_mb,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            idle_timeout: self.idle_timeout,
        }
    }
}

impl Commands {
    /// Shared options of whichever subcommand was chosen
    pub fn args(&self) -> &ServeArgs {
        match self {
            Commands::Run(args)
            | Commands::Serve(args)
            | Commands::Resolve(args)
            | Commands::Info(args) => args,
        }
    }
}
