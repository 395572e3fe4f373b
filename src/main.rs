//! kiosk-recorder - local media server for a video recording kiosk
//!
//! CLI entry point

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use kiosk_recorder::{
    exit_codes, resolve_target, run, serve, Cli, Commands, HeadlessPresenter, KioskConfig,
    KioskError, ServeArgs,
};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = load_config(cli.command.args()).and_then(|config| match &cli.command {
        Commands::Run(_) => run_kiosk(&config),
        Commands::Serve(_) => serve(&config),
        Commands::Resolve(_) => run_resolve(&config),
        Commands::Info(_) => run_info(&config),
    });

    std::process::exit(match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    });
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kiosk_recorder={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the effective configuration: file, then environment, then CLI
fn load_config(args: &ServeArgs) -> Result<KioskConfig, KioskError> {
    let file_config = match &args.config {
        Some(path) => KioskConfig::load_from_path(path)?,
        None => KioskConfig::load()?,
    };

    Ok(file_config
        .apply_env(std::env::vars())
        .merge_with_cli(&args.overrides()))
}

// ============ Run Command ============

fn run_kiosk(config: &KioskConfig) -> Result<(), KioskError> {
    let presenter = Arc::new(HeadlessPresenter::new(config.window.clone()));
    run(config, presenter)
}

// ============ Resolve Command ============

fn run_resolve(config: &KioskConfig) -> Result<(), KioskError> {
    config.validate()?;

    let target = resolve_target(config, config.server.port);
    println!("Target: {}", target.kind());
    match target.url() {
        Ok(url) => println!("URL:    {}", url),
        Err(e) => println!("URL:    unavailable ({})", e),
    }
    Ok(())
}

// ============ Info Command ============

fn run_info(config: &KioskConfig) -> Result<(), KioskError> {
    println!("=== kiosk-recorder v{} ===", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Mode: {}", if config.content.dev_mode { "development" } else { "production" });
    println!();
    println!("Config File Locations:");
    for path in KioskConfig::search_paths() {
        let status = if path.is_file() { "found" } else { "not found" };
        println!("  {} ({})", path.display(), status);
    }
    println!();
    println!("Effective Configuration:");
    print!("{}", config.to_toml()?);

    Ok(())
}
