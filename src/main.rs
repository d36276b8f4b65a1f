//! Padtrack CLI
//!
//! Command-line interface for rendering and playing clip timelines.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::debug;

use padtrack::cli::{commands, Cli, Commands};
use padtrack::EngineConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let config = EngineConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    debug!("Config: {:?}", config);

    match cli.command {
        Some(cmd) => handle_command(&config, cmd).map_err(|e| {
            let message = format!("{} [{}]", e.friendly_message(), e.error_code());
            anyhow::Error::new(e).context(message)
        }),
        None => {
            println!("Padtrack v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(config: &EngineConfig, cmd: Commands) -> padtrack::Result<()> {
    match cmd {
        Commands::Render { name, items } => commands::render(config, &name, &items),
        Commands::Compose { name, items } => commands::compose(config, &name, &items),
        Commands::List => commands::list(config),
        Commands::Clips => commands::clips(config),
        Commands::Delete { id } => commands::delete(config, id),
        Commands::Verify { id } => commands::verify(config, id),
        Commands::Prune => commands::prune(config),
        Commands::Play {
            items,
            looping,
            seconds,
        } => commands::play(config, &items, looping, seconds),
        Commands::PlayTrack { id, seconds } => commands::play_track(config, id, seconds),
    }
}
