//! `techradar` - CLI and HTTP server for the technology radar
//!
//! This binary serves the catalog API and manages the catalog directly
//! from the command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;

use techradar::catalog::{self, TechnologyListing};
use techradar::cli::{
    AddCommand, Cli, Command, ConfigCommand, ListCommand, MoveCommand, RemoveCommand,
    ServeCommand,
};
use techradar::{
    init_logging, server, Config, LifecycleManager, Stage, StageTransitionRequest, Storage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(cmd) => handle_serve(config, cmd).await,
        Command::List(cmd) => handle_list(&config, &cmd),
        Command::Add(cmd) => handle_add(&config, &cmd),
        Command::Move(cmd) => handle_move(&config, cmd),
        Command::Remove(cmd) => handle_remove(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path, config.busy_timeout())
        .with_context(|| format!("failed to open catalog at {}", path.display()))
}

fn lifecycle<'a>(storage: &'a Storage, config: &Config) -> LifecycleManager<'a, Storage> {
    LifecycleManager::with_max_update_attempts(storage, config.lifecycle.max_update_attempts)
}

async fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = cmd.bind {
        config.server.bind = bind;
    }
    server::serve(&config).await?;
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let listing = catalog::list(&storage, &cmd.filter())?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        print_listing(&listing);
    }
    Ok(())
}

fn print_listing(listing: &TechnologyListing) {
    if listing.technologies.is_empty() {
        println!("No technologies found.");
        return;
    }

    for tech in &listing.technologies {
        let path: Vec<&str> = tech.stage_path().into_iter().map(Stage::as_str).collect();
        println!("{:<24} {:<24} {}", tech.name, tech.category, path.join(" -> "));
        if !tech.tags.is_empty() {
            println!("{:<24} tags: {}", "", tech.tags.join(", "));
        }
    }

    let metadata = &listing.metadata;
    println!();
    println!("Total:      {}", metadata.total_count);
    println!("Categories: {}", metadata.categories.join(", "));
    println!("Stages:     {}", metadata.stages.join(", "));
    println!("Tags:       {}", metadata.available_tags.join(", "));
}

fn handle_add(config: &Config, cmd: &AddCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let created = lifecycle(&storage, config).create(cmd.request())?;
    println!(
        "Added {} ({}, {})",
        created.name, created.category, created.stage
    );
    Ok(())
}

fn handle_move(config: &Config, cmd: MoveCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let request = StageTransitionRequest {
        new_stage: cmd.stage,
        adr_link: cmd.adr_link,
    };
    let moved = lifecycle(&storage, config).transition(&cmd.name, request)?;
    println!("Moved {} to {}", moved.name, moved.stage);
    Ok(())
}

fn handle_remove(config: &Config, cmd: &RemoveCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    lifecycle(&storage, config).delete(&cmd.name)?;
    println!("Removed {}", cmd.name);
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:        {}", config.database_path().display());
                println!("  Busy timeout (ms):    {}", config.storage.busy_timeout_ms);
                println!();
                println!("[Server]");
                println!("  Bind:                 {}", config.server.bind);
                println!(
                    "  Request timeout (s):  {}",
                    config.server.request_timeout_secs
                );
                println!();
                println!("[CORS]");
                println!(
                    "  Allowed origins:      {}",
                    config.cors.allowed_origins.join(", ")
                );
                println!("  Max age (s):          {}", config.cors.max_age_seconds);
                println!();
                println!("[Lifecycle]");
                println!(
                    "  Max update attempts:  {}",
                    config.lifecycle.max_update_attempts
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
