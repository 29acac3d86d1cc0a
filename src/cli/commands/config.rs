use anyhow::{Context, Result};
use clap::Subcommand;
use std::process::Command;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

const MASKED: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a config file with default values")]
    Init {
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show configuration and index file paths")]
    Path,
    #[command(about = "Edit configuration file")]
    Edit,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => handle_init(force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(),
        ConfigCommand::Edit => handle_edit(formatter.as_ref()),
    }
}

fn handle_init(force: bool, formatter: &dyn Formatter) -> Result<()> {
    let config_path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    let path = Config::default()
        .save()
        .context("failed to create config")?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );

    Ok(())
}

/// The loaded config with secrets replaced for display.
fn masked(mut config: Config) -> Config {
    if config.web_search.api_key.is_some() {
        config.web_search.api_key = Some(MASKED.to_string());
    }
    config
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let config = masked(Config::load()?);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Some(path) = Config::config_path().filter(|p| p.exists()) {
        println!("# Config: {}", path.display());
        println!();
    }
    print!(
        "{}",
        toml::to_string_pretty(&config).context("failed to render config")?
    );

    Ok(())
}

fn handle_path() -> Result<()> {
    let config = Config::load()?;

    println!("Configuration paths:");
    println!();

    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("Config file (active): {}", path.display());
        } else {
            println!("Config file (would be): {}", path.display());
        }
    }

    if let Some(path) = config.persistent_index_path() {
        println!("Index file: {}", path.display());
    }

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        if env_path.exists() {
            println!(".env file (active): {}", env_path.display());
        } else {
            println!(".env file (would be): {}", env_path.display());
        }
    }

    Ok(())
}

fn handle_edit(formatter: &dyn Formatter) -> Result<()> {
    let path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if !path.exists() {
        Config::default().save().context("failed to create config")?;
        println!(
            "{}",
            formatter.format_message(&format!("Created config at: {}", path.display()))
        );
    }

    let editor = std::env::var("EDITOR")
        .unwrap_or_else(|_| std::env::var("VISUAL").unwrap_or_else(|_| "vim".into()));

    Command::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("failed to open editor: {editor}"))?;

    Ok(())
}
