//! CLI module for mapey.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Generate a personalized learning roadmap from a resume and a target role.
#[derive(Debug, Parser)]
#[command(name = "mapey")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a roadmap for a target role
    Generate(commands::GenerateArgs),

    /// Manage the knowledge base (add, clear)
    #[command(subcommand)]
    Index(commands::IndexCommand),

    /// Search the knowledge base
    Search(commands::SearchArgs),

    /// Check the embedding server and knowledge base
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
