//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::catalog::TechnologyFilter;
use crate::technology::{Category, NewTechnology, Stage};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Case-insensitive text matched against name, category and tags
    #[arg(short, long)]
    pub search: Option<String>,

    /// Only these categories (repeatable)
    #[arg(long = "category", value_name = "CATEGORY")]
    pub categories: Vec<String>,

    /// Only these stages (repeatable)
    #[arg(long = "stage", value_name = "STAGE")]
    pub stages: Vec<String>,

    /// Only technologies carrying one of these tags (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl ListCommand {
    /// The catalog filter these arguments describe.
    #[must_use]
    pub fn filter(&self) -> TechnologyFilter {
        TechnologyFilter {
            search: self.search.clone(),
            categories: self.categories.clone(),
            stages: self.stages.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Unique technology name
    pub name: String,

    /// Category, e.g. "Tools" or "Languages & Frameworks"
    #[arg(long)]
    pub category: Category,

    /// Initial stage: Hold, Assess, Trial or Adopt
    #[arg(long)]
    pub stage: Stage,

    /// Tag (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Link to a page describing the technology
    #[arg(long, value_name = "URL")]
    pub details_page: Option<String>,
}

impl AddCommand {
    /// The creation request these arguments describe.
    #[must_use]
    pub fn request(&self) -> NewTechnology {
        NewTechnology {
            name: self.name.clone(),
            category: self.category,
            stage: self.stage,
            tags: self.tags.clone(),
            details_page: self.details_page.clone(),
        }
    }
}

/// Move command arguments.
#[derive(Debug, Args)]
pub struct MoveCommand {
    /// Technology to move
    pub name: String,

    /// Stage to move to
    #[arg(long = "to", value_name = "STAGE")]
    pub stage: Stage,

    /// Decision record justifying the move
    #[arg(long, value_name = "URL")]
    pub adr_link: String,
}

/// Remove command arguments.
#[derive(Debug, Args)]
pub struct RemoveCommand {
    /// Technology to remove
    pub name: String,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file to validate (uses default if not specified)
        file: Option<PathBuf>,
    },
}
