//! This module defines the command line arguments Bookshelf accepts.

use std::path::PathBuf;
use termcolor::ColorChoice;

use crate::{api::PaginationStyle, db::cmd::DbCommand};


#[derive(Debug, clap::Parser)]
#[command(about = "GraphQL API for a book reading tracker.", version)]
pub(crate) struct Args {
    #[command(subcommand)]
    pub(crate) cmd: Command,

    /// Whether to use colors when printing to the terminal. Possible values:
    /// "never", "auto" and "always".
    #[arg(long, global = true, default_value = "auto", value_parser = parse_color_choice)]
    pub(crate) color: ColorChoice,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the backend HTTP server.
    Serve {
        #[command(flatten)]
        shared: Shared,
    },

    /// Database operations.
    Db {
        #[command(subcommand)]
        cmd: DbCommand,

        #[command(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions of all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },

    /// Exports the API as GraphQL schema.
    ExportApiSchema {
        /// Which of the two schemas to export: "offset" or "relay".
        #[arg(long, default_value = "offset", value_parser = parse_pagination_style)]
        pagination: PaginationStyle,

        /// Target file. If not specified, the schema is written to stdout.
        target: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, Bookshelf
    /// will try opening `config.toml` or `/etc/bookshelf/config.toml`.
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,
}

fn parse_color_choice(s: &str) -> Result<ColorChoice, String> {
    match s {
        "never" => Ok(ColorChoice::Never),
        "auto" => Ok(ColorChoice::Auto),
        "always" => Ok(ColorChoice::Always),
        other => Err(format!("'{other}' is not a valid color choice")),
    }
}

fn parse_pagination_style(s: &str) -> Result<PaginationStyle, String> {
    match s {
        "offset" => Ok(PaginationStyle::Offset),
        "relay" => Ok(PaginationStyle::Relay),
        other => Err(format!("'{other}' is not a valid pagination style")),
    }
}
