//! CLI command definitions for overlay-config
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::source::FileSource;
use crate::tags::Tags;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Layered configuration inspector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to an engine settings file (YAML)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the merged configuration as JSON
    Dump(DumpArgs),

    /// Decode and print a single value
    Get(GetArgs),

    /// Reload sources as they change and print the merged configuration
    Watch(DumpArgs),
}

/// Sources and the overlay to resolve.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Source file, optionally tagged: FILE or FILE@env=dev,profile=x.
    /// Later sources override earlier ones within the same overlay.
    #[arg(long = "source", value_name = "FILE[@TAGS]", required = true)]
    pub sources: Vec<FileSource>,

    /// Register PREFIX_* environment variables as the last default source
    #[arg(long, value_name = "PREFIX")]
    pub env_prefix: Option<String>,

    /// Tags to resolve, e.g. env=dev
    #[arg(short, long, default_value = "")]
    pub tags: Tags,
}

/// Arguments for the dump and watch subcommands
#[derive(Args, Debug)]
pub struct DumpArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only print this subtree
    #[arg(long, value_name = "PATH", default_value = "")]
    pub path: String,
}

/// Arguments for the get subcommand
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Path to decode, e.g. db.hosts[0]
    pub path: String,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Type to decode the value as
    #[arg(long = "as", value_enum, default_value_t = ValueKind::String)]
    pub kind: ValueKind,
}

/// Decode targets offered on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ValueKind {
    #[default]
    String,
    Int,
    Float,
    Bool,
    /// Comma-separated or array of strings
    List,
}
