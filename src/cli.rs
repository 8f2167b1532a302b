//! Command-line interface definitions for autokernel.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Kernel configuration with semantic guarantees.
#[derive(Parser)]
#[command(name = "autokernel", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Top-level configuration file.
    #[arg(long, global = true, value_name = "FILE", default_value = "/etc/autokernel/config.toml")]
    pub config: PathBuf,

    /// Kernel source tree to operate on.
    #[arg(long, short = 'k', global = true, value_name = "DIR", default_value = "/usr/src/linux")]
    pub kernel_dir: PathBuf,

    /// Suppress progress output and warnings; show only errors and results.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output with phase timings.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Run the configuration script and write the resulting .config.
    GenerateConfig(GenerateConfigArgs),
    /// Compute the ordered prerequisite assignments for a symbol.
    Satisfy(SatisfyArgs),
    /// Display the properties and help text of symbols.
    Info(InfoArgs),
    /// Compare the generated configuration against another config file.
    Check(CheckArgs),
}

/// Arguments for the `generate-config` subcommand.
#[derive(Parser)]
pub struct GenerateConfigArgs {
    /// Output file (defaults to the configured output, then <kernel_dir>/.config).
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `satisfy` subcommand.
#[derive(Parser)]
pub struct SatisfyArgs {
    /// The target assignment, SYMBOL or SYMBOL=<value> (value defaults to y).
    pub target: String,

    /// Also satisfy the dependencies of every encountered prerequisite.
    #[arg(long, short = 'r')]
    pub recursive: bool,

    /// Solve against fresh defaults instead of applying the script first.
    #[arg(long)]
    pub ignore_config: bool,

    /// Output format: plain assignments or a pasteable lua module.
    #[arg(long, default_value = "plain", value_parser = ["plain", "lua"])]
    pub format: String,
}

/// Arguments for the `info` subcommand.
#[derive(Parser)]
pub struct InfoArgs {
    /// Symbols to describe (with or without the CONFIG_ prefix).
    #[arg(required = true)]
    pub symbols: Vec<String>,
}

/// Arguments for the `check` subcommand.
#[derive(Parser)]
pub struct CheckArgs {
    /// Config file to compare against (defaults to <kernel_dir>/.config).
    #[arg(short = 'c', long, value_name = "FILE")]
    pub compare: Option<PathBuf>,
}
