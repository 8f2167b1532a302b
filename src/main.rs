//! Autokernel: kernel configuration with semantic guarantees.
//!
//! Loads the kernel's own Kconfig implementation through a native bridge,
//! executes a user configuration program against it, and refuses any
//! assignment the Kconfig model would silently discard.
//!
//! Pipeline: build/load bridge → run script through the validator →
//!           write .config / solve dependencies / diff / describe.

mod bridge;
mod cli;
mod config;
mod journal;
mod satisfier;
mod script;
mod validate;
mod verbose;
mod version;

use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::style::Color;

use bridge::{Bridge, BridgeError, SymbolType, Tristate};
use journal::paint;
use validate::{ErrorKind, Reported};
use verbose::dprintln;

fn main() {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);

    if let Err(error) = try_main(&cli) {
        // Validator and solver failures print their rich diagnostic at the
        // failure site; everything else renders as an error chain here.
        if error.downcast_ref::<Reported>().is_none() {
            eprintln!("{}: {error}", paint("error", Color::Red));
            error
                .chain()
                .skip(1)
                .for_each(|cause| eprintln!("{}: {cause}", paint("because", Color::Yellow)));
        }
        std::process::exit(exit_code(&error));
    }
}

fn try_main(cli: &cli::Cli) -> Result<()> {
    match &cli.command {
        cli::Command::GenerateConfig(args) => cmd_generate_config(cli, args),
        cli::Command::Satisfy(args) => cmd_satisfy(cli, args),
        cli::Command::Info(args) => cmd_info(cli, args),
        cli::Command::Check(args) => cmd_check(cli, args),
    }
}

/// Map the root cause to the documented exit codes.
fn exit_code(error: &anyhow::Error) -> i32 {
    let kind_code = |kind: ErrorKind| match kind {
        ErrorKind::Bridge => 10,
        ErrorKind::UnsupportedKernel => 11,
        ErrorKind::InvalidAssignment => 12,
        ErrorKind::UnmetDependencies => 13,
        ErrorKind::AmbiguousChoice => 14,
        ErrorKind::Other => 1,
    };
    if let Some(reported) = error.downcast_ref::<Reported>() {
        return kind_code(reported.0);
    }
    if let Some(bridge_error) = error.downcast_ref::<BridgeError>() {
        return match bridge_error {
            BridgeError::UnsupportedKernel { .. } => kind_code(ErrorKind::UnsupportedKernel),
            _ => kind_code(ErrorKind::Bridge),
        };
    }
    1
}

// ===========================================================================
// Shared setup
// ===========================================================================

fn load_bridge(cli: &cli::Cli) -> Result<Rc<Bridge>> {
    dprintln!("Loading kconfig from {}", cli.kernel_dir.display());
    let bridge = Bridge::new(cli.kernel_dir.clone())?;
    Ok(Rc::new(bridge))
}

/// Load the TOML configuration and run its script against the bridge.
fn apply_configured_script(cli: &cli::Cli, bridge: &Rc<Bridge>) -> Result<config::AutokernelConfig> {
    let configuration = config::load(&cli.config)?;
    script::apply(bridge, &configuration.config.script)?;
    Ok(configuration)
}

// ===========================================================================
// Commands
// ===========================================================================

/// Run the script and write the kernel's canonical `.config`.
fn cmd_generate_config(cli: &cli::Cli, args: &cli::GenerateConfigArgs) -> Result<()> {
    let bridge = load_bridge(cli)?;
    let configuration = apply_configured_script(cli, &bridge)?;

    let output = args
        .output
        .clone()
        .or(configuration.config.output)
        .unwrap_or_else(|| cli.kernel_dir.join(".config"));
    dprintln!("Writing {}", output.display());
    bridge.write_config(&output)?;
    Ok(())
}

/// Compute and print the ordered prerequisite assignments for a target.
fn cmd_satisfy(cli: &cli::Cli, args: &cli::SatisfyArgs) -> Result<()> {
    let (symbol, desired) = parse_target(&args.target)?;

    let bridge = load_bridge(cli)?;
    if !args.ignore_config {
        apply_configured_script(cli, &bridge)?;
    }

    dprintln!("Satisfying {symbol}={desired}");
    let plan = match satisfier::solve(
        &bridge,
        &symbol,
        satisfier::SolveOptions {
            desired,
            recursive: args.recursive,
        },
    ) {
        Ok(plan) => plan,
        Err(error) => {
            satisfier::report(&error);
            return Err(Reported(error.kind()).into());
        }
    };

    if plan.is_empty() {
        println!("Nothing to do, {symbol} is already assignable to {desired}.");
        return Ok(());
    }
    if args.format == "lua" {
        print!("{}", satisfier::render_lua_module(&symbol, desired, &plan));
    } else {
        for (name, value) in &plan {
            println!("{name}={value}");
        }
    }
    Ok(())
}

/// `SYMBOL` or `SYMBOL=<value>`; the value defaults to y and an optional
/// CONFIG_ prefix is dropped.
fn parse_target(target: &str) -> Result<(String, Tristate)> {
    let (symbol, desired) = match target.split_once('=') {
        None => (target, Tristate::Yes),
        Some((symbol, value)) => {
            let desired = value
                .parse::<Tristate>()
                .map_err(|_| anyhow!("invalid target value {value:?} (expected n, m or y)"))?;
            (symbol, desired)
        }
    };
    let symbol = symbol.trim_start_matches("CONFIG_");
    Ok((symbol.to_string(), desired))
}

/// Describe symbols: type, value, visibility, dependencies, help.
fn cmd_info(cli: &cli::Cli, args: &cli::InfoArgs) -> Result<()> {
    let bridge = load_bridge(cli)?;

    for (index, name) in args.symbols.iter().enumerate() {
        if index > 0 {
            println!();
        }
        let symbol = bridge.symbol(name).ok_or_else(|| {
            anyhow!("symbol {name} does not exist in kernel {}", bridge.kernel_version())
        })?;
        let display_name = symbol.name_owned().unwrap_or_else(|| name.clone());

        println!(
            "{} ({}) = {}",
            paint(&display_name, Color::Cyan),
            symbol.symbol_type(),
            symbol.string_value()
        );
        if let Some(prompt) = symbol.prompt_text() {
            println!("  prompt: {prompt}");
        }
        println!(
            "  visibility: {}  assignable: [{}, {}]",
            symbol.visibility(),
            symbol.rev_dep_floor(),
            symbol.visibility()
        );
        if let Ok(Some(deps)) = symbol.direct_dep_expression() {
            println!("  depends on: {deps}");
        }
        if let Ok(Some(rev)) = symbol.reverse_dep_expression() {
            println!("  selected by: {rev}");
        }
        if let Ok(Some(implied)) = symbol.implied_expression() {
            println!("  implied by: {implied}");
        }
        if let Some((lo, hi)) = symbol.int_range() {
            if symbol.symbol_type() == SymbolType::Hex {
                println!("  range: [{lo:#x}, {hi:#x}]");
            } else {
                println!("  range: [{lo}, {hi}]");
            }
        }
        if let Some(group) = symbol.choice_group() {
            println!("  choice: {group}");
        }
        if symbol.prompt_count() == 0 {
            println!("  note: no prompt, value is driven by selects and defaults");
        }
        if let Some(help) = symbol.help_text() {
            println!("  help:");
            for line in help.lines() {
                println!("    {line}");
            }
        }
    }
    Ok(())
}

/// Diff the generated configuration against a reference config file.
fn cmd_check(cli: &cli::Cli, args: &cli::CheckArgs) -> Result<()> {
    let compare_path = args
        .compare
        .clone()
        .unwrap_or_else(|| cli.kernel_dir.join(".config"));
    let reference = fs::read_to_string(&compare_path)
        .with_context(|| format!("could not read {}", compare_path.display()))?;

    let bridge = load_bridge(cli)?;
    apply_configured_script(cli, &bridge)?;

    // Round-trip through the kernel's writer so both sides use canonical
    // formatting.
    let generated_path = scratch_config_path();
    bridge.write_config(&generated_path)?;
    let generated = fs::read_to_string(&generated_path)
        .with_context(|| format!("could not read {}", generated_path.display()))?;
    let _ = fs::remove_file(&generated_path);

    let generated = script::flat::parse_values(&generated)?;
    let reference = script::flat::parse_values(&reference)?;

    let added = paint("+", Color::Green);
    let removed = paint("-", Color::Red);
    let changed = paint("~", Color::Yellow);
    dprintln!("Comparing {} (left) against the generated config (right)", compare_path.display());

    let mut differences = 0usize;
    for (name, value) in &generated {
        match reference.get(name) {
            None => {
                println!("{added} {name}={value}");
                differences += 1;
            }
            Some(other) if other != value => {
                println!("{changed} {name}: {other} -> {value}");
                differences += 1;
            }
            Some(_) => {}
        }
    }
    for (name, value) in &reference {
        if !generated.contains_key(name) {
            println!("{removed} {name}={value}");
            differences += 1;
        }
    }

    if differences > 0 {
        anyhow::bail!("{differences} difference(s) found");
    }
    println!("Configurations are identical.");
    Ok(())
}

fn scratch_config_path() -> PathBuf {
    std::env::temp_dir().join(format!("autokernel-check-{}.config", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_target_defaults_to_y() {
        assert_eq!(
            parse_target("WLAN").unwrap(),
            ("WLAN".to_string(), Tristate::Yes)
        );
    }

    #[test]
    fn parse_target_with_value() {
        assert_eq!(
            parse_target("WLAN=m").unwrap(),
            ("WLAN".to_string(), Tristate::Mod)
        );
        assert!(parse_target("WLAN=x").is_err());
    }
}
