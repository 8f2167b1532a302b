//! Configuration program dialects.
//!
//! Dispatches on file extension: `.lua` runs the scripted dialect, `.txt`
//! and `.config` the classic line-oriented one. Both route every assignment
//! through the validator with the source position attached.

pub mod flat;
pub mod lua;

use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Context, Result};

use crate::bridge::Bridge;
use crate::verbose::dprintln;

/// Load and execute the configuration program at `path`.
pub fn apply(bridge: &Rc<Bridge>, path: &Path) -> Result<()> {
    dprintln!("Applying {}", path.display());
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("{} has no file extension", path.display()))?;

    match extension {
        "lua" => lua::run(bridge.clone(), path),
        "txt" | "config" => flat::run(bridge, path),
        other => bail!(
            "unknown configuration dialect .{other} (expected .lua, .txt or .config)"
        ),
    }
}
