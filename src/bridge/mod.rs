//! In-process bridge to the kernel's own Kconfig implementation.
//!
//! The bridge compiles a small C shim together with the kernel tree's
//! `scripts/kconfig` sources into a shared library, loads it, and hands the
//! rest of the program a typed view of the live symbol table. Kconfig keeps
//! process-global state, so there is exactly one [`Bridge`] at a time and all
//! access is single-threaded.
//!
//! Build protocol: the kernel Makefile is invoked as if running `defconfig`,
//! but with `SHELL` pointing at an interceptor script. The interceptor
//! replaces the final `conf` invocation with a routine that compiles the shim
//! (fingerprinted by SHA-256 so rebuilds are skipped), prints the Makefile's
//! environment as JSON behind a marker, and exits. The host parses that
//! snapshot and passes it to the library's `init`, which duplicates it so
//! later bridges cannot interfere.

mod expr;
mod ffi;
mod symbol;

pub use expr::{Expr, ExprError, Leaf};
pub use ffi::{KSymbol, SymbolFlags, SymbolType, Tristate};
pub use symbol::{Symbol, SymbolValue};

#[cfg(test)]
pub(crate) use ffi::testutil;

use std::collections::HashMap;
use std::ffi::CString;
use std::fs;
use std::os::raw::c_char;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::journal::Journal;
use crate::verbose::{vprintln, Timer};
use crate::version::KernelVersion;

use ffi::BridgeVTable;

/// Marker separating make noise from the interceptor's JSON environment dump.
const ENV_MARKER: &str = "[AUTOKERNEL-ENV]";

const BRIDGE_C: &str = include_str!("bridge.c");
const INTERCEPTOR_SH: &str = include_str!("interceptor.sh");

/// Fatal bridge failures. None of these are retryable.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("kernel {version} is not supported (minimum is 4.2)")]
    UnsupportedKernel { version: String },

    #[error("failed to stage bridge sources in {dir}: {source}")]
    Stage {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("kernel make invocation failed{}", detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Build { detail: Option<String> },

    #[error("interceptor did not report an environment (marker missing in make output)")]
    NoEnvironment,

    #[error("could not parse the captured environment: {0}")]
    BadEnvironment(#[from] serde_json::Error),

    #[error("could not load the bridge library: {0}")]
    Load(#[from] libloading::Error),

    #[error("bridge initialization failed (kconfig parse error, see stderr)")]
    InitFailed,

    #[error("kconfig parse produced an empty symbol table")]
    EmptySymbolTable,
}

type EnvMap = HashMap<String, String>;

/// Handle to a loaded and initialized Kconfig state.
pub struct Bridge {
    pub(crate) vtable: BridgeVTable,
    pub kernel_dir: PathBuf,
    kernel_version: KernelVersion,

    symbols: Vec<*mut KSymbol>,
    by_name: HashMap<String, *mut KSymbol>,

    /// Assignment history; written by the validator, read for diagnostics.
    pub journal: Journal,
}

impl Bridge {
    /// Build (or reuse) the bridge library for `kernel_dir`, load it, parse
    /// Kconfig and snapshot the symbol table.
    pub fn new(kernel_dir: PathBuf) -> Result<Bridge, BridgeError> {
        let env = stage_and_build(&kernel_dir)?;

        let version_str = env
            .get("KERNELVERSION")
            .cloned()
            .unwrap_or_else(|| "0".into());
        let kernel_version =
            KernelVersion::parse(&version_str).ok_or(BridgeError::UnsupportedKernel {
                version: version_str.clone(),
            })?;
        if kernel_version < KernelVersion::new(4, 2, 0) {
            return Err(BridgeError::UnsupportedKernel {
                version: version_str,
            });
        }

        let _t = Timer::start("bridge initialization");
        let library = kernel_dir
            .join("scripts")
            .join("kconfig")
            .join("autokernel_bridge.so");
        let vtable = unsafe { BridgeVTable::load(&library)? };

        // The shim duplicates the environment during init, so the CStrings
        // only need to live for this call.
        let env_strings: Vec<CString> = env
            .iter()
            .map(|(k, v)| CString::new(format!("{k}={v}")).expect("env var contained NUL"))
            .collect();
        let mut env_ptrs: Vec<*const c_char> = env_strings.iter().map(|s| s.as_ptr()).collect();
        env_ptrs.push(std::ptr::null());
        if (vtable.init)(env_ptrs.as_ptr()) == 0 {
            return Err(BridgeError::InitFailed);
        }

        let symbols = vtable.all_symbols();
        if symbols.is_empty() {
            return Err(BridgeError::EmptySymbolTable);
        }

        let mut by_name = HashMap::new();
        for &sym in &symbols {
            // Symbols without a declared type are value carriers for other
            // symbols' properties; they are not addressable.
            if unsafe { (*sym).stype } == SymbolType::Unknown {
                continue;
            }
            if let Some(name) = unsafe { (*sym).name() } {
                by_name.insert(name.into_owned(), sym);
            }
        }

        vprintln!(
            "  bridge ready: kernel {}, {} named symbols",
            kernel_version,
            by_name.len()
        );

        Ok(Bridge {
            vtable,
            kernel_dir,
            kernel_version,
            symbols,
            by_name,
            journal: Journal::new(),
        })
    }

    /// Look up a symbol by name; a `CONFIG_` prefix is accepted and ignored.
    pub fn symbol(&self, name: &str) -> Option<Symbol<'_>> {
        let bare = name.strip_prefix("CONFIG_").unwrap_or(name);
        self.by_name.get(bare).map(|&raw| Symbol::new(raw, self))
    }

    /// Every named, typed symbol.
    pub fn symbols(&self) -> impl Iterator<Item = Symbol<'_>> + '_ {
        self.by_name.values().map(move |&raw| Symbol::new(raw, self))
    }

    /// Total number of native symbols, including anonymous choice groups.
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn kernel_version(&self) -> &KernelVersion {
        &self.kernel_version
    }

    /// Re-evaluate every mutable named symbol after a write.
    pub fn recalculate_all(&self) {
        for &raw in &self.symbols {
            if unsafe { (*raw).is_const() } || unsafe { (*raw).name() }.is_none() {
                continue;
            }
            (self.vtable.sym_calc_value)(raw);
        }
    }

    /// Write the current configuration in the kernel's `.config` format.
    pub fn write_config(&self, path: &Path) -> Result<(), BridgeError> {
        let cpath = path_cstring(path)?;
        if (self.vtable.conf_write)(cpath.as_ptr()) != 0 {
            return Err(BridgeError::Build {
                detail: Some(format!("conf_write({}) failed", path.display())),
            });
        }
        Ok(())
    }

    /// Merge a config file through the kernel's own loader. No validation,
    /// no pinning; used for defconfig-style baselines.
    pub fn read_config_unchecked(&self, path: &Path) -> Result<(), BridgeError> {
        let cpath = path_cstring(path)?;
        if (self.vtable.conf_read)(cpath.as_ptr()) != 0 {
            return Err(BridgeError::Build {
                detail: Some(format!("conf_read({}) failed", path.display())),
            });
        }
        self.recalculate_all();
        Ok(())
    }

    /// Read a variable from the bridge's isolated environment snapshot.
    pub fn get_env(&self, name: &str) -> Option<String> {
        let cname = CString::new(name).ok()?;
        let ptr = (self.vtable.get_env)(cname.as_ptr());
        if ptr.is_null() {
            return None;
        }
        Some(
            unsafe { std::ffi::CStr::from_ptr(ptr) }
                .to_string_lossy()
                .into_owned(),
        )
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // Free the shim's duplicated environment before the library unloads,
        // so a test process can bring up a fresh bridge afterwards.
        (self.vtable.shutdown)();
    }
}

fn path_cstring(path: &Path) -> Result<CString, BridgeError> {
    CString::new(path.to_string_lossy().into_owned()).map_err(|_| BridgeError::Build {
        detail: Some(format!("path {} contains NUL", path.display())),
    })
}

/// Write the shim sources into `scripts/kconfig/` and run the intercepted
/// make to compile them. Returns the captured environment snapshot.
fn stage_and_build(kernel_dir: &Path) -> Result<EnvMap, BridgeError> {
    let _t = Timer::start("bridge build");
    let kconfig_dir = kernel_dir.join("scripts").join("kconfig");
    let stage_err = |source| BridgeError::Stage {
        dir: kconfig_dir.clone(),
        source,
    };

    fs::write(kconfig_dir.join("autokernel_bridge.c"), BRIDGE_C).map_err(stage_err)?;

    let interceptor = kconfig_dir.join("autokernel_interceptor.sh");
    fs::write(&interceptor, format!("#!/usr/bin/env bash\n{INTERCEPTOR_SH}")).map_err(stage_err)?;
    fs::set_permissions(&interceptor, fs::Permissions::from_mode(0o755)).map_err(stage_err)?;

    // Fingerprint the shim source so the interceptor can skip recompilation
    // when the existing library was built from identical input.
    let digest = format!("{:x}", Sha256::digest(BRIDGE_C.as_bytes()));

    let interceptor_abs = fs::canonicalize(&interceptor).map_err(stage_err)?;
    vprintln!("  building bridge in {}", kconfig_dir.display());
    let output = Command::new("bash")
        .args(["-c", "--", "umask 022 && make SHELL=\"$AUTOKERNEL_SHELL\" defconfig"])
        .env("AUTOKERNEL_SHELL", &interceptor_abs)
        .env("AUTOKERNEL_BRIDGE_SHA256", &digest)
        .current_dir(kernel_dir)
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| BridgeError::Build {
            detail: Some(e.to_string()),
        })?;
    if !output.status.success() {
        return Err(BridgeError::Build {
            detail: Some(format!("make exited with {}", output.status)),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    // The snapshot is the first line after the marker; later recipe lines of
    // the aborted make run may still have printed after it.
    let json = stdout
        .split_once(ENV_MARKER)
        .ok_or(BridgeError::NoEnvironment)?
        .1
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or(BridgeError::NoEnvironment)?;
    Ok(serde_json::from_str(json)?)
}
