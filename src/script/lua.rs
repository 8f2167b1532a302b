//! The scripted dialect: a Lua 5.4 host exposing kernel symbols as
//! first-class values.
//!
//! Unknown global lookups are intercepted through a metatable on the global
//! environment and resolved against the symbol registry, so `NET("y")` and
//! `CONFIG_NET("y")` both work without pre-registering tens of thousands of
//! names. Every validator call captures the Lua call site (file, line, and
//! stack) for diagnostics. Boolean `and`/`or` are Lua's own, so the dialect
//! inherits left-to-right short-circuit evaluation.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use mlua::{
    Lua, MetaMethod, Table, UserData, UserDataMethods, UserDataRef, Value, Variadic,
};

use crate::bridge::{Bridge, SymbolType, Tristate};
use crate::journal::Origin;
use crate::satisfier::{self, SolveOptions};
use crate::validate::{self, ErrorKind, Reported, Request};
use crate::version::KernelVersion;

/// Execute a scripted program from a file.
pub fn run(bridge: Rc<Bridge>, path: &Path) -> Result<()> {
    let code = fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    eval(bridge, &path.display().to_string(), &code)
}

/// Execute scripted-dialect code under the given chunk name.
pub fn eval(bridge: Rc<Bridge>, chunk_name: &str, code: &str) -> Result<()> {
    let lua = Lua::new();
    register_api(&lua, &bridge).map_err(|e| anyhow!("lua api setup failed: {e}"))?;

    if let Err(error) = lua.load(code).set_name(chunk_name).exec() {
        // Validator failures already printed their diagnostic; only the
        // exit-code class travels up. Anything else is a genuine script
        // error (syntax, nil index, ...) with Lua's own position info.
        if let Some(kind) = reported_kind(&error) {
            return Err(Reported(kind).into());
        }
        bail!("script error: {error}");
    }
    Ok(())
}

fn reported_kind(error: &mlua::Error) -> Option<ErrorKind> {
    match error {
        mlua::Error::CallbackError { cause, .. } => reported_kind(cause),
        mlua::Error::WithContext { cause, .. } => reported_kind(cause),
        mlua::Error::ExternalError(inner) => {
            inner.downcast_ref::<Reported>().map(|reported| reported.0)
        }
        _ => None,
    }
}

/// Wrap an already-reported failure for transport through Lua.
fn reported(kind: ErrorKind) -> mlua::Error {
    mlua::Error::external(Reported(kind))
}

/// Capture the Lua call site of the currently executing Rust callback.
fn call_origin(lua: &Lua) -> Origin {
    let mut origin = Origin::new("<script>", 0);
    if let Some(debug) = lua.inspect_stack(1) {
        if let Some(short) = debug.source().short_src {
            origin.file = short.to_string();
        }
        let line = debug.curr_line();
        if line > 0 {
            origin.line = line as u32;
        }
    }

    // Outer frames become the traceback shown under the location line.
    let mut frames = Vec::new();
    for level in 2..16 {
        let Some(debug) = lua.inspect_stack(level) else {
            break;
        };
        let file = debug
            .source()
            .short_src
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".into());
        let line = debug.curr_line();
        if line > 0 {
            frames.push(format!("{file}:{line}"));
        }
    }
    if !frames.is_empty() {
        origin.traceback = Some(frames.join("\n"));
    }
    origin
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// The `y`/`m`/`n` constants, comparable on the tristate lattice.
#[derive(Debug, Clone, Copy)]
struct TriVal(Tristate);

impl UserData for TriVal {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.0.to_string()));
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: UserDataRef<TriVal>| {
            Ok(this.0 == other.0)
        });
        methods.add_meta_method(MetaMethod::Lt, |_, this, other: UserDataRef<TriVal>| {
            Ok(this.0 < other.0)
        });
        methods.add_meta_method(MetaMethod::Le, |_, this, other: UserDataRef<TriVal>| {
            Ok(this.0 <= other.0)
        });
    }
}

/// Result of `ver(...)`, comparable with other version tags.
#[derive(Debug, Clone)]
struct VersionTag(KernelVersion);

impl UserData for VersionTag {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.0.to_string()));
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: UserDataRef<VersionTag>| {
            Ok(this.0 == other.0)
        });
        methods.add_meta_method(MetaMethod::Lt, |_, this, other: UserDataRef<VersionTag>| {
            Ok(this.0 < other.0)
        });
        methods.add_meta_method(MetaMethod::Le, |_, this, other: UserDataRef<VersionTag>| {
            Ok(this.0 <= other.0)
        });
    }
}

/// Convert a Lua argument into a validator request.
fn to_request(value: &Value) -> Result<Request, String> {
    match value {
        Value::Boolean(b) => Ok(Request::Bool(*b)),
        Value::Integer(i) => {
            u64::try_from(*i)
                .map(Request::Number)
                .map_err(|_| "negative values are not assignable".to_string())
        }
        Value::Number(f) => {
            if f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64 {
                Ok(Request::Number(*f as u64))
            } else {
                Err(format!("{f} is not an assignable integer"))
            }
        }
        Value::String(s) => s
            .to_str()
            .map(|s| Request::Auto(s.to_string()))
            .map_err(|_| "value is not valid UTF-8".to_string()),
        Value::UserData(ud) => ud
            .borrow::<TriVal>()
            .map(|tri| Request::Tristate(tri.0))
            .map_err(|_| "unsupported value type".to_string()),
        other => Err(format!("unsupported value type {}", other.type_name())),
    }
}

// ---------------------------------------------------------------------------
// Symbol proxies
// ---------------------------------------------------------------------------

/// A named handle to a kernel symbol, bound on first global lookup.
struct SymbolProxy {
    bridge: Rc<Bridge>,
    name: String,
}

impl SymbolProxy {
    fn assign(&self, lua: &Lua, value: &Value) -> mlua::Result<()> {
        let origin = call_origin(lua);
        let request = to_request(value).map_err(mlua::Error::runtime)?;
        if let Err(error) = validate::assign(&self.bridge, &self.name, request, origin.clone()) {
            validate::report(&error, Some(&origin));
            return Err(reported(error.kind()));
        }
        Ok(())
    }

    fn satisfy(&self, lua: &Lua, argument: &Value) -> mlua::Result<()> {
        let origin = call_origin(lua);

        // Accept both `satisfy("y")` and `satisfy{ "y", recursive = true }`.
        let (value, recursive) = match argument {
            Value::Table(table) => {
                let value: Value = table.get(1)?;
                let recursive: Option<bool> = table.get("recursive")?;
                (value, recursive.unwrap_or(false))
            }
            other => (other.clone(), false),
        };
        let desired = match to_request(&value).map_err(mlua::Error::runtime)? {
            Request::Auto(s) => s
                .parse::<Tristate>()
                .map_err(|_| mlua::Error::runtime("satisfy expects a tristate value"))?,
            Request::Tristate(t) => t,
            Request::Bool(b) => b.into(),
            _ => return Err(mlua::Error::runtime("satisfy expects a tristate value")),
        };

        let plan = match satisfier::solve(
            &self.bridge,
            &self.name,
            SolveOptions {
                desired,
                recursive,
            },
        ) {
            Ok(plan) => plan,
            Err(error) => {
                satisfier::report(&error);
                crate::journal::print_location(&origin);
                return Err(reported(error.kind()));
            }
        };

        for (symbol, value) in plan {
            if let Err(error) = validate::assign(
                &self.bridge,
                &symbol,
                Request::Tristate(value),
                origin.clone(),
            ) {
                validate::report(&error, Some(&origin));
                return Err(reported(error.kind()));
            }
        }
        Ok(())
    }

    fn current_value<'lua>(&self, lua: &'lua Lua) -> mlua::Result<Value<'lua>> {
        let Some(symbol) = self.bridge.symbol(&self.name) else {
            return Ok(Value::Nil);
        };
        Ok(match symbol.symbol_type() {
            SymbolType::Boolean | SymbolType::Tristate => {
                Value::UserData(lua.create_userdata(TriVal(symbol.tristate_value()))?)
            }
            SymbolType::Int | SymbolType::Hex => {
                match i64::try_from(match symbol.value() {
                    crate::bridge::SymbolValue::Int(v) | crate::bridge::SymbolValue::Hex(v) => v,
                    _ => 0,
                }) {
                    Ok(v) => Value::Integer(v),
                    Err(_) => Value::String(lua.create_string(symbol.string_value())?),
                }
            }
            _ => Value::String(lua.create_string(symbol.string_value())?),
        })
    }

    fn matches(&self, value: &Value) -> mlua::Result<bool> {
        let Some(symbol) = self.bridge.symbol(&self.name) else {
            return Ok(false);
        };
        let result = match symbol.symbol_type() {
            SymbolType::Boolean | SymbolType::Tristate => {
                let expected = match value {
                    Value::Boolean(b) => Some(Tristate::from(*b)),
                    Value::String(s) => s.to_str().ok().and_then(|s| s.parse().ok()),
                    Value::UserData(ud) => ud.borrow::<TriVal>().ok().map(|t| t.0),
                    _ => None,
                };
                expected == Some(symbol.tristate_value())
            }
            SymbolType::Int | SymbolType::Hex => {
                let radix_value = |s: &str| {
                    let s = s.trim();
                    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                        u64::from_str_radix(hex, 16).ok()
                    } else {
                        s.parse::<u64>().ok()
                    }
                };
                let expected = match value {
                    Value::Integer(i) => u64::try_from(*i).ok(),
                    Value::String(s) => s.to_str().ok().and_then(|s| radix_value(s)),
                    _ => None,
                };
                let current = match symbol.value() {
                    crate::bridge::SymbolValue::Int(v) | crate::bridge::SymbolValue::Hex(v) => v,
                    _ => return Ok(false),
                };
                expected == Some(current)
            }
            _ => match value {
                Value::String(s) => {
                    s.to_str().map(|s| s == symbol.string_value()).unwrap_or(false)
                }
                _ => false,
            },
        };
        Ok(result)
    }
}

impl UserData for SymbolProxy {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        // NET("y")
        methods.add_meta_method(MetaMethod::Call, |lua, this, args: Variadic<Value>| {
            let value = args.first().cloned().unwrap_or(Value::Nil);
            this.assign(lua, &value)
        });

        // NET:set("y")
        methods.add_method("set", |lua, this, value: Value| this.assign(lua, &value));

        // WLAN_VENDOR_REALTEK:satisfy{ "y", recursive = true }
        methods.add_method("satisfy", |lua, this, argument: Value| {
            this.satisfy(lua, &argument)
        });

        // NET:value()
        methods.add_method("value", |lua, this, ()| this.current_value(lua));

        // NET:is(y)
        methods.add_method("is", |_, this, value: Value| this.matches(&value));

        // NET:type()
        methods.add_method("type", |_, this, ()| {
            Ok(this
                .bridge
                .symbol(&this.name)
                .map(|s| s.symbol_type().to_string()))
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(this.name.clone())
        });
    }
}

// ---------------------------------------------------------------------------
// Global environment
// ---------------------------------------------------------------------------

fn register_api(lua: &Lua, bridge: &Rc<Bridge>) -> mlua::Result<()> {
    let globals = lua.globals();

    globals.set("y", TriVal(Tristate::Yes))?;
    globals.set("m", TriVal(Tristate::Mod))?;
    globals.set("n", TriVal(Tristate::No))?;

    globals.set("kernel_dir", bridge.kernel_dir.display().to_string())?;
    globals.set(
        "kernel_version",
        VersionTag(bridge.kernel_version().clone()),
    )?;

    let b = bridge.clone();
    globals.set(
        "kernel_env",
        lua.create_function(move |_, name: String| Ok(b.get_env(&name)))?,
    )?;

    globals.set(
        "ver",
        lua.create_function(|_, raw: String| {
            KernelVersion::parse(&raw)
                .map(VersionTag)
                .ok_or_else(|| mlua::Error::runtime(format!("invalid version string {raw:?}")))
        })?,
    )?;

    // Strict merge: every line goes through the validator and pins.
    let b = bridge.clone();
    globals.set(
        "load_kconfig",
        lua.create_function(move |_, path: String| {
            let content = fs::read_to_string(&path).map_err(|e| {
                mlua::Error::runtime(format!("could not read {path}: {e}"))
            })?;
            crate::script::flat::apply_content(&b, &path, &content).map_err(|error| {
                match error.downcast::<Reported>() {
                    Ok(r) => reported(r.0),
                    Err(other) => mlua::Error::runtime(other.to_string()),
                }
            })
        })?,
    )?;

    // Unchecked merge through the kernel's own loader: no validation, no
    // pinning. The defconfig path.
    let b = bridge.clone();
    globals.set(
        "load_kconfig_unchecked",
        lua.create_function(move |_, path: String| {
            b.read_config_unchecked(Path::new(&path))
                .map_err(mlua::Error::external)
        })?,
    )?;

    // Resolve unknown globals against the symbol registry.
    let b = bridge.clone();
    let lookup = lua.create_function(move |lua, (_table, key): (Table, Value)| {
        let Value::String(key) = key else {
            return Ok(Value::Nil);
        };
        let Ok(name) = key.to_str() else {
            return Ok(Value::Nil);
        };
        // Bind anything that plausibly names a symbol, even when it does not
        // exist in this kernel: using the handle then fails with a proper
        // unknown-symbol diagnostic instead of a bare nil error. Ordinary
        // lowercase identifiers keep resolving to nil like plain Lua.
        let looks_like_symbol = name.starts_with("CONFIG_")
            || name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if b.symbol(name).is_none() && !looks_like_symbol {
            return Ok(Value::Nil);
        }
        let canonical = name.strip_prefix("CONFIG_").unwrap_or(name).to_string();
        let proxy = SymbolProxy {
            bridge: b.clone(),
            name: canonical,
        };
        Ok(Value::UserData(lua.create_userdata(proxy)?))
    })?;
    let metatable = lua.create_table()?;
    metatable.set("__index", lookup)?;
    globals.set_metatable(Some(metatable));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Host types that do not need a bridge.

    #[test]
    fn tristate_constants_compare_on_the_lattice() {
        let lua = Lua::new();
        lua.globals().set("y", TriVal(Tristate::Yes)).unwrap();
        lua.globals().set("m", TriVal(Tristate::Mod)).unwrap();
        lua.globals().set("n", TriVal(Tristate::No)).unwrap();

        let result: bool = lua.load("return n < m and m < y and y == y").eval().unwrap();
        assert!(result);
        let rendered: String = lua.load("return tostring(m)").eval().unwrap();
        assert_eq!(rendered, "m");
    }

    #[test]
    fn version_tags_compare_numerically() {
        let lua = Lua::new();
        lua.globals()
            .set(
                "ver",
                lua.create_function(|_, raw: String| {
                    KernelVersion::parse(&raw)
                        .map(VersionTag)
                        .ok_or_else(|| mlua::Error::runtime("bad version"))
                })
                .unwrap(),
            )
            .unwrap();
        lua.globals()
            .set(
                "kernel_version",
                VersionTag(KernelVersion::parse("5.4.0").unwrap()),
            )
            .unwrap();

        let result: bool = lua
            .load("return kernel_version < ver(\"5.6\") and ver(\"4.10\") > ver(\"4.9\")")
            .eval()
            .unwrap();
        assert!(result);
    }

    #[test]
    fn to_request_conversions() {
        assert_eq!(
            to_request(&Value::Boolean(true)),
            Ok(Request::Bool(true))
        );
        assert_eq!(to_request(&Value::Integer(7)), Ok(Request::Number(7)));
        assert!(to_request(&Value::Integer(-1)).is_err());
        assert!(to_request(&Value::Nil).is_err());
    }
}
