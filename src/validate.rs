//! The assignment validator.
//!
//! Every value a user statement wants to give a symbol funnels through
//! [`assign`], which enforces, in order: symbol existence, type and range
//! coercion, pin consistency, visibility and dependency bounds, choice-group
//! exclusivity, and finally that Kconfig's post-recalculation state matches
//! what was requested. Any failure aborts the statement with a diagnostic
//! that points at the user's source line.

use std::fmt;

use crossterm::style::Color;
use thiserror::Error;

use crate::bridge::{Bridge, Symbol, SymbolType, SymbolValue, Tristate};
use crate::journal::{self, Origin, PinCheck, Provenance, Record};
use crate::satisfier::{self, SolveOptions};

/// A raw value as it arrives from a dialect, before coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Untyped text, e.g. from the flat dialect or a Lua string.
    Auto(String),
    Bool(bool),
    Tristate(Tristate),
    Number(u64),
    Text(String),
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Auto(s) => write!(f, "{s:?}"),
            Request::Bool(b) => write!(f, "{}", Tristate::from(*b)),
            Request::Tristate(t) => write!(f, "{t}"),
            Request::Number(n) => write!(f, "{n}"),
            Request::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Why Kconfig refused a value the validator could not rule out earlier.
#[derive(Debug, Clone)]
pub enum RejectCause {
    /// No prompt: only a `select` from elsewhere can activate the symbol.
    SelectDriven { selectors: Vec<String> },
    /// The evaluated reverse dependency forbids lowering the value.
    RequiredBy {
        selectors: Vec<String>,
        window: (Tristate, Tristate),
    },
    /// Choice groups are assigned through their members.
    ChoiceGroup,
    ConstSymbol,
    Unexplained,
}

/// User-visible assignment failures, one variant per taxonomy kind.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("unknown symbol {name}")]
    UnknownSymbol { name: String },

    #[error("invalid value {value} for {stype} symbol {symbol}: {reason}")]
    InvalidValue {
        symbol: String,
        stype: SymbolType,
        value: String,
        reason: String,
    },

    #[error("cannot set {symbol}={value}, the symbol has unmet direct dependencies")]
    UnmetDirectDependencies {
        symbol: String,
        value: Tristate,
        /// Rendered visibility expression.
        expression: String,
        /// The sub-clauses that currently evaluate to `n`.
        unmet: Vec<String>,
        /// Currently assignable window `[rev_dep, visibility]`.
        window: (Tristate, Tristate),
        /// Prerequisite assignments computed by the satisfier, when it
        /// found an unambiguous solution.
        suggestion: Option<Vec<(String, Tristate)>>,
    },

    #[error("kconfig rejected {symbol}={requested} (effective value is {observed})")]
    AssignmentRejected {
        symbol: String,
        requested: String,
        observed: String,
        cause: RejectCause,
    },

    #[error("conflicting assignment of {symbol} to {value} (previously {previous_value})")]
    ConflictingAssignment {
        symbol: String,
        value: String,
        previous_value: String,
        previous: Origin,
    },
}

/// Coarse error classes used for process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Bridge,
    UnsupportedKernel,
    InvalidAssignment,
    UnmetDependencies,
    AmbiguousChoice,
    Other,
}

impl AssignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssignError::UnmetDirectDependencies { .. } => ErrorKind::UnmetDependencies,
            _ => ErrorKind::InvalidAssignment,
        }
    }
}

/// Marker wrapped around errors whose diagnostic was already printed; the
/// top level maps it to an exit code without reprinting.
#[derive(Debug, Error)]
#[error("aborting due to previous error")]
pub struct Reported(pub ErrorKind);

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Validate and apply one explicit assignment.
pub fn assign(
    bridge: &Bridge,
    name: &str,
    request: Request,
    origin: Origin,
) -> Result<(), AssignError> {
    let symbol = bridge.symbol(name).ok_or_else(|| AssignError::UnknownSymbol {
        name: name.to_string(),
    })?;
    let symbol_name = symbol.name_owned().unwrap_or_else(|| name.to_string());

    let value = coerce(
        symbol.symbol_type(),
        symbol.int_range(),
        modules_enabled(bridge),
        &request,
    )
    .map_err(|reason| AssignError::InvalidValue {
        symbol: symbol_name.clone(),
        stype: symbol.symbol_type(),
        value: request.to_string(),
        reason,
    })?;

    match bridge.journal.check_explicit(&symbol_name, &value) {
        PinCheck::Fresh => {}
        PinCheck::Duplicate { previous } => {
            journal::warn_duplicate(&symbol_name, &value, &origin, &previous);
        }
        PinCheck::Conflict {
            previous_value,
            previous,
        } => {
            return Err(AssignError::ConflictingAssignment {
                symbol: symbol_name,
                value: value.to_string(),
                previous_value: previous_value.to_string(),
                previous,
            })
        }
    }

    let before = symbol.string_value();
    apply(bridge, &symbol, &symbol_name, &value, &origin)?;

    bridge.journal.commit_explicit(Record {
        symbol: symbol_name,
        requested: value,
        before,
        after: symbol.string_value(),
        origin,
        provenance: Provenance::Explicit,
    });
    Ok(())
}

fn modules_enabled(bridge: &Bridge) -> bool {
    bridge
        .symbol("MODULES")
        .map(|m| m.tristate_value() != Tristate::No)
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Coercion (allowed forms per symbol type)
// ---------------------------------------------------------------------------

fn coerce(
    stype: SymbolType,
    range: Option<(u64, u64)>,
    modules_enabled: bool,
    request: &Request,
) -> Result<SymbolValue, String> {
    match stype {
        SymbolType::Unknown => Err("the symbol has no declared type".into()),

        SymbolType::Boolean => match request {
            Request::Auto(s) => match s.as_str() {
                "y" => Ok(SymbolValue::Boolean(true)),
                "n" => Ok(SymbolValue::Boolean(false)),
                _ => Err("allowed values are: n, y".into()),
            },
            Request::Bool(b) => Ok(SymbolValue::Boolean(*b)),
            Request::Tristate(Tristate::Mod) => Err("allowed values are: n, y".into()),
            Request::Tristate(t) => Ok(SymbolValue::Boolean(*t == Tristate::Yes)),
            _ => Err("expected a boolean (n or y)".into()),
        },

        SymbolType::Tristate => {
            let tri = match request {
                Request::Auto(s) => s
                    .parse::<Tristate>()
                    .map_err(|_| "allowed values are: n, m, y".to_string())?,
                Request::Bool(b) => (*b).into(),
                Request::Tristate(t) => *t,
                _ => return Err("expected a tristate (n, m or y)".into()),
            };
            if tri == Tristate::Mod && !modules_enabled {
                return Err("module support is not enabled (set MODULES=y first)".into());
            }
            Ok(SymbolValue::Tristate(tri))
        }

        SymbolType::Int => {
            let value = match request {
                Request::Auto(s) => s
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| "cannot be parsed as a base-10 integer".to_string())?,
                Request::Number(n) => *n,
                _ => return Err("expected an integer".into()),
            };
            check_range(value, range, false)?;
            Ok(SymbolValue::Int(value))
        }

        SymbolType::Hex => {
            let value = match request {
                Request::Auto(s) => {
                    let s = s.trim();
                    let digits = s
                        .strip_prefix("0x")
                        .or_else(|| s.strip_prefix("0X"))
                        .ok_or_else(|| "hexadecimal values must start with 0x".to_string())?;
                    u64::from_str_radix(digits, 16)
                        .map_err(|_| "cannot be parsed as a hexadecimal integer".to_string())?
                }
                Request::Number(n) => *n,
                _ => return Err("expected a hexadecimal integer".into()),
            };
            check_range(value, range, true)?;
            Ok(SymbolValue::Hex(value))
        }

        SymbolType::String => match request {
            Request::Auto(s) | Request::Text(s) => Ok(SymbolValue::String(s.clone())),
            Request::Number(n) => Ok(SymbolValue::String(n.to_string())),
            _ => Err("expected a string".into()),
        },
    }
}

fn check_range(value: u64, range: Option<(u64, u64)>, hex: bool) -> Result<(), String> {
    if let Some((lo, hi)) = range {
        if value < lo || value > hi {
            return Err(if hex {
                format!("value must be in range [{lo:#x}, {hi:#x}]")
            } else {
                format!("value must be in range [{lo}, {hi}]")
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Application against live Kconfig state
// ---------------------------------------------------------------------------

fn apply(
    bridge: &Bridge,
    symbol: &Symbol,
    name: &str,
    value: &SymbolValue,
    origin: &Origin,
) -> Result<(), AssignError> {
    match value {
        SymbolValue::Boolean(b) => apply_tristate(bridge, symbol, name, (*b).into(), origin),
        SymbolValue::Tristate(t) => apply_tristate(bridge, symbol, name, *t, origin),
        SymbolValue::Int(v) => apply_text(bridge, symbol, name, value, &v.to_string()),
        SymbolValue::Hex(v) => apply_text(bridge, symbol, name, value, &format!("{v:#x}")),
        SymbolValue::String(s) => apply_text(bridge, symbol, name, value, s),
    }
}

fn rendered_or_clauses(symbol: &Symbol) -> Vec<String> {
    symbol
        .reverse_dep_expression()
        .ok()
        .flatten()
        .map(|expr| expr.or_clauses().iter().map(|c| c.to_string()).collect())
        .unwrap_or_default()
}

fn reject(
    symbol: &Symbol,
    name: &str,
    requested: impl fmt::Display,
    cause: RejectCause,
) -> AssignError {
    AssignError::AssignmentRejected {
        symbol: name.to_string(),
        requested: requested.to_string(),
        observed: symbol.string_value(),
        cause,
    }
}

fn apply_tristate(
    bridge: &Bridge,
    symbol: &Symbol,
    name: &str,
    value: Tristate,
    origin: &Origin,
) -> Result<(), AssignError> {
    if symbol.is_const() {
        return Err(reject(symbol, name, value, RejectCause::ConstSymbol));
    }
    if symbol.is_choice() {
        return Err(reject(symbol, name, value, RejectCause::ChoiceGroup));
    }
    if symbol.prompt_count() == 0 {
        return Err(reject(
            symbol,
            name,
            value,
            RejectCause::SelectDriven {
                selectors: rendered_or_clauses(symbol),
            },
        ));
    }

    let window = (symbol.rev_dep_floor(), symbol.visibility());
    if value > window.1 {
        let expression = symbol
            .visibility_expression()
            .ok()
            .flatten()
            .unwrap_or(crate::bridge::Expr::Const(false));
        let unmet = expression
            .unmet_clauses(value)
            .iter()
            .map(|c| c.to_string())
            .collect();
        let suggestion = satisfier::solve(
            bridge,
            name,
            SolveOptions {
                desired: value,
                recursive: true,
            },
        )
        .ok()
        .filter(|steps| !steps.is_empty());
        return Err(AssignError::UnmetDirectDependencies {
            symbol: name.to_string(),
            value,
            expression: expression.to_string(),
            unmet,
            window,
            suggestion,
        });
    }
    if value < window.0 {
        return Err(reject(
            symbol,
            name,
            value,
            RejectCause::RequiredBy {
                selectors: rendered_or_clauses(symbol),
                window,
            },
        ));
    }

    // Choice exclusivity: displace any sibling currently at y before raising
    // this member, remembering enough to undo on failure.
    let mut displaced: Vec<(Symbol, Tristate)> = Vec::new();
    if value == Tristate::Yes {
        if let Some(group) = symbol.choice_group() {
            for member in group.choice_members() {
                if member.handle() == symbol.handle() {
                    continue;
                }
                let current = member.tristate_value();
                if current == Tristate::Yes {
                    member.write_tristate(Tristate::No);
                    displaced.push((member, current));
                }
            }
        }
    }

    let rollback = |bridge: &Bridge, displaced: &[(Symbol, Tristate)]| {
        for (member, previous) in displaced {
            member.write_tristate(*previous);
        }
        bridge.recalculate_all();
    };

    if !symbol.write_tristate(value) {
        rollback(bridge, &displaced);
        return Err(reject(symbol, name, value, RejectCause::Unexplained));
    }
    bridge.recalculate_all();

    let observed = symbol.tristate_value();
    if observed != value {
        rollback(bridge, &displaced);
        return Err(reject(symbol, name, value, RejectCause::Unexplained));
    }

    // The displacement writes were accepted; journal them as derived.
    for (member, _) in &displaced {
        if let Some(member_name) = member.name_owned() {
            bridge.journal.commit_implicit(Record {
                symbol: member_name,
                requested: SymbolValue::Tristate(Tristate::No),
                before: "y".into(),
                after: member.string_value(),
                origin: origin.clone(),
                provenance: Provenance::Implicit,
            });
        }
    }
    Ok(())
}

fn apply_text(
    bridge: &Bridge,
    symbol: &Symbol,
    name: &str,
    value: &SymbolValue,
    rendered: &str,
) -> Result<(), AssignError> {
    if symbol.is_const() {
        return Err(reject(symbol, name, value, RejectCause::ConstSymbol));
    }
    if symbol.prompt_count() == 0 {
        return Err(reject(
            symbol,
            name,
            value,
            RejectCause::SelectDriven {
                selectors: rendered_or_clauses(symbol),
            },
        ));
    }
    let visibility = symbol.visibility();
    if visibility == Tristate::No {
        let expression = symbol
            .visibility_expression()
            .ok()
            .flatten()
            .unwrap_or(crate::bridge::Expr::Const(false));
        let unmet = expression
            .unmet_clauses(Tristate::Mod)
            .iter()
            .map(|c| c.to_string())
            .collect();
        return Err(AssignError::UnmetDirectDependencies {
            symbol: name.to_string(),
            value: Tristate::Yes,
            expression: expression.to_string(),
            unmet,
            window: (Tristate::No, visibility),
            suggestion: None,
        });
    }

    if !symbol.write_string(rendered) {
        return Err(reject(symbol, name, value, RejectCause::Unexplained));
    }
    bridge.recalculate_all();

    if &symbol.value() != value {
        return Err(reject(symbol, name, value, RejectCause::Unexplained));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Print the full colorized diagnostic for a failed assignment.
pub fn report(error: &AssignError, origin: Option<&Origin>) {
    use crate::journal::{gutter, paint, print_location};

    eprintln!("{}: {error}", paint("error", Color::Red));
    if let Some(origin) = origin {
        print_location(origin);
    }

    let bar = gutter();
    match error {
        AssignError::UnmetDirectDependencies {
            expression,
            unmet,
            window,
            suggestion,
            ..
        } => {
            eprintln!(
                "{}: the dependency expression currently evaluates below the requested value",
                paint("note", Color::Green)
            );
            eprintln!("   {bar} {expression}");
            if !unmet.is_empty() {
                eprintln!(
                    "{}: these clauses are currently false",
                    paint("note", Color::Green)
                );
                for clause in unmet {
                    eprintln!("   {bar} - {clause}");
                }
            }
            eprintln!(
                "   {} note: the range of assignable values is currently [min={}, max={}]",
                paint("=", Color::Blue),
                window.0,
                window.1
            );
            if let Some(steps) = suggestion {
                eprintln!(
                    "{}: you may want to set these symbols beforehand",
                    paint("note", Color::Green)
                );
                for (name, value) in steps {
                    eprintln!("   {bar} {name} \"{value}\"");
                }
            }
        }
        AssignError::AssignmentRejected { cause, .. } => match cause {
            RejectCause::SelectDriven { selectors } => {
                eprintln!(
                    "{}: the symbol has no prompt and is set by select; satisfy one of",
                    paint("note", Color::Green)
                );
                if selectors.is_empty() {
                    eprintln!("   {bar} (nothing selects this symbol)");
                }
                for clause in selectors {
                    eprintln!("   {bar} - {clause}");
                }
            }
            RejectCause::RequiredBy { selectors, window } => {
                eprintln!(
                    "{}: the symbol is required by at least one other symbol",
                    paint("note", Color::Green)
                );
                for clause in selectors {
                    eprintln!("   {bar} - {clause}");
                }
                eprintln!(
                    "   {} note: the range of assignable values is currently [min={}, max={}]",
                    paint("=", Color::Blue),
                    window.0,
                    window.1
                );
            }
            RejectCause::ChoiceGroup => {
                eprintln!(
                    "{}: choice groups cannot be assigned directly; set one of their members to y",
                    paint("note", Color::Green)
                );
            }
            RejectCause::ConstSymbol => {
                eprintln!("{}: constant symbols never change", paint("note", Color::Green));
            }
            RejectCause::Unexplained => {}
        },
        AssignError::ConflictingAssignment {
            previous_value,
            previous,
            ..
        } => {
            eprintln!(
                "{}: previously assigned to {previous_value} here",
                paint("note", Color::Green)
            );
            print_location(previous);
        }
        AssignError::UnknownSymbol { .. } | AssignError::InvalidValue { .. } => {}
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_rejects_mod() {
        let err = coerce(SymbolType::Boolean, None, true, &Request::Auto("m".into())).unwrap_err();
        assert!(err.contains("n, y"), "unexpected reason: {err}");
        assert!(coerce(SymbolType::Boolean, None, true, &Request::Auto("q".into())).is_err());
    }

    #[test]
    fn boolean_accepts_y_n() {
        assert_eq!(
            coerce(SymbolType::Boolean, None, false, &Request::Auto("y".into())),
            Ok(SymbolValue::Boolean(true))
        );
        assert_eq!(
            coerce(SymbolType::Boolean, None, false, &Request::Bool(false)),
            Ok(SymbolValue::Boolean(false))
        );
    }

    #[test]
    fn tristate_requires_module_support_for_m() {
        let err =
            coerce(SymbolType::Tristate, None, false, &Request::Auto("m".into())).unwrap_err();
        assert!(err.contains("MODULES"), "unexpected reason: {err}");
        assert_eq!(
            coerce(SymbolType::Tristate, None, true, &Request::Auto("m".into())),
            Ok(SymbolValue::Tristate(Tristate::Mod))
        );
    }

    #[test]
    fn int_respects_declared_range() {
        let range = Some((0, 7));
        assert_eq!(
            coerce(SymbolType::Int, range, true, &Request::Auto("7".into())),
            Ok(SymbolValue::Int(7))
        );
        let err = coerce(SymbolType::Int, range, true, &Request::Auto("9".into())).unwrap_err();
        assert!(err.contains("[0, 7]"), "unexpected reason: {err}");
        assert!(coerce(SymbolType::Int, range, true, &Request::Auto("0x9".into())).is_err());
    }

    #[test]
    fn hex_requires_prefix() {
        let err = coerce(SymbolType::Hex, None, true, &Request::Auto("ff".into())).unwrap_err();
        assert!(err.contains("0x"), "unexpected reason: {err}");
        assert_eq!(
            coerce(SymbolType::Hex, None, true, &Request::Auto("0xFF".into())),
            Ok(SymbolValue::Hex(0xff))
        );
        // Typed numbers skip the textual prefix requirement.
        assert_eq!(
            coerce(SymbolType::Hex, None, true, &Request::Number(0x1f)),
            Ok(SymbolValue::Hex(0x1f))
        );
    }

    #[test]
    fn hex_range_renders_in_hex() {
        let err = coerce(
            SymbolType::Hex,
            Some((0x10, 0x20)),
            true,
            &Request::Auto("0x30".into()),
        )
        .unwrap_err();
        assert!(err.contains("0x10"), "unexpected reason: {err}");
    }

    #[test]
    fn string_accepts_anything_textual() {
        assert_eq!(
            coerce(SymbolType::String, None, true, &Request::Text("a b".into())),
            Ok(SymbolValue::String("a b".into()))
        );
        assert_eq!(
            coerce(SymbolType::String, None, true, &Request::Number(5)),
            Ok(SymbolValue::String("5".into()))
        );
        assert!(coerce(SymbolType::String, None, true, &Request::Bool(true)).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(coerce(SymbolType::Unknown, None, true, &Request::Auto("y".into())).is_err());
    }
}
