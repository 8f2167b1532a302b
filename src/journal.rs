//! Append-only record of every mediated assignment.
//!
//! The journal serves two purposes: it is the memory behind the pinning
//! rules (an explicit assignment commits a symbol to a value; a later
//! explicit assignment with a different value is a conflict), and it carries
//! the source locations that make diagnostics point at user code.
//!
//! Pin states per symbol follow `Unset → Implicit → Explicit`: merges and
//! choice-displacement writes record implicit values that later explicit
//! assignments may overwrite freely; only explicit-vs-explicit disagreements
//! are errors.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crossterm::style::{Attribute, Color, Stylize};
use crossterm::tty::IsTty;

use crate::bridge::SymbolValue;
use crate::verbose;

/// Where an assignment came from: file, line, and (for scripted dialects)
/// the call stack at the moment of the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: String,
    pub line: u32,
    pub traceback: Option<String>,
}

impl Origin {
    pub fn new(file: impl Into<String>, line: u32) -> Origin {
        Origin {
            file: file.into(),
            line,
            traceback: None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Whether the user asked for this value or the system derived it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Explicit,
    Implicit,
}

/// One successfully applied assignment.
#[derive(Debug, Clone)]
pub struct Record {
    pub symbol: String,
    pub requested: SymbolValue,
    /// Effective value before and after, as Kconfig renders them.
    pub before: String,
    pub after: String,
    pub origin: Origin,
    pub provenance: Provenance,
}

#[derive(Debug, Clone)]
struct Pin {
    value: SymbolValue,
    provenance: Provenance,
    origin: Origin,
}

/// Outcome of checking a new explicit assignment against the pin table.
#[derive(Debug)]
pub enum PinCheck {
    /// No prior commitment; proceed.
    Fresh,
    /// Same explicit value assigned before; proceed, but warn.
    Duplicate { previous: Origin },
    /// A different explicit value was already committed.
    Conflict {
        previous_value: SymbolValue,
        previous: Origin,
    },
}

/// The process-wide assignment log. Interior mutability because readers
/// (diagnostics, scripts) and the single writer (the validator) interleave
/// within one thread.
#[derive(Default)]
pub struct Journal {
    records: RefCell<Vec<Record>>,
    pins: RefCell<HashMap<String, Pin>>,
}

impl Journal {
    pub fn new() -> Journal {
        Journal::default()
    }

    /// Check a candidate explicit assignment against previous commitments.
    pub fn check_explicit(&self, symbol: &str, value: &SymbolValue) -> PinCheck {
        match self.pins.borrow().get(symbol) {
            Some(pin) if pin.provenance == Provenance::Explicit => {
                if &pin.value == value {
                    PinCheck::Duplicate {
                        previous: pin.origin.clone(),
                    }
                } else {
                    PinCheck::Conflict {
                        previous_value: pin.value.clone(),
                        previous: pin.origin.clone(),
                    }
                }
            }
            _ => PinCheck::Fresh,
        }
    }

    /// Record an applied explicit assignment and pin the symbol to it.
    pub fn commit_explicit(&self, record: Record) {
        self.pins.borrow_mut().insert(
            record.symbol.clone(),
            Pin {
                value: record.requested.clone(),
                provenance: Provenance::Explicit,
                origin: record.origin.clone(),
            },
        );
        self.records.borrow_mut().push(record);
    }

    /// Record a derived write (merge, choice displacement). Never conflicts;
    /// warns when it shadows an explicit commitment with a different value.
    pub fn commit_implicit(&self, record: Record) {
        let mut pins = self.pins.borrow_mut();
        match pins.get(&record.symbol) {
            Some(pin) if pin.provenance == Provenance::Explicit => {
                if pin.value != record.requested {
                    warn_shadowed(&record, &pin.origin, &pin.value);
                }
                // The explicit pin stands; the implicit write does not
                // weaken the user's commitment.
            }
            _ => {
                pins.insert(
                    record.symbol.clone(),
                    Pin {
                        value: record.requested.clone(),
                        provenance: Provenance::Implicit,
                        origin: record.origin.clone(),
                    },
                );
            }
        }
        drop(pins);
        self.records.borrow_mut().push(record);
    }

    pub fn with_records<R>(&self, f: impl FnOnce(&[Record]) -> R) -> R {
        f(&self.records.borrow())
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Diagnostic rendering
// ---------------------------------------------------------------------------

/// Style `text` for stderr, skipping ANSI codes when piped.
pub fn paint(text: &str, color: Color) -> String {
    if std::io::stderr().is_tty() {
        format!("{}", text.with(color).attribute(Attribute::Bold))
    } else {
        text.to_string()
    }
}

/// Dimmed gutter bar for rustc-style multi-line notes.
pub fn gutter() -> String {
    paint("|", Color::Blue)
}

/// Print the `--> file:line` location line, plus the captured traceback.
pub fn print_location(origin: &Origin) {
    eprintln!("  {} {}", paint("-->", Color::Blue), origin);
    if let Some(traceback) = &origin.traceback {
        let bar = gutter();
        eprintln!("   {bar}");
        for line in traceback.lines() {
            eprintln!("   {bar} {line}");
        }
        eprintln!("   {bar}");
    }
}

/// Warn about an explicit assignment repeating an identical earlier one.
/// Suppressed in quiet mode.
pub fn warn_duplicate(symbol: &str, value: &SymbolValue, origin: &Origin, previous: &Origin) {
    if verbose::is_quiet() {
        return;
    }
    eprintln!(
        "{}: duplicate assignment of {symbol} to {value}",
        paint("warning", Color::Yellow)
    );
    print_location(origin);
    eprintln!(
        "{}: first assigned to the same value here",
        paint("note", Color::Green)
    );
    print_location(previous);
    eprintln!();
}

fn warn_shadowed(record: &Record, pinned_at: &Origin, pinned_value: &SymbolValue) {
    if verbose::is_quiet() {
        return;
    }
    eprintln!(
        "{}: {} was changed to {} by a derived write, shadowing the explicit value {}",
        paint("warning", Color::Yellow),
        record.symbol,
        record.requested,
        pinned_value,
    );
    print_location(&record.origin);
    eprintln!("{}: explicitly set here", paint("note", Color::Green));
    print_location(pinned_at);
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Tristate;

    fn record(symbol: &str, value: SymbolValue, provenance: Provenance, line: u32) -> Record {
        Record {
            symbol: symbol.into(),
            requested: value,
            before: "n".into(),
            after: "y".into(),
            origin: Origin::new("config.lua", line),
            provenance,
        }
    }

    #[test]
    fn fresh_symbol_passes() {
        let journal = Journal::new();
        assert!(matches!(
            journal.check_explicit("NET", &SymbolValue::Tristate(Tristate::Yes)),
            PinCheck::Fresh
        ));
    }

    #[test]
    fn explicit_then_same_value_is_duplicate() {
        let journal = Journal::new();
        let value = SymbolValue::Tristate(Tristate::Yes);
        journal.commit_explicit(record("NET", value.clone(), Provenance::Explicit, 3));

        match journal.check_explicit("NET", &value) {
            PinCheck::Duplicate { previous } => assert_eq!(previous.line, 3),
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn explicit_then_different_value_is_conflict() {
        let journal = Journal::new();
        journal.commit_explicit(record(
            "NET",
            SymbolValue::Tristate(Tristate::Yes),
            Provenance::Explicit,
            3,
        ));

        match journal.check_explicit("NET", &SymbolValue::Tristate(Tristate::No)) {
            PinCheck::Conflict {
                previous_value,
                previous,
            } => {
                assert_eq!(previous_value, SymbolValue::Tristate(Tristate::Yes));
                assert_eq!(previous.line, 3);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn implicit_does_not_pin_against_explicit() {
        let journal = Journal::new();
        journal.commit_implicit(record(
            "NET",
            SymbolValue::Tristate(Tristate::Yes),
            Provenance::Implicit,
            1,
        ));

        // A later explicit assignment of a *different* value is fine.
        assert!(matches!(
            journal.check_explicit("NET", &SymbolValue::Tristate(Tristate::No)),
            PinCheck::Fresh
        ));
    }

    #[test]
    fn implicit_after_explicit_keeps_explicit_pin() {
        let journal = Journal::new();
        journal.commit_explicit(record(
            "NET",
            SymbolValue::Tristate(Tristate::Yes),
            Provenance::Explicit,
            2,
        ));
        journal.commit_implicit(record(
            "NET",
            SymbolValue::Tristate(Tristate::No),
            Provenance::Implicit,
            9,
        ));

        // The explicit pin survives, so re-asserting y is a duplicate and
        // asserting n is a conflict.
        assert!(matches!(
            journal.check_explicit("NET", &SymbolValue::Tristate(Tristate::Yes)),
            PinCheck::Duplicate { .. }
        ));
        assert!(matches!(
            journal.check_explicit("NET", &SymbolValue::Tristate(Tristate::No)),
            PinCheck::Conflict { .. }
        ));
    }

    #[test]
    fn records_accumulate_in_order() {
        let journal = Journal::new();
        journal.commit_explicit(record(
            "A",
            SymbolValue::Boolean(true),
            Provenance::Explicit,
            1,
        ));
        journal.commit_implicit(record(
            "B",
            SymbolValue::Boolean(false),
            Provenance::Implicit,
            2,
        ));
        journal.with_records(|records| {
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].symbol, "A");
            assert_eq!(records[1].symbol, "B");
        });
    }
}
