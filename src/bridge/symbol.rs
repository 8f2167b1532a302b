//! Typed view of a single Kconfig symbol.
//!
//! A [`Symbol`] borrows the bridge and wraps one native handle. All reads go
//! through here; writes are raw primitives that only the assignment validator
//! is supposed to call, so every mutation funnels through one checked path.

use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::fmt;

use super::expr::{Expr, ExprError};
use super::ffi::{KSymbol, SymbolFlags, SymbolType, Tristate};
use super::Bridge;

/// A typed value as requested by a user statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolValue {
    Boolean(bool),
    Tristate(Tristate),
    Int(u64),
    Hex(u64),
    String(String),
}

impl fmt::Display for SymbolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolValue::Boolean(v) => write!(f, "{}", Tristate::from(*v)),
            SymbolValue::Tristate(v) => write!(f, "{v}"),
            SymbolValue::Int(v) => write!(f, "{v}"),
            SymbolValue::Hex(v) => write!(f, "{v:#x}"),
            SymbolValue::String(v) => write!(f, "{v:?}"),
        }
    }
}

#[derive(Clone, Copy)]
pub struct Symbol<'b> {
    raw: *mut KSymbol,
    pub bridge: &'b Bridge,
}

impl<'b> Symbol<'b> {
    pub(super) fn new(raw: *mut KSymbol, bridge: &'b Bridge) -> Symbol<'b> {
        Symbol { raw, bridge }
    }

    pub(crate) fn handle(&self) -> *mut KSymbol {
        self.raw
    }

    pub fn name(&self) -> Option<Cow<'_, str>> {
        unsafe { (*self.raw).name() }
    }

    /// Like [`Self::name`], for callers that need to keep the string.
    pub fn name_owned(&self) -> Option<String> {
        self.name().map(|n| n.into_owned())
    }

    pub fn symbol_type(&self) -> SymbolType {
        unsafe { (*self.raw).stype }
    }

    pub fn flags(&self) -> SymbolFlags {
        unsafe { (*self.raw).flags }
    }

    pub fn is_const(&self) -> bool {
        unsafe { (*self.raw).is_const() }
    }

    pub fn is_choice(&self) -> bool {
        unsafe { (*self.raw).is_choice() }
    }

    pub fn is_choice_member(&self) -> bool {
        self.flags().intersects(SymbolFlags::CHOICEVAL)
    }

    /// Number of prompts attached to the symbol. Zero means the symbol has
    /// no user-facing knob and can only change through selects or defaults.
    pub fn prompt_count(&self) -> usize {
        (self.bridge.vtable.sym_prompt_count)(self.raw)
    }

    /// Re-evaluate this symbol's value and visibility.
    pub fn recalculate(&self) {
        (self.bridge.vtable.sym_calc_value)(self.raw);
    }

    /// Current visibility, freshly recalculated. The upper bound on what a
    /// user may assign.
    pub fn visibility(&self) -> Tristate {
        self.recalculate();
        unsafe { (*self.raw).visible }
    }

    /// Evaluated reverse dependency. The lower bound forced by selects.
    pub fn rev_dep_floor(&self) -> Tristate {
        unsafe { (*self.raw).rev_dep.tri }
    }

    pub fn tristate_value(&self) -> Tristate {
        unsafe { (*self.raw).curr.tri }
    }

    /// Current value rendered by Kconfig (the form `.config` would contain).
    pub fn string_value(&self) -> String {
        let ptr = (self.bridge.vtable.sym_get_string_value)(self.raw);
        if ptr.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    /// Current value interpreted by the symbol's type.
    pub fn value(&self) -> SymbolValue {
        match self.symbol_type() {
            SymbolType::Boolean => SymbolValue::Boolean(self.tristate_value() == Tristate::Yes),
            SymbolType::Tristate => SymbolValue::Tristate(self.tristate_value()),
            SymbolType::Int => SymbolValue::Int(self.string_value().trim().parse().unwrap_or(0)),
            SymbolType::Hex => {
                let raw = self.string_value();
                let digits = raw.trim().trim_start_matches("0x").trim_start_matches("0X");
                SymbolValue::Hex(u64::from_str_radix(digits, 16).unwrap_or(0))
            }
            SymbolType::String | SymbolType::Unknown => SymbolValue::String(self.string_value()),
        }
    }

    /// The declared numeric range whose guard currently holds, if any.
    pub fn int_range(&self) -> Option<(u64, u64)> {
        match self.symbol_type() {
            SymbolType::Int | SymbolType::Hex => {
                let min = (self.bridge.vtable.sym_int_get_min)(self.raw);
                let max = (self.bridge.vtable.sym_int_get_max)(self.raw);
                if min == 0 && max == 0 {
                    None
                } else {
                    Some((min, max))
                }
            }
            _ => None,
        }
    }

    /// Direct dependencies widened with every prompt's visibility guard —
    /// the expression that must reach the desired value before the symbol
    /// becomes assignable.
    pub fn visibility_expression(&self) -> Result<Option<Expr>, ExprError> {
        let raw = (self.bridge.vtable.sym_direct_deps_with_prompts)(self.raw);
        unsafe { Expr::from_raw(raw) }
    }

    pub fn reverse_dep_expression(&self) -> Result<Option<Expr>, ExprError> {
        unsafe { Expr::from_raw((*self.raw).rev_dep.expr) }
    }

    pub fn implied_expression(&self) -> Result<Option<Expr>, ExprError> {
        unsafe { Expr::from_raw((*self.raw).implied.expr) }
    }

    pub fn direct_dep_expression(&self) -> Result<Option<Expr>, ExprError> {
        unsafe { Expr::from_raw((*self.raw).dir_dep.expr) }
    }

    /// The choice group this symbol belongs to, if it is a choice value.
    pub fn choice_group(&self) -> Option<Symbol<'b>> {
        if !self.is_choice_member() {
            return None;
        }
        let group = (self.bridge.vtable.sym_choice_group)(self.raw);
        if group.is_null() {
            None
        } else {
            Some(Symbol::new(group, self.bridge))
        }
    }

    /// Members of this choice group. Empty unless [`Self::is_choice`].
    pub fn choice_members(&self) -> Vec<Symbol<'b>> {
        if !self.is_choice() {
            return Vec::new();
        }
        let count = (self.bridge.vtable.get_choice_symbols)(self.raw, std::ptr::null_mut());
        let mut raw: Vec<*mut KSymbol> = Vec::with_capacity(count);
        (self.bridge.vtable.get_choice_symbols)(self.raw, raw.as_mut_ptr());
        unsafe { raw.set_len(count) };
        raw.into_iter().map(|s| Symbol::new(s, self.bridge)).collect()
    }

    /// First prompt text, if the symbol has one.
    pub fn prompt_text(&self) -> Option<String> {
        let ptr = (self.bridge.vtable.sym_prompt_text)(self.raw);
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
        }
    }

    /// Help text attached to the symbol's menu entry, if any.
    pub fn help_text(&self) -> Option<String> {
        let ptr = (self.bridge.vtable.sym_help_text)(self.raw);
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
        }
    }

    /// Raw tristate write. Returns whether Kconfig accepted the value.
    /// Callers must follow up with a bridge-wide recalculation.
    pub(crate) fn write_tristate(&self, value: Tristate) -> bool {
        (self.bridge.vtable.sym_set_tristate_value)(self.raw, value) != 0
    }

    /// Raw string-form write, used for int/hex/string symbols.
    pub(crate) fn write_string(&self, value: &str) -> bool {
        let Ok(cstr) = CString::new(value) else {
            return false;
        };
        (self.bridge.vtable.sym_set_string_value)(self.raw, cstr.as_ptr()) != 0
    }
}

impl fmt::Display for Symbol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None if self.is_choice() => {
                let members = self
                    .choice_members()
                    .iter()
                    .filter_map(Symbol::name_owned)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "<choice>[{members}]")
            }
            None => f.write_str("<anonymous>"),
        }
    }
}
