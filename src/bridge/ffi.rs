//! Raw C ABI shared with the Kconfig shim.
//!
//! The structs here mirror the kernel's `struct symbol` and `struct expr`
//! layouts (stable since 4.2), plus the function table exported by the
//! compiled bridge library. Nothing outside `bridge` touches these types
//! directly; [`super::symbol::Symbol`] is the typed view.

use std::borrow::Cow;
use std::ffi::CStr;
use std::fmt;
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use std::str::FromStr;

use bitflags::bitflags;
use libloading::os::unix::Symbol as RawFn;
use libloading::{Library, Symbol as LibFn};

/// The Kconfig three-valued logic, ordered `n < m < y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub enum Tristate {
    No,
    Mod,
    Yes,
}

impl Tristate {
    /// `!a` on the `n/m/y` = `0/1/2` lattice.
    pub fn invert(self) -> Tristate {
        match self {
            Tristate::No => Tristate::Yes,
            Tristate::Mod => Tristate::Mod,
            Tristate::Yes => Tristate::No,
        }
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Tristate::Yes
        } else {
            Tristate::No
        }
    }
}

impl FromStr for Tristate {
    type Err = ();
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "n" => Ok(Tristate::No),
            "m" => Ok(Tristate::Mod),
            "y" => Ok(Tristate::Yes),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tristate::No => "n",
            Tristate::Mod => "m",
            Tristate::Yes => "y",
        })
    }
}

/// Symbol type as declared in Kconfig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum SymbolType {
    Unknown,
    Boolean,
    Tristate,
    Int,
    Hex,
    String,
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SymbolType::Unknown => "unknown",
            SymbolType::Boolean => "bool",
            SymbolType::Tristate => "tristate",
            SymbolType::Int => "int",
            SymbolType::Hex => "hex",
            SymbolType::String => "string",
        })
    }
}

bitflags! {
    /// Kconfig `SYMBOL_*` flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct SymbolFlags: u32 {
        const CONST     = 0x0001;
        const CHECK     = 0x0008;
        const CHOICE    = 0x0010;
        const CHOICEVAL = 0x0020;
        const VALID     = 0x0080;
        const OPTIONAL  = 0x0100;
        const WRITE     = 0x0200;
        const CHANGED   = 0x0400;
        const WRITTEN   = 0x0800;
        const NOWRITE   = 0x1000;
        const CHECKED   = 0x2000;
        const WARNED    = 0x8000;
    }
}

/// `struct symbol_value`: the raw value slot plus its tristate projection.
#[repr(C)]
pub struct KSymbolValue {
    pub val: *mut c_void,
    pub tri: Tristate,
}

/// Expression node kind (`enum expr_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum KExprType {
    None,
    Or,
    And,
    Not,
    Equal,
    Unequal,
    Lth,
    Leq,
    Gth,
    Geq,
    List,
    Symbol,
    Range,
}

/// Either branch of an expression node (`union expr_data`).
#[repr(C)]
pub union KExprData {
    pub expr: *mut KExpr,
    pub sym: *mut KSymbol,
}

/// `struct expr`.
#[repr(C)]
pub struct KExpr {
    pub etype: KExprType,
    pub left: KExprData,
    pub right: KExprData,
}

/// `struct expr_value`: an expression together with its last evaluation.
#[repr(C)]
pub struct KExprValue {
    pub expr: *mut KExpr,
    pub tri: Tristate,
}

/// `struct symbol`. Field order must match the kernel headers.
#[repr(C)]
pub struct KSymbol {
    next: *mut c_void,
    pub name: *const c_char,
    pub stype: SymbolType,
    pub curr: KSymbolValue,
    pub def: [KSymbolValue; 4],
    pub visible: Tristate,
    pub flags: SymbolFlags,
    properties: *mut c_void,
    pub dir_dep: KExprValue,
    pub rev_dep: KExprValue,
    pub implied: KExprValue,
}

impl KSymbol {
    /// The symbol's name, if it has one (choice groups are anonymous).
    ///
    /// # Safety
    /// `self` must point into the live symbol table of an initialized bridge.
    pub unsafe fn name(&self) -> Option<Cow<'_, str>> {
        if self.name.is_null() {
            None
        } else {
            Some(String::from_utf8_lossy(CStr::from_ptr(self.name).to_bytes()))
        }
    }

    /// The raw current value slot, interpreted as a C string.
    ///
    /// Valid for int/hex/string symbols after a recalculation; tristate
    /// symbols keep their value in `curr.tri` instead.
    ///
    /// # Safety
    /// Same requirement as [`Self::name`].
    pub unsafe fn raw_string_value(&self) -> Option<Cow<'_, str>> {
        let ptr = self.curr.val as *const c_char;
        if ptr.is_null() {
            None
        } else {
            Some(String::from_utf8_lossy(CStr::from_ptr(ptr).to_bytes()))
        }
    }

    pub fn is_const(&self) -> bool {
        self.flags.intersects(SymbolFlags::CONST)
    }

    pub fn is_choice(&self) -> bool {
        self.flags.intersects(SymbolFlags::CHOICE)
    }
}

// Exported entry points of the bridge library. The bridge-specific ones are
// defined in bridge.c; the rest are the kernel's own Kconfig functions, which
// a shared library exports as-is.
type FnInit = extern "C" fn(*const *const c_char) -> c_int;
type FnShutdown = extern "C" fn();
type FnSymbolCount = extern "C" fn() -> usize;
type FnGetAllSymbols = extern "C" fn(*mut *mut KSymbol);
type FnSymCalcValue = extern "C" fn(*mut KSymbol);
type FnSymSetTristate = extern "C" fn(*mut KSymbol, Tristate) -> c_int;
type FnSymSetString = extern "C" fn(*mut KSymbol, *const c_char) -> c_int;
type FnSymGetString = extern "C" fn(*mut KSymbol) -> *const c_char;
type FnConfPath = extern "C" fn(*const c_char) -> c_int;
type FnSymIntBound = extern "C" fn(*mut KSymbol) -> u64;
type FnChoiceSymbols = extern "C" fn(*mut KSymbol, *mut *mut KSymbol) -> usize;
type FnChoiceGroup = extern "C" fn(*mut KSymbol) -> *mut KSymbol;
type FnSymExpr = extern "C" fn(*mut KSymbol) -> *mut KExpr;
type FnSymText = extern "C" fn(*mut KSymbol) -> *const c_char;
type FnSymPromptCount = extern "C" fn(*mut KSymbol) -> usize;
type FnGetEnv = extern "C" fn(*const c_char) -> *const c_char;

/// Resolved function table of the loaded bridge library.
///
/// Holds the [`Library`] so the code stays mapped for as long as any of the
/// raw function pointers below can be called; dropping the table unloads it.
pub struct BridgeVTable {
    #[allow(dead_code)]
    library: Library,
    pub init: RawFn<FnInit>,
    pub shutdown: RawFn<FnShutdown>,
    pub symbol_count: RawFn<FnSymbolCount>,
    pub get_all_symbols: RawFn<FnGetAllSymbols>,
    pub sym_calc_value: RawFn<FnSymCalcValue>,
    pub sym_set_tristate_value: RawFn<FnSymSetTristate>,
    pub sym_set_string_value: RawFn<FnSymSetString>,
    pub sym_get_string_value: RawFn<FnSymGetString>,
    pub conf_write: RawFn<FnConfPath>,
    pub conf_read: RawFn<FnConfPath>,
    pub sym_int_get_min: RawFn<FnSymIntBound>,
    pub sym_int_get_max: RawFn<FnSymIntBound>,
    pub get_choice_symbols: RawFn<FnChoiceSymbols>,
    pub sym_choice_group: RawFn<FnChoiceGroup>,
    pub sym_direct_deps_with_prompts: RawFn<FnSymExpr>,
    pub sym_prompt_count: RawFn<FnSymPromptCount>,
    pub sym_prompt_text: RawFn<FnSymText>,
    pub sym_help_text: RawFn<FnSymText>,
    pub get_env: RawFn<FnGetEnv>,
}

impl BridgeVTable {
    /// Load the bridge library and resolve every entry point.
    ///
    /// # Safety
    /// The library at `path` must be a bridge built from the same kernel
    /// headers this ABI mirrors; calling any resolved function on a foreign
    /// library is undefined behavior.
    pub unsafe fn load(path: &Path) -> Result<BridgeVTable, libloading::Error> {
        let library = Library::new(path)?;

        macro_rules! resolve {
            ($ty:ty, $name:literal) => {
                (library.get($name)? as LibFn<$ty>).into_raw() as RawFn<$ty>
            };
        }

        Ok(BridgeVTable {
            init: resolve!(FnInit, b"autokernel_init"),
            shutdown: resolve!(FnShutdown, b"autokernel_shutdown"),
            symbol_count: resolve!(FnSymbolCount, b"autokernel_symbol_count"),
            get_all_symbols: resolve!(FnGetAllSymbols, b"autokernel_get_all_symbols"),
            sym_calc_value: resolve!(FnSymCalcValue, b"sym_calc_value"),
            sym_set_tristate_value: resolve!(FnSymSetTristate, b"sym_set_tristate_value"),
            sym_set_string_value: resolve!(FnSymSetString, b"sym_set_string_value"),
            sym_get_string_value: resolve!(FnSymGetString, b"sym_get_string_value"),
            conf_write: resolve!(FnConfPath, b"conf_write"),
            conf_read: resolve!(FnConfPath, b"conf_read"),
            sym_int_get_min: resolve!(FnSymIntBound, b"autokernel_sym_int_min"),
            sym_int_get_max: resolve!(FnSymIntBound, b"autokernel_sym_int_max"),
            get_choice_symbols: resolve!(FnChoiceSymbols, b"autokernel_choice_symbols"),
            sym_choice_group: resolve!(FnChoiceGroup, b"autokernel_choice_group"),
            sym_direct_deps_with_prompts: resolve!(FnSymExpr, b"autokernel_deps_with_prompts"),
            sym_prompt_count: resolve!(FnSymPromptCount, b"autokernel_prompt_count"),
            sym_prompt_text: resolve!(FnSymText, b"autokernel_prompt_text"),
            sym_help_text: resolve!(FnSymText, b"autokernel_help_text"),
            get_env: resolve!(FnGetEnv, b"autokernel_getenv"),
            library,
        })
    }

    /// Snapshot the full symbol table, including the three constants.
    pub fn all_symbols(&self) -> Vec<*mut KSymbol> {
        let count = (self.symbol_count)();
        let mut symbols: Vec<*mut KSymbol> = Vec::with_capacity(count);
        (self.get_all_symbols)(symbols.as_mut_ptr());
        // The shim fills exactly `symbol_count()` slots.
        unsafe { symbols.set_len(count) };
        symbols
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    /// Fabricate a standalone symbol for unit tests that never touch the
    /// shared library. Leaks its allocations; fine for test processes.
    pub(crate) fn fab_symbol(
        name: Option<&str>,
        stype: SymbolType,
        tri: Tristate,
        value: Option<&str>,
    ) -> *mut KSymbol {
        let name_ptr = name
            .map(|n| CString::new(n).unwrap().into_raw() as *const c_char)
            .unwrap_or(ptr::null());
        let val_ptr = value
            .map(|v| CString::new(v).unwrap().into_raw() as *mut c_void)
            .unwrap_or(ptr::null_mut());
        let none = || KSymbolValue {
            val: ptr::null_mut(),
            tri: Tristate::No,
        };
        let no_expr = || KExprValue {
            expr: ptr::null_mut(),
            tri: Tristate::No,
        };
        Box::into_raw(Box::new(KSymbol {
            next: ptr::null_mut(),
            name: name_ptr,
            stype,
            curr: KSymbolValue { val: val_ptr, tri },
            def: [none(), none(), none(), none()],
            visible: Tristate::Yes,
            flags: SymbolFlags::empty(),
            properties: ptr::null_mut(),
            dir_dep: no_expr(),
            rev_dep: no_expr(),
            implied: no_expr(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tristate_ordering() {
        assert!(Tristate::No < Tristate::Mod);
        assert!(Tristate::Mod < Tristate::Yes);
        assert_eq!("m".parse::<Tristate>(), Ok(Tristate::Mod));
        assert!("x".parse::<Tristate>().is_err());
        assert_eq!(Tristate::Yes.to_string(), "y");
    }

    #[test]
    fn tristate_invert_is_involutive() {
        for t in [Tristate::No, Tristate::Mod, Tristate::Yes] {
            assert_eq!(t.invert().invert(), t);
        }
    }

    #[test]
    fn tristate_from_bool() {
        assert_eq!(Tristate::from(true), Tristate::Yes);
        assert_eq!(Tristate::from(false), Tristate::No);
    }
}
