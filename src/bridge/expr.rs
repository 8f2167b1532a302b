//! Owned view of Kconfig dependency expressions.
//!
//! Converts the parser's raw `struct expr` trees into an owned [`Expr`] whose
//! leaves carry stable symbol handles, evaluates them on the `n < m < y`
//! lattice, and renders them for diagnostics. Conversion happens once per
//! query; the owned tree never aliases parser memory.

use std::fmt;

use super::ffi::{KExpr, KExprType, KSymbol, SymbolType, Tristate};

/// A ground comparison or symbol reference at the bottom of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    Symbol(*mut KSymbol),
    Eq(*mut KSymbol, *mut KSymbol),
    Neq(*mut KSymbol, *mut KSymbol),
    Lt(*mut KSymbol, *mut KSymbol),
    Le(*mut KSymbol, *mut KSymbol),
    Gt(*mut KSymbol, *mut KSymbol),
    Ge(*mut KSymbol, *mut KSymbol),
    /// `range` and `list` nodes only occur inside properties; they are kept
    /// so diagnostics can render them, but they do not evaluate.
    Range(*mut KSymbol, *mut KSymbol),
    List,
}

/// A dependency/visibility expression with owned structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Const(bool),
    Leaf(Leaf),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// Raised when a raw expression tree is malformed (null branch where a node
/// is required) or contains a construct [`Expr::eval`] cannot interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprError;

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unsupported or malformed kconfig expression")
    }
}

impl std::error::Error for ExprError {}

impl Expr {
    /// Convert a raw parser tree. `None` input means "no expression".
    ///
    /// # Safety
    /// `raw` must be null or point into the live parse state of an
    /// initialized bridge.
    pub unsafe fn from_raw(raw: *mut KExpr) -> Result<Option<Expr>, ExprError> {
        if raw.is_null() {
            return Ok(None);
        }
        convert(raw).map(Some)
    }

    /// Like [`Self::from_raw`], defaulting an absent expression to `value`.
    ///
    /// # Safety
    /// Same requirements as [`Self::from_raw`].
    pub unsafe fn from_raw_or(raw: *mut KExpr, value: bool) -> Result<Expr, ExprError> {
        Ok(Self::from_raw(raw)?.unwrap_or(Expr::Const(value)))
    }

    /// Evaluate against the current symbol values.
    ///
    /// Comparison semantics follow Kconfig: tristates compare on the lattice,
    /// int/hex parse and compare numerically, everything else compares as
    /// strings. Comparison results are boolean (`y`/`n`).
    pub fn eval(&self) -> Result<Tristate, ExprError> {
        Ok(match self {
            Expr::Const(value) => (*value).into(),
            Expr::Not(e) => e.eval()?.invert(),
            Expr::And(l, r) => l.eval()?.min(r.eval()?),
            Expr::Or(l, r) => l.eval()?.max(r.eval()?),
            Expr::Leaf(leaf) => leaf.eval()?,
        })
    }

    /// Flatten nested conjunctions into their top-level clauses.
    pub fn and_clauses(&self) -> Vec<Expr> {
        match self {
            Expr::And(l, r) => {
                let mut clauses = l.and_clauses();
                clauses.extend(r.and_clauses());
                clauses
            }
            other => vec![other.clone()],
        }
    }

    /// Flatten nested disjunctions into their top-level clauses.
    pub fn or_clauses(&self) -> Vec<Expr> {
        match self {
            Expr::Or(l, r) => {
                let mut clauses = l.or_clauses();
                clauses.extend(r.or_clauses());
                clauses
            }
            other => vec![other.clone()],
        }
    }

    /// The top-level conjunction clauses that currently evaluate below
    /// `wanted` — the parts of a failed dependency worth pointing at.
    pub fn unmet_clauses(&self, wanted: Tristate) -> Vec<Expr> {
        self.and_clauses()
            .into_iter()
            .filter(|clause| clause.eval().map(|v| v < wanted).unwrap_or(true))
            .collect()
    }
}

unsafe fn convert(raw: *mut KExpr) -> Result<Expr, ExprError> {
    if raw.is_null() {
        return Err(ExprError);
    }
    macro_rules! branch {
        ($side:ident) => {
            Box::new(convert((*raw).$side.expr)?)
        };
    }
    macro_rules! sym {
        ($side:ident) => {
            (*raw).$side.sym
        };
    }

    let node = &*raw;
    Ok(match node.etype {
        KExprType::None => return Err(ExprError),
        KExprType::Or => Expr::Or(branch!(left), branch!(right)),
        KExprType::And => Expr::And(branch!(left), branch!(right)),
        KExprType::Not => Expr::Not(branch!(left)),
        KExprType::Equal => Expr::Leaf(Leaf::Eq(sym!(left), sym!(right))),
        KExprType::Unequal => Expr::Leaf(Leaf::Neq(sym!(left), sym!(right))),
        KExprType::Lth => Expr::Leaf(Leaf::Lt(sym!(left), sym!(right))),
        KExprType::Leq => Expr::Leaf(Leaf::Le(sym!(left), sym!(right))),
        KExprType::Gth => Expr::Leaf(Leaf::Gt(sym!(left), sym!(right))),
        KExprType::Geq => Expr::Leaf(Leaf::Ge(sym!(left), sym!(right))),
        KExprType::Symbol => Expr::Leaf(Leaf::Symbol(sym!(left))),
        KExprType::Range => Expr::Leaf(Leaf::Range(sym!(left), sym!(right))),
        KExprType::List => Expr::Leaf(Leaf::List),
    })
}

/// A symbol value lifted into one comparable domain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum CmpValue {
    Tri(Tristate),
    Num(i128),
    Str(String),
}

unsafe fn comparable(sym: *mut KSymbol) -> Result<CmpValue, ExprError> {
    if sym.is_null() {
        return Err(ExprError);
    }
    let sym = &*sym;
    Ok(match sym.stype {
        SymbolType::Boolean | SymbolType::Tristate => CmpValue::Tri(sym.curr.tri),
        SymbolType::Int => {
            let raw = sym.raw_string_value().unwrap_or_default();
            CmpValue::Num(raw.trim().parse::<i128>().map_err(|_| ExprError)?)
        }
        SymbolType::Hex => {
            let raw = sym.raw_string_value().unwrap_or_default();
            let digits = raw.trim().trim_start_matches("0x").trim_start_matches("0X");
            CmpValue::Num(i128::from_str_radix(digits, 16).map_err(|_| ExprError)?)
        }
        SymbolType::String => CmpValue::Str(sym.raw_string_value().unwrap_or_default().into_owned()),
        // Undeclared symbols compare by name, like unquoted literals in
        // Kconfig source ("FOO = bar").
        SymbolType::Unknown => CmpValue::Str(sym.name().unwrap_or_default().into_owned()),
    })
}

unsafe fn compare(l: *mut KSymbol, r: *mut KSymbol) -> Result<std::cmp::Ordering, ExprError> {
    let (lv, rv) = (comparable(l)?, comparable(r)?);
    match (&lv, &rv) {
        (CmpValue::Tri(a), CmpValue::Tri(b)) => Ok(a.cmp(b)),
        (CmpValue::Num(a), CmpValue::Num(b)) => Ok(a.cmp(b)),
        (CmpValue::Str(a), CmpValue::Str(b)) => Ok(a.cmp(b)),
        // Mixed domains degrade to a string comparison of rendered values.
        _ => Ok(render(&lv).cmp(&render(&rv))),
    }
}

fn render(value: &CmpValue) -> String {
    match value {
        CmpValue::Tri(t) => t.to_string(),
        CmpValue::Num(n) => n.to_string(),
        CmpValue::Str(s) => s.clone(),
    }
}

impl Leaf {
    fn eval(&self) -> Result<Tristate, ExprError> {
        use std::cmp::Ordering;
        unsafe {
            Ok(match self {
                Leaf::Symbol(s) => {
                    if s.is_null() {
                        return Err(ExprError);
                    }
                    match (**s).stype {
                        SymbolType::Boolean | SymbolType::Tristate => (**s).curr.tri,
                        // A non-tristate symbol in boolean position is truthy
                        // iff its value is nonempty and nonzero.
                        _ => {
                            let raw = (**s).raw_string_value().unwrap_or_default();
                            let trimmed = raw.trim();
                            let zero = trimmed.is_empty()
                                || trimmed == "0"
                                || trimmed == "0x0"
                                || trimmed == "0x00";
                            Tristate::from(!zero)
                        }
                    }
                }
                Leaf::Eq(l, r) => (compare(*l, *r)? == Ordering::Equal).into(),
                Leaf::Neq(l, r) => (compare(*l, *r)? != Ordering::Equal).into(),
                Leaf::Lt(l, r) => (compare(*l, *r)? == Ordering::Less).into(),
                Leaf::Le(l, r) => (compare(*l, *r)? != Ordering::Greater).into(),
                Leaf::Gt(l, r) => (compare(*l, *r)? == Ordering::Greater).into(),
                Leaf::Ge(l, r) => (compare(*l, *r)? != Ordering::Less).into(),
                Leaf::Range(..) | Leaf::List => return Err(ExprError),
            })
        }
    }

    /// The symbol handle if this leaf is a plain reference.
    pub fn symbol(&self) -> Option<*mut KSymbol> {
        match self {
            Leaf::Symbol(s) => Some(*s),
            _ => None,
        }
    }
}

fn leaf_name(sym: *mut KSymbol) -> String {
    if sym.is_null() {
        return "<null>".into();
    }
    unsafe { (*sym).name() }
        .map(|n| n.into_owned())
        .unwrap_or_else(|| "<choice>".into())
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Symbol(s) => write!(f, "{}", leaf_name(*s)),
            Leaf::Eq(l, r) => write!(f, "{} = {}", leaf_name(*l), leaf_name(*r)),
            Leaf::Neq(l, r) => write!(f, "{} != {}", leaf_name(*l), leaf_name(*r)),
            Leaf::Lt(l, r) => write!(f, "{} < {}", leaf_name(*l), leaf_name(*r)),
            Leaf::Le(l, r) => write!(f, "{} <= {}", leaf_name(*l), leaf_name(*r)),
            Leaf::Gt(l, r) => write!(f, "{} > {}", leaf_name(*l), leaf_name(*r)),
            Leaf::Ge(l, r) => write!(f, "{} >= {}", leaf_name(*l), leaf_name(*r)),
            Leaf::Range(l, r) => write!(f, "[{}..{}]", leaf_name(*l), leaf_name(*r)),
            Leaf::List => f.write_str("<list>"),
        }
    }
}

// Rendering groups same-operator chains without redundant parentheses, so
// "A && B && C" round-trips the way it was written in Kconfig source.
fn fmt_nested(expr: &Expr, f: &mut fmt::Formatter<'_>, parent: Option<&Expr>) -> fmt::Result {
    let same_op = |a: &Expr, b: &Expr| {
        matches!(
            (a, b),
            (Expr::And(..), Expr::And(..)) | (Expr::Or(..), Expr::Or(..))
        )
    };
    match expr {
        Expr::Const(v) => write!(f, "{}", Tristate::from(*v)),
        Expr::Leaf(leaf) => write!(f, "{leaf}"),
        Expr::Not(e) => match &**e {
            inner @ (Expr::Leaf(Leaf::Symbol(_)) | Expr::Const(_)) => {
                write!(f, "!")?;
                fmt_nested(inner, f, Some(expr))
            }
            inner => {
                write!(f, "!(")?;
                fmt_nested(inner, f, None)?;
                write!(f, ")")
            }
        },
        Expr::And(l, r) | Expr::Or(l, r) => {
            let op = if matches!(expr, Expr::And(..)) { " && " } else { " || " };
            let grouped = parent.map_or(false, |p| !same_op(p, expr));
            let bare = parent.is_none() || !grouped;
            if !bare {
                write!(f, "(")?;
            }
            fmt_nested(l, f, Some(expr))?;
            f.write_str(op)?;
            fmt_nested(r, f, Some(expr))?;
            if !bare {
                write!(f, ")")?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_nested(self, f, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testutil::fab_symbol;

    fn leaf(sym: *mut KSymbol) -> Expr {
        Expr::Leaf(Leaf::Symbol(sym))
    }

    #[test]
    fn eval_lattice_ops() {
        let a = fab_symbol(Some("A"), SymbolType::Tristate, Tristate::Mod, None);
        let b = fab_symbol(Some("B"), SymbolType::Boolean, Tristate::Yes, None);

        let and = Expr::And(Box::new(leaf(a)), Box::new(leaf(b)));
        assert_eq!(and.eval().unwrap(), Tristate::Mod);

        let or = Expr::Or(Box::new(leaf(a)), Box::new(leaf(b)));
        assert_eq!(or.eval().unwrap(), Tristate::Yes);

        let not = Expr::Not(Box::new(leaf(a)));
        assert_eq!(not.eval().unwrap(), Tristate::Mod);
    }

    #[test]
    fn eval_comparisons_on_tristates() {
        let a = fab_symbol(Some("A"), SymbolType::Tristate, Tristate::Mod, None);
        let y = fab_symbol(Some("y"), SymbolType::Tristate, Tristate::Yes, None);

        assert_eq!(Expr::Leaf(Leaf::Eq(a, y)).eval().unwrap(), Tristate::No);
        assert_eq!(Expr::Leaf(Leaf::Lt(a, y)).eval().unwrap(), Tristate::Yes);
        assert_eq!(Expr::Leaf(Leaf::Ge(a, y)).eval().unwrap(), Tristate::No);
    }

    #[test]
    fn eval_numeric_comparison() {
        let lo = fab_symbol(Some("LO"), SymbolType::Int, Tristate::No, Some("9"));
        let hi = fab_symbol(Some("HI"), SymbolType::Int, Tristate::No, Some("10"));
        // String comparison would order "10" before "9"; numeric must not.
        assert_eq!(Expr::Leaf(Leaf::Lt(lo, hi)).eval().unwrap(), Tristate::Yes);

        let hex = fab_symbol(Some("HX"), SymbolType::Hex, Tristate::No, Some("0xff"));
        let hex2 = fab_symbol(Some("HX2"), SymbolType::Hex, Tristate::No, Some("0x100"));
        assert_eq!(Expr::Leaf(Leaf::Gt(hex2, hex)).eval().unwrap(), Tristate::Yes);
    }

    #[test]
    fn eval_string_symbol_truthiness() {
        let empty = fab_symbol(Some("S"), SymbolType::String, Tristate::No, Some(""));
        assert_eq!(leaf(empty).eval().unwrap(), Tristate::No);

        let set = fab_symbol(Some("S2"), SymbolType::String, Tristate::No, Some("x"));
        assert_eq!(leaf(set).eval().unwrap(), Tristate::Yes);

        let zero = fab_symbol(Some("I"), SymbolType::Int, Tristate::No, Some("0"));
        assert_eq!(leaf(zero).eval().unwrap(), Tristate::No);
    }

    #[test]
    fn clause_flattening() {
        let a = fab_symbol(Some("A"), SymbolType::Boolean, Tristate::No, None);
        let b = fab_symbol(Some("B"), SymbolType::Boolean, Tristate::Yes, None);
        let c = fab_symbol(Some("C"), SymbolType::Boolean, Tristate::No, None);

        let tree = Expr::And(
            Box::new(Expr::And(Box::new(leaf(a)), Box::new(leaf(b)))),
            Box::new(leaf(c)),
        );
        assert_eq!(tree.and_clauses().len(), 3);
        assert_eq!(tree.or_clauses().len(), 1);

        let unmet = tree.unmet_clauses(Tristate::Yes);
        assert_eq!(unmet.len(), 2);
        assert_eq!(unmet[0].to_string(), "A");
        assert_eq!(unmet[1].to_string(), "C");
    }

    #[test]
    fn display_grouping() {
        let a = fab_symbol(Some("A"), SymbolType::Boolean, Tristate::No, None);
        let b = fab_symbol(Some("B"), SymbolType::Boolean, Tristate::No, None);
        let c = fab_symbol(Some("C"), SymbolType::Boolean, Tristate::No, None);

        let tree = Expr::And(
            Box::new(Expr::And(Box::new(leaf(a)), Box::new(leaf(b)))),
            Box::new(Expr::Or(Box::new(leaf(c)), Box::new(Expr::Not(Box::new(leaf(a)))))),
        );
        assert_eq!(tree.to_string(), "A && B && (C || !A)");
    }
}
