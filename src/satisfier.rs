//! The dependency satisfier.
//!
//! Given a target assignment whose visibility currently evaluates too low,
//! compute an ordered list of prerequisite assignments that would make it
//! legal. The solver handles the tractable shapes deterministically:
//! conjunctions solve all children, disjunctions rank viable branches by how
//! many additional symbols they enable and refuse to guess between
//! equally-cheap different branches, and symbols without a prompt are reached
//! through their selectors instead of directly. Everything else is reported
//! as unsupported rather than approximated.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use chrono::Utc;
use thiserror::Error;

use crate::bridge::{Bridge, Expr, KSymbol, Leaf, SymbolType, Tristate};
use crate::validate::ErrorKind;

/// Requirement set produced for one expression: symbol name to value.
/// Ordered so iteration (and therefore tie-breaking) is lexicographic.
pub type Assignments = BTreeMap<String, Tristate>;

#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub desired: Tristate,
    pub recursive: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            desired: Tristate::Yes,
            recursive: false,
        }
    }
}

/// One unresolved either-or the solver refused to decide.
#[derive(Debug, Clone)]
pub struct Ambiguity {
    pub symbol: String,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("symbol {name} does not exist")]
    UnknownSymbol { name: String },

    #[error("the dependency expression is provably unsatisfiable")]
    Unsatisfiable,

    #[error("the expression contains constructs the solver cannot handle: {expression}")]
    Unsupported { expression: String },

    #[error("the solution is ambiguous; satisfy one alternative per symbol manually")]
    AmbiguousChoice { ambiguities: Vec<Ambiguity> },

    #[error("dependency cycle detected involving {symbol}")]
    CycleDetected { symbol: String },

    #[error("solving requires both {symbol}={first} and {symbol}={second}")]
    ConflictingRequirement {
        symbol: String,
        first: Tristate,
        second: Tristate,
    },

    #[error("{symbol} is boolean but the expression requires value m")]
    RequiresModule { symbol: String },
}

impl SolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SolveError::AmbiguousChoice { .. } => ErrorKind::AmbiguousChoice,
            SolveError::UnknownSymbol { .. } => ErrorKind::InvalidAssignment,
            _ => ErrorKind::UnmetDependencies,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level solve
// ---------------------------------------------------------------------------

/// Compute the ordered prerequisite assignments for `target=desired`.
///
/// The result ends with the target's own assignment when the target has a
/// prompt; select-driven targets are represented by their chosen selector
/// instead. An empty result means the assignment is already legal and in
/// effect.
pub fn solve(
    bridge: &Bridge,
    target: &str,
    options: SolveOptions,
) -> Result<Vec<(String, Tristate)>, SolveError> {
    let root = bridge.symbol(target).ok_or_else(|| SolveError::UnknownSymbol {
        name: target.to_string(),
    })?;
    let root_name = root.name_owned().unwrap_or_else(|| target.to_string());

    // Promote m to y up front for boolean targets.
    let desired = promote(root.symbol_type(), options.desired);
    if root.tristate_value() >= desired
        && matches!(
            root.symbol_type(),
            SymbolType::Boolean | SymbolType::Tristate
        )
    {
        return Ok(Vec::new());
    }

    let mut ambiguities: Vec<Ambiguity> = Vec::new();
    // Per symbol: its requirement set, and which of those requirements must
    // be emitted before the symbol itself.
    let mut solved: HashMap<String, Assignments> = HashMap::new();
    let mut depends_on: HashMap<String, Vec<String>> = HashMap::new();

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, Tristate)> = VecDeque::new();
    queue.push_back((root_name.clone(), desired));

    while let Some((name, wanted)) = queue.pop_front() {
        if !visited.insert(name.clone()) {
            continue;
        }
        let symbol = bridge.symbol(&name).ok_or_else(|| SolveError::UnknownSymbol {
            name: name.clone(),
        })?;
        let wanted = promote(symbol.symbol_type(), wanted);

        let visibility = symbol
            .visibility_expression()
            .map_err(|_| SolveError::Unsupported {
                expression: format!("<dependencies of {name}>"),
            })?
            .unwrap_or(Expr::Const(true));

        // A promptless symbol cannot be set directly; its activation path is
        // one of the select clauses pointing at it, so those join the
        // requirement. An empty reverse dependency stays trivially true (the
        // symbol is then driven by defaults alone).
        let gate = if symbol.prompt_count() == 0 {
            let rev = symbol
                .reverse_dep_expression()
                .map_err(|_| SolveError::Unsupported {
                    expression: format!("<selectors of {name}>"),
                })?
                .unwrap_or(Expr::Const(true));
            Expr::And(Box::new(visibility), Box::new(rev))
        } else {
            visibility
        };

        let mut requirements = solve_expr(&gate, wanted, &name, &mut ambiguities)?;

        // Everything this symbol needs raised, with the value to raise it
        // to. These become ordering dependencies and further work items.
        let prerequisites: Vec<(String, Tristate)> = requirements
            .iter()
            .filter(|&(dep, &value)| value != Tristate::No && dep != &name)
            .map(|(dep, &value)| (dep.clone(), value))
            .collect();

        // Only symbols with a prompt can appear as direct assignments; the
        // rest stay as ordering dependencies and are reached through their
        // own selectors on the next round.
        requirements.retain(|dep, _| {
            bridge
                .symbol(dep)
                .map(|s| s.prompt_count() > 0)
                .unwrap_or(false)
        });

        // The symbol's own assignment is part of the plan when it is
        // directly assignable.
        if symbol.prompt_count() > 0 {
            requirements.insert(name.clone(), wanted);
        }

        solved.insert(name.clone(), requirements);
        if !options.recursive {
            depends_on.insert(name, Vec::new());
            break;
        }
        queue.extend(prerequisites.iter().cloned());
        depends_on.insert(name, prerequisites.into_iter().map(|(dep, _)| dep).collect());
    }

    if !ambiguities.is_empty() {
        return Err(SolveError::AmbiguousChoice { ambiguities });
    }

    // Merging all requirement sets surfaces contradictions between branches
    // before anything is emitted.
    let mut merged = Assignments::new();
    for requirements in solved.values() {
        merge(&mut merged, requirements.clone())?;
    }

    order_assignments(solved, depends_on)
}

fn promote(stype: SymbolType, value: Tristate) -> Tristate {
    if stype == SymbolType::Boolean && value == Tristate::Mod {
        Tristate::Yes
    } else {
        value
    }
}

/// Emit assignments so that every symbol's requirements precede it.
fn order_assignments(
    mut solved: HashMap<String, Assignments>,
    mut depends_on: HashMap<String, Vec<String>>,
) -> Result<Vec<(String, Tristate)>, SolveError> {
    let mut plan: Vec<(String, Tristate)> = Vec::new();
    let mut emitted: HashSet<String> = HashSet::new();

    while !depends_on.is_empty() {
        let mut ready: Vec<String> = depends_on
            .iter()
            .filter(|(_, deps)| deps.iter().all(|d| emitted.contains(d) || !depends_on.contains_key(d)))
            .map(|(name, _)| name.clone())
            .collect();
        if ready.is_empty() {
            // Every remaining symbol waits on another remaining symbol.
            let symbol = depends_on.keys().min().cloned().unwrap_or_default();
            return Err(SolveError::CycleDetected { symbol });
        }
        ready.sort();

        for name in ready {
            depends_on.remove(&name);
            if let Some(mut requirements) = solved.remove(&name) {
                // The symbol's own assignment goes after its prerequisites.
                let own = requirements.remove(&name);
                for (dep, value) in requirements {
                    if emitted.insert(dep.clone()) {
                        plan.push((dep, value));
                    }
                }
                if let Some(value) = own {
                    if emitted.insert(name.clone()) {
                        plan.push((name.clone(), value));
                    }
                }
            }
            emitted.insert(name);
        }
    }

    Ok(plan)
}

// ---------------------------------------------------------------------------
// Expression solving
// ---------------------------------------------------------------------------

fn merge(into: &mut Assignments, from: Assignments) -> Result<(), SolveError> {
    for (symbol, value) in from {
        match into.get(&symbol) {
            Some(&existing) if existing != value => {
                return Err(SolveError::ConflictingRequirement {
                    symbol,
                    first: existing,
                    second: value,
                });
            }
            _ => {
                into.insert(symbol, value);
            }
        }
    }
    Ok(())
}

fn symbol_name(raw: *mut KSymbol) -> Result<String, SolveError> {
    if raw.is_null() {
        return Err(SolveError::Unsupported {
            expression: "<null symbol>".into(),
        });
    }
    unsafe { (*raw).name() }
        .map(|n| n.into_owned())
        .ok_or(SolveError::Unsupported {
            expression: "<anonymous symbol>".into(),
        })
}

fn is_tristate_family(raw: *mut KSymbol) -> bool {
    matches!(
        unsafe { (*raw).stype },
        SymbolType::Boolean | SymbolType::Tristate
    )
}

/// Require `sym = value`, respecting the boolean/tristate divide.
fn require_eq(raw: *mut KSymbol, value: Tristate) -> Result<Assignments, SolveError> {
    let name = symbol_name(raw)?;
    if value == Tristate::Mod && unsafe { (*raw).stype } != SymbolType::Tristate {
        return Err(SolveError::RequiresModule { symbol: name });
    }
    Ok(Assignments::from([(name, value)]))
}

/// Require `sym != value`, choosing the candidate closest to `desired`.
fn require_neq(
    raw: *mut KSymbol,
    value: Tristate,
    desired: Tristate,
) -> Result<Assignments, SolveError> {
    let replacement = match value {
        Tristate::No => desired,
        Tristate::Mod => Tristate::Yes,
        Tristate::Yes => Tristate::Mod,
    };
    require_eq(raw, replacement)
}

fn solve_comparison(
    left: *mut KSymbol,
    right: *mut KSymbol,
    negated: bool,
    desired: Tristate,
    rendered: &Leaf,
) -> Result<Assignments, SolveError> {
    if left.is_null() || right.is_null() {
        return Err(SolveError::Unsupported {
            expression: rendered.to_string(),
        });
    }
    if !is_tristate_family(left) && !unsafe { (*left).is_const() }
        || !is_tristate_family(right) && !unsafe { (*right).is_const() }
    {
        // A comparison over int/hex/string has no single satisfying literal
        // the solver could pick.
        return Err(SolveError::Unsupported {
            expression: rendered.to_string(),
        });
    }

    let (target, constant) = if unsafe { (*left).is_const() } {
        (right, left)
    } else if unsafe { (*right).is_const() } {
        (left, right)
    } else {
        return Err(SolveError::Unsupported {
            expression: rendered.to_string(),
        });
    };
    let constant_value = unsafe { (*constant).curr.tri };
    if negated {
        require_neq(target, constant_value, desired)
    } else {
        require_eq(target, constant_value)
    }
}

fn solve_expr(
    expr: &Expr,
    desired: Tristate,
    context: &str,
    ambiguities: &mut Vec<Ambiguity>,
) -> Result<Assignments, SolveError> {
    // Already high enough: nothing to change on this branch.
    if let Ok(value) = expr.eval() {
        if value >= desired {
            return Ok(Assignments::new());
        }
    }

    match expr {
        Expr::Const(false) => Err(SolveError::Unsatisfiable),
        Expr::Const(true) => Ok(Assignments::new()),

        Expr::And(l, r) => {
            let mut requirements = solve_expr(l, desired, context, ambiguities)?;
            merge(&mut requirements, solve_expr(r, desired, context, ambiguities)?)?;
            Ok(requirements)
        }

        Expr::Or(..) => {
            // Rank every viable branch by how many additional symbols it
            // enables. A unique cheapest branch wins; distinct equally-cheap
            // branches are surfaced instead of guessed between.
            let branches = expr.or_clauses();
            let mut viable: Vec<(usize, Assignments, String)> = Vec::new();
            let mut first_error = None;
            for branch in &branches {
                match solve_expr(branch, desired, context, ambiguities) {
                    Ok(requirements) => {
                        let cost = requirements
                            .values()
                            .filter(|&&v| v != Tristate::No)
                            .count();
                        viable.push((cost, requirements, branch.to_string()));
                    }
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            let Some(min_cost) = viable.iter().map(|(c, ..)| *c).min() else {
                return Err(first_error.unwrap_or(SolveError::Unsatisfiable));
            };
            let cheapest: Vec<&(usize, Assignments, String)> =
                viable.iter().filter(|(c, ..)| *c == min_cost).collect();
            let all_same = cheapest
                .iter()
                .all(|(_, requirements, _)| requirements == &cheapest[0].1);
            if !all_same {
                ambiguities.push(Ambiguity {
                    symbol: context.to_string(),
                    alternatives: cheapest.iter().map(|(.., r)| r.clone()).collect(),
                });
                // Assume the user resolves the ambiguity; the aggregated
                // error is raised once solving finishes.
                return Ok(Assignments::new());
            }
            Ok(cheapest[0].1.clone())
        }

        Expr::Not(inner) => match &**inner {
            Expr::Leaf(Leaf::Symbol(s)) => require_eq(*s, Tristate::No),
            Expr::Leaf(leaf @ Leaf::Eq(l, r)) => solve_comparison(*l, *r, true, desired, leaf),
            Expr::Leaf(leaf @ Leaf::Neq(l, r)) => solve_comparison(*l, *r, false, desired, leaf),
            other => Err(SolveError::Unsupported {
                expression: format!("!({other})"),
            }),
        },

        Expr::Leaf(leaf) => match leaf {
            Leaf::Symbol(s) => {
                let s = *s;
                if s.is_null() {
                    return Err(SolveError::Unsupported {
                        expression: leaf.to_string(),
                    });
                }
                if unsafe { (*s).is_const() } {
                    // A constant below the desired value cannot be raised.
                    return if unsafe { (*s).curr.tri } >= desired {
                        Ok(Assignments::new())
                    } else {
                        Err(SolveError::Unsatisfiable)
                    };
                }
                let wanted = promote(unsafe { (*s).stype }, desired);
                require_neq(s, Tristate::No, wanted)
            }
            Leaf::Eq(l, r) => solve_comparison(*l, *r, false, desired, leaf),
            Leaf::Neq(l, r) => solve_comparison(*l, *r, true, desired, leaf),
            other => Err(SolveError::Unsupported {
                expression: other.to_string(),
            }),
        },
    }
}

// ---------------------------------------------------------------------------
// Output rendering
// ---------------------------------------------------------------------------

/// Render a solved plan as a scripted-dialect module ready to paste into a
/// configuration script.
pub fn render_lua_module(
    target: &str,
    desired: Tristate,
    plan: &[(String, Tristate)],
) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "-- Generated by autokernel on {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "-- satisfy {target}={desired}");
    let (prerequisites, own): (Vec<_>, Vec<_>) =
        plan.iter().partition(|(name, _)| name.as_str() != target);
    if !prerequisites.is_empty() {
        let _ = writeln!(out, "\n-- prerequisites");
        for (name, value) in prerequisites {
            let _ = writeln!(out, "{name}(\"{value}\")");
        }
    }
    if !own.is_empty() {
        let _ = writeln!(out, "\n-- target");
        for (name, value) in own {
            let _ = writeln!(out, "{name}(\"{value}\")");
        }
    }
    out
}

/// Print a solver failure with the same layout as validator diagnostics.
pub fn report(error: &SolveError) {
    use crate::journal::{gutter, paint};
    use crossterm::style::Color;

    eprintln!("{}: {error}", paint("error", Color::Red));
    if let SolveError::AmbiguousChoice { ambiguities } = error {
        let bar = gutter();
        for ambiguity in ambiguities {
            eprintln!("   {bar}");
            eprintln!(
                "   {bar} {}: one of the following must be satisfied",
                ambiguity.symbol
            );
            for alternative in &ambiguity.alternatives {
                eprintln!("   {bar} - {alternative}");
            }
        }
        eprintln!("   {bar}");
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testutil::fab_symbol;

    fn leaf(sym: *mut KSymbol) -> Expr {
        Expr::Leaf(Leaf::Symbol(sym))
    }

    fn solve_one(expr: &Expr, desired: Tristate) -> Result<Assignments, SolveError> {
        let mut ambiguities = Vec::new();
        let result = solve_expr(expr, desired, "TEST", &mut ambiguities)?;
        if ambiguities.is_empty() {
            Ok(result)
        } else {
            Err(SolveError::AmbiguousChoice { ambiguities })
        }
    }

    #[test]
    fn conjunction_requires_all_children() {
        let a = fab_symbol(Some("A"), SymbolType::Boolean, Tristate::No, None);
        let b = fab_symbol(Some("B"), SymbolType::Boolean, Tristate::No, None);
        let expr = Expr::And(Box::new(leaf(a)), Box::new(leaf(b)));

        let result = solve_one(&expr, Tristate::Yes).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result["A"], Tristate::Yes);
        assert_eq!(result["B"], Tristate::Yes);
    }

    #[test]
    fn satisfied_expression_needs_nothing() {
        let a = fab_symbol(Some("A"), SymbolType::Boolean, Tristate::Yes, None);
        assert!(solve_one(&leaf(a), Tristate::Yes).unwrap().is_empty());
    }

    #[test]
    fn disjunction_prefers_satisfied_branch() {
        let off = fab_symbol(Some("OFF"), SymbolType::Boolean, Tristate::No, None);
        let on = fab_symbol(Some("ON"), SymbolType::Boolean, Tristate::Yes, None);
        let expr = Expr::Or(Box::new(leaf(off)), Box::new(leaf(on)));

        // ON is already y, so the whole expression is satisfied.
        assert!(solve_one(&expr, Tristate::Yes).unwrap().is_empty());
    }

    #[test]
    fn disjunction_with_distinct_equal_cost_branches_is_ambiguous() {
        let a = fab_symbol(Some("A"), SymbolType::Boolean, Tristate::No, None);
        let b = fab_symbol(Some("B"), SymbolType::Boolean, Tristate::No, None);
        let expr = Expr::Or(Box::new(leaf(a)), Box::new(leaf(b)));

        match solve_one(&expr, Tristate::Yes) {
            Err(SolveError::AmbiguousChoice { ambiguities }) => {
                assert_eq!(ambiguities.len(), 1);
                assert_eq!(ambiguities[0].symbol, "TEST");
                assert_eq!(
                    ambiguities[0].alternatives,
                    vec!["A".to_string(), "B".to_string()]
                );
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn disjunction_prefers_cheaper_branch() {
        let a = fab_symbol(Some("A"), SymbolType::Boolean, Tristate::No, None);
        let b = fab_symbol(Some("B"), SymbolType::Boolean, Tristate::No, None);
        let c = fab_symbol(Some("C"), SymbolType::Boolean, Tristate::No, None);
        // (A && B) || C: the right branch enables one symbol, the left two.
        let expr = Expr::Or(
            Box::new(Expr::And(Box::new(leaf(a)), Box::new(leaf(b)))),
            Box::new(leaf(c)),
        );

        let result = solve_one(&expr, Tristate::Yes).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result["C"], Tristate::Yes);
    }

    #[test]
    fn negated_symbol_requires_n() {
        let a = fab_symbol(Some("A"), SymbolType::Boolean, Tristate::Yes, None);
        let expr = Expr::Not(Box::new(leaf(a)));

        let result = solve_one(&expr, Tristate::Yes).unwrap();
        assert_eq!(result["A"], Tristate::No);
    }

    #[test]
    fn equality_with_constant_picks_the_literal() {
        let a = fab_symbol(Some("A"), SymbolType::Tristate, Tristate::No, None);
        let m = {
            let raw = fab_symbol(Some("m"), SymbolType::Tristate, Tristate::Mod, None);
            unsafe { (*raw).flags = crate::bridge::SymbolFlags::CONST };
            raw
        };
        let expr = Expr::Leaf(Leaf::Eq(a, m));

        let result = solve_one(&expr, Tristate::Yes).unwrap();
        assert_eq!(result["A"], Tristate::Mod);
    }

    #[test]
    fn mod_requirement_on_boolean_is_an_error() {
        let a = fab_symbol(Some("A"), SymbolType::Boolean, Tristate::No, None);
        let m = {
            let raw = fab_symbol(Some("m"), SymbolType::Tristate, Tristate::Mod, None);
            unsafe { (*raw).flags = crate::bridge::SymbolFlags::CONST };
            raw
        };
        let expr = Expr::Leaf(Leaf::Eq(a, m));

        assert!(matches!(
            solve_one(&expr, Tristate::Yes),
            Err(SolveError::RequiresModule { .. })
        ));
    }

    #[test]
    fn numeric_comparison_is_unsupported() {
        let a = fab_symbol(Some("A"), SymbolType::Int, Tristate::No, Some("3"));
        let b = fab_symbol(Some("B"), SymbolType::Int, Tristate::No, Some("5"));
        let expr = Expr::Leaf(Leaf::Gt(a, b));

        assert!(matches!(
            solve_one(&expr, Tristate::Yes),
            Err(SolveError::Unsupported { .. })
        ));
    }

    #[test]
    fn tristate_desired_mod_keeps_mod() {
        let a = fab_symbol(Some("A"), SymbolType::Tristate, Tristate::No, None);
        let result = solve_one(&leaf(a), Tristate::Mod).unwrap();
        assert_eq!(result["A"], Tristate::Mod);
    }

    #[test]
    fn boolean_promotes_mod_to_yes() {
        let a = fab_symbol(Some("A"), SymbolType::Boolean, Tristate::No, None);
        let result = solve_one(&leaf(a), Tristate::Mod).unwrap();
        assert_eq!(result["A"], Tristate::Yes);
    }

    #[test]
    fn ordering_emits_dependencies_first() {
        // WLAN requires NET and NETDEVICES; NETDEVICES requires NET.
        let solved = HashMap::from([
            (
                "NET".to_string(),
                Assignments::from([("NET".to_string(), Tristate::Yes)]),
            ),
            (
                "NETDEVICES".to_string(),
                Assignments::from([
                    ("NET".to_string(), Tristate::Yes),
                    ("NETDEVICES".to_string(), Tristate::Yes),
                ]),
            ),
            (
                "WLAN".to_string(),
                Assignments::from([
                    ("NET".to_string(), Tristate::Yes),
                    ("NETDEVICES".to_string(), Tristate::Yes),
                    ("WLAN".to_string(), Tristate::Yes),
                ]),
            ),
        ]);
        let depends_on = HashMap::from([
            ("NET".to_string(), vec![]),
            ("NETDEVICES".to_string(), vec!["NET".to_string()]),
            (
                "WLAN".to_string(),
                vec!["NET".to_string(), "NETDEVICES".to_string()],
            ),
        ]);

        let plan = order_assignments(solved, depends_on).unwrap();
        let names: Vec<&str> = plan.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["NET", "NETDEVICES", "WLAN"]);
    }

    #[test]
    fn ordering_detects_cycles() {
        let solved = HashMap::from([
            ("A".to_string(), Assignments::new()),
            ("B".to_string(), Assignments::new()),
        ]);
        let depends_on = HashMap::from([
            ("A".to_string(), vec!["B".to_string()]),
            ("B".to_string(), vec!["A".to_string()]),
        ]);

        assert!(matches!(
            order_assignments(solved, depends_on),
            Err(SolveError::CycleDetected { .. })
        ));
    }

    #[test]
    fn merge_detects_contradictions() {
        let mut into = Assignments::from([("A".to_string(), Tristate::Yes)]);
        let err = merge(&mut into, Assignments::from([("A".to_string(), Tristate::No)]));
        assert!(matches!(
            err,
            Err(SolveError::ConflictingRequirement { .. })
        ));
    }

    #[test]
    fn lua_module_rendering_sections() {
        let plan = vec![
            ("NET".to_string(), Tristate::Yes),
            ("WLAN".to_string(), Tristate::Yes),
        ];
        let module = render_lua_module("WLAN", Tristate::Yes, &plan);
        assert!(module.starts_with("-- Generated by autokernel on "));
        assert!(module.contains("-- prerequisites\nNET(\"y\")"));
        assert!(module.contains("-- target\nWLAN(\"y\")"));
    }
}
