//! Typed boolean expression tree and its evaluator.
//!
//! Formulas from `gr1-dsl` are lowered once, at specification-compile time,
//! into [`Expr`] trees whose atoms are already resolved to variable indices.
//! The evaluator is the hot path of game construction and never looks at
//! names.

use gr1_dsl::ast::FormulaExpr;
use indexmap::IndexSet;

use crate::specification::{Section, SpecError};
use crate::valuation::Snapshot;

/// What an atom refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Atom {
    Env(usize),
    Sys(usize),
    /// Transition-system proposition (label of the current TS state).
    Prop(usize),
}

/// Whether an atom is read from the current or the next valuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tense {
    Current,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomRef {
    pub atom: Atom,
    pub tense: Tense,
}

impl AtomRef {
    fn read(self, current: &Snapshot, next: &Snapshot) -> bool {
        let snap = match self.tense {
            Tense::Current => current,
            Tense::Next => next,
        };
        match self.atom {
            Atom::Env(i) => snap.env.get(i),
            Atom::Sys(i) => snap.sys.get(i),
            Atom::Prop(i) => snap.props.get(i),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Const(bool),
    Atom(AtomRef),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Iff(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate over a (current, next) pair. State predicates ignore `next`;
    /// callers pass the current snapshot twice.
    pub fn eval(&self, current: &Snapshot, next: &Snapshot) -> bool {
        match self {
            Expr::Const(b) => *b,
            Expr::Atom(a) => a.read(current, next),
            Expr::Not(inner) => !inner.eval(current, next),
            Expr::And(parts) => parts.iter().all(|p| p.eval(current, next)),
            Expr::Or(parts) => parts.iter().any(|p| p.eval(current, next)),
            Expr::Implies(l, r) => !l.eval(current, next) || r.eval(current, next),
            Expr::Iff(l, r) => l.eval(current, next) == r.eval(current, next),
            Expr::Xor(l, r) => l.eval(current, next) != r.eval(current, next),
        }
    }

    pub fn eval_state(&self, snapshot: &Snapshot) -> bool {
        self.eval(snapshot, snapshot)
    }

    /// Conjunction with nested conjunctions flattened; `true` when empty.
    pub fn conjunction(parts: Vec<Expr>) -> Expr {
        let mut flat = Vec::with_capacity(parts.len());
        for p in parts {
            match p {
                Expr::And(inner) => flat.extend(inner),
                Expr::Const(true) => {}
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Const(true),
            1 => flat.pop().unwrap_or(Expr::Const(true)),
            _ => Expr::And(flat),
        }
    }

    pub fn atoms(&self) -> Vec<AtomRef> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<AtomRef>) {
        match self {
            Expr::Const(_) => {}
            Expr::Atom(a) => out.push(*a),
            Expr::Not(inner) => inner.collect_atoms(out),
            Expr::And(parts) | Expr::Or(parts) => {
                for p in parts {
                    p.collect_atoms(out);
                }
            }
            Expr::Implies(l, r) | Expr::Iff(l, r) | Expr::Xor(l, r) => {
                l.collect_atoms(out);
                r.collect_atoms(out);
            }
        }
    }
}

/// Name resolution scope for lowering.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub env_vars: &'a IndexSet<String>,
    pub sys_vars: &'a IndexSet<String>,
    pub propositions: &'a IndexSet<String>,
}

impl Scope<'_> {
    pub fn resolve(&self, name: &str) -> Option<Atom> {
        if let Some(i) = self.env_vars.get_index_of(name) {
            return Some(Atom::Env(i));
        }
        if let Some(i) = self.sys_vars.get_index_of(name) {
            return Some(Atom::Sys(i));
        }
        self.propositions.get_index_of(name).map(Atom::Prop)
    }
}

/// Lower a parsed formula into an [`Expr`], resolving names and marking the
/// atoms under `X` as next-state references.
pub fn lower(formula: &FormulaExpr, scope: &Scope<'_>, section: Section) -> Result<Expr, SpecError> {
    lower_in(formula, scope, section, Tense::Current)
}

fn lower_in(
    formula: &FormulaExpr,
    scope: &Scope<'_>,
    section: Section,
    tense: Tense,
) -> Result<Expr, SpecError> {
    let bin = |l: &FormulaExpr, r: &FormulaExpr| -> Result<(Box<Expr>, Box<Expr>), SpecError> {
        Ok((
            Box::new(lower_in(l, scope, section, tense)?),
            Box::new(lower_in(r, scope, section, tense)?),
        ))
    };
    Ok(match formula {
        FormulaExpr::Bool(b) => Expr::Const(*b),
        FormulaExpr::Var(name) => {
            let atom = scope
                .resolve(name)
                .ok_or_else(|| SpecError::UndeclaredVariable {
                    section,
                    name: name.clone(),
                })?;
            Expr::Atom(AtomRef { atom, tense })
        }
        FormulaExpr::Not(inner) => Expr::Not(Box::new(lower_in(inner, scope, section, tense)?)),
        FormulaExpr::Next(inner) => {
            if tense == Tense::Next {
                return Err(SpecError::NestedNext {
                    section,
                    formula: formula.to_string(),
                });
            }
            lower_in(inner, scope, section, Tense::Next)?
        }
        FormulaExpr::And(l, r) => {
            let (l, r) = bin(l, r)?;
            Expr::conjunction(vec![*l, *r])
        }
        FormulaExpr::Or(l, r) => {
            let (l, r) = bin(l, r)?;
            let mut parts = Vec::new();
            for side in [*l, *r] {
                match side {
                    Expr::Or(inner) => parts.extend(inner),
                    other => parts.push(other),
                }
            }
            Expr::Or(parts)
        }
        FormulaExpr::Implies(l, r) => {
            let (l, r) = bin(l, r)?;
            Expr::Implies(l, r)
        }
        FormulaExpr::Iff(l, r) => {
            let (l, r) = bin(l, r)?;
            Expr::Iff(l, r)
        }
        FormulaExpr::Xor(l, r) => {
            let (l, r) = bin(l, r)?;
            Expr::Xor(l, r)
        }
    })
}
