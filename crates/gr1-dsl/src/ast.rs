use std::collections::BTreeSet;
use std::fmt;

/// Source span for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Untyped propositional formula with a one-step `next` operator.
///
/// Names are not resolved here; the specification compiler decides whether a
/// name is an environment variable, a system variable or a transition-system
/// proposition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum FormulaExpr {
    Bool(bool),
    Var(String),
    Not(Box<FormulaExpr>),
    /// `X φ`, `next(φ)` or a primed variable `v'`.
    Next(Box<FormulaExpr>),
    And(Box<FormulaExpr>, Box<FormulaExpr>),
    Or(Box<FormulaExpr>, Box<FormulaExpr>),
    Implies(Box<FormulaExpr>, Box<FormulaExpr>),
    Iff(Box<FormulaExpr>, Box<FormulaExpr>),
    /// `a != b`.
    Xor(Box<FormulaExpr>, Box<FormulaExpr>),
}

impl FormulaExpr {
    pub fn var(name: impl Into<String>) -> Self {
        FormulaExpr::Var(name.into())
    }

    pub fn not(inner: FormulaExpr) -> Self {
        FormulaExpr::Not(Box::new(inner))
    }

    pub fn next(inner: FormulaExpr) -> Self {
        FormulaExpr::Next(Box::new(inner))
    }

    pub fn and(lhs: FormulaExpr, rhs: FormulaExpr) -> Self {
        FormulaExpr::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: FormulaExpr, rhs: FormulaExpr) -> Self {
        FormulaExpr::Or(Box::new(lhs), Box::new(rhs))
    }

    /// Left-folded conjunction; `true` for an empty iterator.
    pub fn conjunction<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = FormulaExpr>,
    {
        parts
            .into_iter()
            .reduce(FormulaExpr::and)
            .unwrap_or(FormulaExpr::Bool(true))
    }

    /// All variable names mentioned anywhere in the formula.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            FormulaExpr::Bool(_) => {}
            FormulaExpr::Var(name) => {
                out.insert(name.as_str());
            }
            FormulaExpr::Not(inner) | FormulaExpr::Next(inner) => inner.collect_variables(out),
            FormulaExpr::And(l, r)
            | FormulaExpr::Or(l, r)
            | FormulaExpr::Implies(l, r)
            | FormulaExpr::Iff(l, r)
            | FormulaExpr::Xor(l, r) => {
                l.collect_variables(out);
                r.collect_variables(out);
            }
        }
    }

    /// Whether the formula contains a `next` reference.
    pub fn mentions_next(&self) -> bool {
        match self {
            FormulaExpr::Bool(_) | FormulaExpr::Var(_) => false,
            FormulaExpr::Next(_) => true,
            FormulaExpr::Not(inner) => inner.mentions_next(),
            FormulaExpr::And(l, r)
            | FormulaExpr::Or(l, r)
            | FormulaExpr::Implies(l, r)
            | FormulaExpr::Iff(l, r)
            | FormulaExpr::Xor(l, r) => l.mentions_next() || r.mentions_next(),
        }
    }

    fn is_binary(&self) -> bool {
        matches!(
            self,
            FormulaExpr::And(_, _)
                | FormulaExpr::Or(_, _)
                | FormulaExpr::Implies(_, _)
                | FormulaExpr::Iff(_, _)
                | FormulaExpr::Xor(_, _)
        )
    }

    /// Binary children are always parenthesized so the printed form parses
    /// back to the same tree regardless of operator precedence.
    fn fmt_operand(child: &FormulaExpr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if child.is_binary() {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lhs, op, rhs) = match self {
            FormulaExpr::Bool(b) => return write!(f, "{b}"),
            FormulaExpr::Var(name) => return write!(f, "{name}"),
            FormulaExpr::Not(inner) => {
                write!(f, "!")?;
                return Self::fmt_operand(inner, f);
            }
            FormulaExpr::Next(inner) => {
                write!(f, "X ")?;
                return Self::fmt_operand(inner, f);
            }
            FormulaExpr::And(l, r) => (l, "&&", r),
            FormulaExpr::Or(l, r) => (l, "||", r),
            FormulaExpr::Implies(l, r) => (l, "->", r),
            FormulaExpr::Iff(l, r) => (l, "<->", r),
            FormulaExpr::Xor(l, r) => (l, "!=", r),
        };
        Self::fmt_operand(lhs, f)?;
        write!(f, " {op} ")?;
        Self::fmt_operand(rhs, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parenthesizes_nested_binaries() {
        let e = FormulaExpr::and(
            FormulaExpr::or(FormulaExpr::var("a"), FormulaExpr::var("b")),
            FormulaExpr::not(FormulaExpr::var("c")),
        );
        assert_eq!(e.to_string(), "(a || b) && !c");
    }

    #[test]
    fn display_next_of_binary() {
        let e = FormulaExpr::next(FormulaExpr::and(
            FormulaExpr::var("a"),
            FormulaExpr::var("b"),
        ));
        assert_eq!(e.to_string(), "X (a && b)");
    }

    #[test]
    fn conjunction_of_nothing_is_true() {
        assert_eq!(
            FormulaExpr::conjunction(Vec::new()),
            FormulaExpr::Bool(true)
        );
    }

    #[test]
    fn variables_are_collected_once() {
        let e = FormulaExpr::and(
            FormulaExpr::var("park"),
            FormulaExpr::next(FormulaExpr::not(FormulaExpr::var("park"))),
        );
        let vars: Vec<&str> = e.variables().into_iter().collect();
        assert_eq!(vars, vec!["park"]);
        assert!(e.mentions_next());
    }
}
