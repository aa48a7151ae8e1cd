#![allow(clippy::result_large_err)]

use pest::Parser;
use pest_derive::Parser;

use crate::ast::{FormulaExpr, Span};
use crate::errors::ParseError;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct FormulaParser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

const DEFAULT_NAME: &str = "<formula>";

/// Context threaded through tree building for error reporting.
struct Source<'a> {
    text: &'a str,
    name: &'a str,
}

impl Source<'_> {
    fn error_at(&self, pair: &Pair<'_>, message: impl Into<String>) -> ParseError {
        let s = pair.as_span();
        ParseError::syntax(message, Span::new(s.start(), s.end()), self.text, self.name)
    }
}

/// Parse a single formula such as `((X (UAV1) <-> lot) || (UAV1 && !park)) && (!obs)`.
pub fn parse_formula(source: &str) -> Result<FormulaExpr, ParseError> {
    parse_formula_named(source, DEFAULT_NAME)
}

/// Like [`parse_formula`], with a name used when rendering diagnostics.
pub fn parse_formula_named(source: &str, name: &str) -> Result<FormulaExpr, ParseError> {
    if source.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let ctx = Source { text: source, name };
    let mut pairs = FormulaParser::parse(Rule::formula, source).map_err(|e| {
        let (start, end) = match e.location {
            pest::error::InputLocation::Pos(p) => (p, (p + 1).min(source.len())),
            pest::error::InputLocation::Span((s, e)) => (s, e),
        };
        ParseError::syntax(
            e.variant.message().into_owned(),
            Span::new(start, end.max(start)),
            source,
            name,
        )
    })?;

    let formula = pairs
        .next()
        .ok_or_else(|| ParseError::syntax("empty parse tree", Span::new(0, 0), source, name))?;
    let body = formula
        .clone()
        .into_inner()
        .find(|p| p.as_rule() == Rule::iff_expr)
        .ok_or_else(|| ctx.error_at(&formula, "missing formula body"))?;
    build(&ctx, body)
}

fn build(ctx: &Source<'_>, pair: Pair<'_>) -> Result<FormulaExpr, ParseError> {
    match pair.as_rule() {
        Rule::iff_expr | Rule::or_expr | Rule::and_expr => fold_left(ctx, pair),
        Rule::imp_expr => {
            let outer = pair.clone();
            let mut inner = pair.into_inner();
            let lhs = next_operand(ctx, &outer, inner.next())?;
            match inner.next() {
                None => Ok(lhs),
                Some(_op) => {
                    let rhs = next_operand(ctx, &outer, inner.next())?;
                    Ok(FormulaExpr::Implies(Box::new(lhs), Box::new(rhs)))
                }
            }
        }
        Rule::eq_expr => {
            let outer = pair.clone();
            let mut inner = pair.into_inner();
            let lhs = next_operand(ctx, &outer, inner.next())?;
            match inner.next() {
                None => Ok(lhs),
                Some(op) => {
                    let rhs = next_operand(ctx, &outer, inner.next())?;
                    if op.as_str() == "!=" {
                        Ok(FormulaExpr::Xor(Box::new(lhs), Box::new(rhs)))
                    } else {
                        Ok(FormulaExpr::Iff(Box::new(lhs), Box::new(rhs)))
                    }
                }
            }
        }
        Rule::unary => {
            let outer = pair.clone();
            let mut inner = pair.into_inner();
            let first = inner
                .next()
                .ok_or_else(|| ctx.error_at(&outer, "empty unary expression"))?;
            match first.as_rule() {
                Rule::not_op => Ok(FormulaExpr::not(next_operand(ctx, &outer, inner.next())?)),
                Rule::next_op => Ok(FormulaExpr::next(next_operand(ctx, &outer, inner.next())?)),
                _ => build(ctx, first),
            }
        }
        Rule::primary => {
            let outer = pair.clone();
            next_operand(ctx, &outer, pair.into_inner().next())
        }
        Rule::next_call => {
            let outer = pair.clone();
            let body = next_operand(ctx, &outer, pair.into_inner().next())?;
            Ok(FormulaExpr::next(body))
        }
        Rule::bool_lit => Ok(FormulaExpr::Bool(pair.as_str().eq_ignore_ascii_case("true"))),
        Rule::var_ref => {
            let mut name = None;
            let mut primed = false;
            for part in pair.clone().into_inner() {
                match part.as_rule() {
                    Rule::ident => name = Some(part.as_str().to_string()),
                    Rule::prime => primed = true,
                    _ => {}
                }
            }
            let name = name.ok_or_else(|| ctx.error_at(&pair, "missing variable name"))?;
            let var = FormulaExpr::Var(name);
            Ok(if primed { FormulaExpr::next(var) } else { var })
        }
        other => Err(ctx.error_at(&pair, format!("unexpected {other:?}"))),
    }
}

fn next_operand(
    ctx: &Source<'_>,
    parent: &Pair<'_>,
    operand: Option<Pair<'_>>,
) -> Result<FormulaExpr, ParseError> {
    match operand {
        Some(p) => build(ctx, p),
        None => Err(ctx.error_at(parent, "missing operand")),
    }
}

/// Build a left-associative chain `a op b op c` from alternating operand/operator pairs.
fn fold_left(ctx: &Source<'_>, pair: Pair<'_>) -> Result<FormulaExpr, ParseError> {
    let rule = pair.as_rule();
    let outer = pair.clone();
    let mut inner = pair.into_inner();
    let mut acc = next_operand(ctx, &outer, inner.next())?;
    while let Some(_op) = inner.next() {
        let rhs = next_operand(ctx, &outer, inner.next())?;
        acc = match rule {
            Rule::iff_expr => FormulaExpr::Iff(Box::new(acc), Box::new(rhs)),
            Rule::or_expr => FormulaExpr::Or(Box::new(acc), Box::new(rhs)),
            _ => FormulaExpr::And(Box::new(acc), Box::new(rhs)),
        };
    }
    Ok(acc)
}
