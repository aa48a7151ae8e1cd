#![doc = include_str!("../README.md")]

//! Formula front-end for GR(1) specifications.
//!
//! Parses the propositional predicates used in specification sections
//! (initial conditions, safety, justice) into an untyped [`ast::FormulaExpr`].
//! Name resolution and section checks happen later, in `gr1-ir`.

pub mod ast;
pub mod errors;
pub mod parser;

pub use parser::{parse_formula, parse_formula_named};
