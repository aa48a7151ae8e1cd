#![doc = include_str!("../README.md")]

//! Intermediate representation for GR(1) synthesis.
//!
//! This crate defines the finite transition system an agent moves in, the
//! packed boolean valuations shared by every later stage, and the GR(1)
//! specification with its compilation into evaluable predicates.

pub mod expr;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod specification;
pub mod transition_system;
pub mod valuation;

pub use specification::{CompiledSpec, GrSpec, Player, Section, SpecError};
pub use transition_system::{StateId, TransitionSystem, TransitionSystemError};
pub use valuation::{Snapshot, Valuation};
