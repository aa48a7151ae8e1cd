#![doc = include_str!("../README.md")]
#![allow(clippy::result_large_err)]

//! GR(1) synthesis engine.
//!
//! This crate builds the explicit game graph from a transition system and a
//! compiled specification, solves the nested GR(1) fixpoint, selects initial
//! nodes under a quantification policy and extracts a Moore-machine
//! controller. It also replays controllers against environment policies.

pub mod budget;
pub mod controller;
pub mod game;
pub mod pipeline;
pub mod realizability;
pub mod result;
pub mod simulation;
pub mod solver;
pub mod strategy;

pub use budget::{CancelToken, SynthesisBudget};
pub use controller::Controller;
pub use game::GameSemantics;
pub use pipeline::{check_realizability, synthesize, Synthesis, SynthesisError, SynthesisOptions};
pub use realizability::{Qinit, UnrealizableReason};
pub use result::{SynthesisReport, UnrealizableReport, Verdict};
pub use simulation::{simulate, EnvironmentPolicy, FirstInput, ScriptedInputs, SimulationTrace};
