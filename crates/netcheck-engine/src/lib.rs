#![doc = include_str!("../README.md")]

//! netcheck verification engine.
//!
//! Compiles a network graph into QF_LIA constraints over a symbolic packet,
//! instruments the encoding with reachability, path-length, load and loop
//! variables, and checks network properties by asking the solver for a
//! counterexample to their negation.

pub mod checker;
pub mod encoder;
pub mod error;
pub mod instrument;
pub mod logical_edge;
pub mod result;

pub use checker::{CheckerOptions, PropertyChecker};
pub use encoder::{Encoder, EncodingSession, Plane, SolverChoice, SolverOptions};
pub use error::EngineError;
pub use result::{Property, PropertyAnswer, VerificationResult};
