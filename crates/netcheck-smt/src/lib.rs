#![doc = include_str!("../README.md")]

//! Solver-agnostic SMT layer for netcheck.
//!
//! Terms are built with folding smart constructors, accumulated in a
//! deduplicating [`constraints::Constraints`] value, and replayed into a Z3
//! or cvc5 backend through the [`solver::SmtSolver`] trait.

pub mod backends;
pub mod constraints;
pub mod solver;
pub mod sorts;
pub mod terms;
