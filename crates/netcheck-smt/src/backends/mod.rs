//! Solver backends: in-process Z3 and an incremental cvc5 subprocess
//! speaking SMT-LIB2.

pub mod cvc5_backend;
pub mod smtlib_printer;
pub mod z3_backend;
