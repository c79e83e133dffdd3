//! Deduplicating accumulator for declarations and assertions.
//!
//! Encoders never talk to a live solver while compiling. They push into a
//! [`Constraints`] value, which a session later replays into whichever
//! backend was chosen. Replaying the same pass twice is harmless: repeated
//! declarations and structurally identical assertions are dropped.

use std::collections::HashSet;

use tracing::debug;

use crate::solver::SmtSolver;
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Clone, Default)]
pub struct Constraints {
    declarations: Vec<(String, SmtSort)>,
    assertions: Vec<SmtTerm>,
    declared: HashSet<String>,
    assertion_keys: HashSet<String>,
    dedup_hits: usize,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name`; returns its variable term. Redeclaring with the same
    /// name is a no-op.
    pub fn declare(&mut self, name: impl Into<String>, sort: SmtSort) -> SmtTerm {
        let name = name.into();
        if self.declared.insert(name.clone()) {
            self.declarations.push((name.clone(), sort));
        }
        SmtTerm::Var(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    /// Assert `term` unless an identical assertion is already present.
    /// Trivially true terms are dropped.
    pub fn assert(&mut self, term: SmtTerm) {
        if term.is_true() {
            return;
        }
        let key = canonical_term_key(&term);
        if self.assertion_keys.insert(key) {
            self.assertions.push(term);
        } else {
            self.dedup_hits = self.dedup_hits.saturating_add(1);
        }
    }

    /// Append everything from `other`, keeping deduplication.
    pub fn extend(&mut self, other: &Constraints) {
        for (name, sort) in &other.declarations {
            self.declare(name.clone(), *sort);
        }
        for assertion in &other.assertions {
            self.assert(assertion.clone());
        }
    }

    pub fn declarations(&self) -> &[(String, SmtSort)] {
        &self.declarations
    }

    pub fn assertions(&self) -> &[SmtTerm] {
        &self.assertions
    }

    pub fn dedup_hits(&self) -> usize {
        self.dedup_hits
    }

    /// Declare and assert everything into `solver`.
    pub fn replay<S: SmtSolver>(&self, solver: &mut S) -> Result<(), S::Error> {
        debug!(
            declarations = self.declarations.len(),
            assertions = self.assertions.len(),
            dedup_hits = self.dedup_hits,
            "replaying constraints"
        );
        for (name, sort) in &self.declarations {
            solver.declare_var(name, sort)?;
        }
        for assertion in &self.assertions {
            solver.assert(assertion)?;
        }
        Ok(())
    }
}

fn canonical_binary_commutative(tag: &str, lhs: &SmtTerm, rhs: &SmtTerm) -> String {
    let left = canonical_term_key(lhs);
    let right = canonical_term_key(rhs);
    if left <= right {
        format!("({tag} {left} {right})")
    } else {
        format!("({tag} {right} {left})")
    }
}

fn canonical_binary(tag: &str, lhs: &SmtTerm, rhs: &SmtTerm) -> String {
    format!(
        "({tag} {} {})",
        canonical_term_key(lhs),
        canonical_term_key(rhs)
    )
}

fn canonical_nary(tag: &str, terms: &[SmtTerm]) -> String {
    let mut items = terms.iter().map(canonical_term_key).collect::<Vec<_>>();
    items.sort();
    format!("({tag} {})", items.join(" "))
}

/// Key that is equal for terms differing only in the order of commutative
/// operands.
pub fn canonical_term_key(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => format!("(var {name})"),
        SmtTerm::IntLit(v) => format!("(int {v})"),
        SmtTerm::BoolLit(v) => format!("(bool {v})"),
        SmtTerm::Add(lhs, rhs) => canonical_binary_commutative("+", lhs, rhs),
        SmtTerm::Sub(lhs, rhs) => canonical_binary("-", lhs, rhs),
        SmtTerm::Eq(lhs, rhs) => canonical_binary_commutative("=", lhs, rhs),
        SmtTerm::Lt(lhs, rhs) => canonical_binary("<", lhs, rhs),
        SmtTerm::Le(lhs, rhs) => canonical_binary("<=", lhs, rhs),
        SmtTerm::Gt(lhs, rhs) => canonical_binary(">", lhs, rhs),
        SmtTerm::Ge(lhs, rhs) => canonical_binary(">=", lhs, rhs),
        SmtTerm::And(terms) => canonical_nary("and", terms),
        SmtTerm::Or(terms) => canonical_nary("or", terms),
        SmtTerm::Not(inner) => format!("(not {})", canonical_term_key(inner)),
        SmtTerm::Implies(lhs, rhs) => canonical_binary("=>", lhs, rhs),
        SmtTerm::Ite(cond, then_term, else_term) => format!(
            "(ite {} {} {})",
            canonical_term_key(cond),
            canonical_term_key(then_term),
            canonical_term_key(else_term)
        ),
    }
}
