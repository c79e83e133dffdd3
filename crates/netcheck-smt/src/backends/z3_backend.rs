use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use z3::SatResult as Z3SatResult;

use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Sort mismatch in {0}")]
    SortMismatch(&'static str),
}

/// In-process Z3 session.
///
/// The `z3` crate keeps its context thread-local, so a `Z3Solver` must be
/// created and used on one thread. Concurrent queries each build their own.
pub struct Z3Solver {
    solver: z3::Solver,
    int_vars: HashMap<String, z3::ast::Int>,
    bool_vars: HashMap<String, z3::ast::Bool>,
    params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            int_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            params: None,
        }
    }

    /// A solver that gives up after `timeout_secs`. Zero means no limit.
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        if timeout_secs == 0 {
            return Self::new();
        }
        let solver = z3::Solver::new();
        let mut params = z3::Params::new();
        let timeout_ms = u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX);
        params.set_u32("timeout", timeout_ms);
        solver.set_params(&params);
        Self {
            solver,
            int_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            params: Some(params),
        }
    }

    fn translate_int(&self, term: &SmtTerm) -> Result<z3::ast::Int, Z3Error> {
        self.translate_term(term)?.into_int()
    }

    fn translate_bool(&self, term: &SmtTerm) -> Result<z3::ast::Bool, Z3Error> {
        self.translate_term(term)?.into_bool()
    }

    fn translate_all_bool(&self, terms: &[SmtTerm]) -> Result<Vec<z3::ast::Bool>, Z3Error> {
        terms.iter().map(|t| self.translate_bool(t)).collect()
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some(v) = self.int_vars.get(name) {
                    Ok(Z3Term::Int(v.clone()))
                } else if let Some(v) = self.bool_vars.get(name) {
                    Ok(Z3Term::Bool(v.clone()))
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(z3::ast::Int::from_i64(*n))),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(z3::ast::Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => {
                let l = self.translate_int(lhs)?;
                let r = self.translate_int(rhs)?;
                Ok(Z3Term::Int(&l + &r))
            }
            SmtTerm::Sub(lhs, rhs) => {
                let l = self.translate_int(lhs)?;
                let r = self.translate_int(rhs)?;
                Ok(Z3Term::Int(&l - &r))
            }
            SmtTerm::Eq(lhs, rhs) => match (self.translate_term(lhs)?, self.translate_term(rhs)?) {
                (Z3Term::Int(l), Z3Term::Int(r)) => Ok(Z3Term::Bool(l.eq(&r))),
                (Z3Term::Bool(l), Z3Term::Bool(r)) => Ok(Z3Term::Bool(l.eq(&r))),
                _ => Err(Z3Error::SortMismatch("=")),
            },
            SmtTerm::Lt(lhs, rhs) => {
                Ok(Z3Term::Bool(self.translate_int(lhs)?.lt(&self.translate_int(rhs)?)))
            }
            SmtTerm::Le(lhs, rhs) => {
                Ok(Z3Term::Bool(self.translate_int(lhs)?.le(&self.translate_int(rhs)?)))
            }
            SmtTerm::Gt(lhs, rhs) => {
                Ok(Z3Term::Bool(self.translate_int(lhs)?.gt(&self.translate_int(rhs)?)))
            }
            SmtTerm::Ge(lhs, rhs) => {
                Ok(Z3Term::Bool(self.translate_int(lhs)?.ge(&self.translate_int(rhs)?)))
            }
            SmtTerm::And(terms) => {
                let bools = self.translate_all_bool(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = self.translate_all_bool(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => Ok(Z3Term::Bool(self.translate_bool(inner)?.not())),
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_bool(lhs)?;
                let r = self.translate_bool(rhs)?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_bool(cond)?;
                match (self.translate_term(then)?, self.translate_term(els)?) {
                    (Z3Term::Int(t), Z3Term::Int(e)) => Ok(Z3Term::Int(c.ite(&t, &e))),
                    (Z3Term::Bool(t), Z3Term::Bool(e)) => Ok(Z3Term::Bool(c.ite(&t, &e))),
                    _ => Err(Z3Error::SortMismatch("ite")),
                }
            }
        }
    }

    fn unknown_reason(&self) -> String {
        self.solver
            .get_reason_unknown()
            .unwrap_or_else(|| "Z3 returned unknown".into())
    }
}

enum Z3Term {
    Int(z3::ast::Int),
    Bool(z3::ast::Bool),
}

impl Z3Term {
    fn into_int(self) -> Result<z3::ast::Int, Z3Error> {
        match self {
            Z3Term::Int(i) => Ok(i),
            Z3Term::Bool(_) => Err(Z3Error::SortMismatch("expected Int")),
        }
    }

    fn into_bool(self) -> Result<z3::ast::Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) => Err(Z3Error::SortMismatch("expected Bool")),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        match sort {
            SmtSort::Int => {
                self.int_vars
                    .insert(name.to_string(), z3::ast::Int::new_const(name));
            }
            SmtSort::Bool => {
                self.bool_vars
                    .insert(name.to_string(), z3::ast::Bool::new_const(name));
            }
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_bool(term)?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => Ok(SatResult::Sat),
            Z3SatResult::Unsat => Ok(SatResult::Unsat),
            Z3SatResult::Unknown => Ok(SatResult::Unknown(self.unknown_reason())),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => {
                let z3_model = self
                    .solver
                    .get_model()
                    .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
                let mut values = BTreeMap::new();
                for &(name, sort) in var_names {
                    let value = match sort {
                        SmtSort::Int => self
                            .int_vars
                            .get(name)
                            .and_then(|v| z3_model.eval::<z3::ast::Int>(v, true))
                            .and_then(|v| v.as_i64())
                            .map(ModelValue::Int),
                        SmtSort::Bool => self
                            .bool_vars
                            .get(name)
                            .and_then(|v| z3_model.eval::<z3::ast::Bool>(v, true))
                            .and_then(|v| v.as_bool())
                            .map(ModelValue::Bool),
                    };
                    if let Some(value) = value {
                        values.insert(name.to_string(), value);
                    }
                }
                Ok((SatResult::Sat, Some(Model { values })))
            }
            Z3SatResult::Unsat => Ok((SatResult::Unsat, None)),
            Z3SatResult::Unknown => Ok((SatResult::Unknown(self.unknown_reason()), None)),
        }
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 drops per-solver parameters on reset.
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        self.int_vars.clear();
        self.bool_vars.clear();
        Ok(())
    }
}
