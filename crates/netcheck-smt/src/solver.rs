use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// A literal assigned by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Int(n) => write!(f, "{n}"),
            ModelValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Variable assignments extracted from a SAT result, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Model {
    pub values: BTreeMap<String, ModelValue>,
}

impl Model {
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over assignments whose name contains `fragment`.
    pub fn matching<'a>(
        &'a self,
        fragment: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a ModelValue)> + 'a {
        self.values
            .iter()
            .filter(move |(name, _)| name.contains(fragment))
    }
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    fn push(&mut self) -> Result<(), Self::Error>;

    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Check satisfiability and extract the listed variables if SAT.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    /// Drop every declaration and assertion.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct MockSolver {
        sat_result: SatResult,
        asserted: Vec<SmtTerm>,
        reset_calls: usize,
    }

    impl SmtSolver for MockSolver {
        type Error = io::Error;

        fn declare_var(&mut self, _name: &str, _sort: &SmtSort) -> Result<(), Self::Error> {
            Ok(())
        }

        fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error> {
            self.asserted.push(term.clone());
            Ok(())
        }

        fn push(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn pop(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, Self::Error> {
            Ok(self.sat_result.clone())
        }

        fn check_sat_with_model(
            &mut self,
            _var_names: &[(&str, &SmtSort)],
        ) -> Result<(SatResult, Option<Model>), Self::Error> {
            Ok((self.sat_result.clone(), None))
        }

        fn reset(&mut self) -> Result<(), Self::Error> {
            self.asserted.clear();
            self.reset_calls += 1;
            Ok(())
        }
    }

    #[test]
    fn model_getters_return_typed_values_only() {
        let mut values = BTreeMap::new();
        values.insert("dst_ip".to_string(), ModelValue::Int(167772161));
        values.insert("e0_r1_cf_eth0".to_string(), ModelValue::Bool(true));
        let model = Model { values };

        assert_eq!(model.get_int("dst_ip"), Some(167772161));
        assert_eq!(model.get_bool("e0_r1_cf_eth0"), Some(true));
        assert_eq!(model.get_int("e0_r1_cf_eth0"), None);
        assert_eq!(model.get_bool("dst_ip"), None);
        assert_eq!(model.get_bool("missing"), None);
    }

    #[test]
    fn model_iterates_in_name_order() {
        let mut values = BTreeMap::new();
        values.insert("b".to_string(), ModelValue::Int(2));
        values.insert("a".to_string(), ModelValue::Int(1));
        values.insert("c".to_string(), ModelValue::Bool(false));
        let model = Model { values };
        let names: Vec<&str> = model.values.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(model.matching("b").count(), 1);
    }

    #[test]
    fn model_serializes_as_plain_map() {
        let mut values = BTreeMap::new();
        values.insert("x".to_string(), ModelValue::Int(-3));
        values.insert("y".to_string(), ModelValue::Bool(true));
        let json = serde_json::to_string(&Model { values }).expect("serialize");
        assert_eq!(json, r#"{"x":-3,"y":true}"#);
    }

    #[test]
    fn reset_clears_assertions() {
        let mut solver = MockSolver {
            sat_result: SatResult::Unsat,
            asserted: Vec::new(),
            reset_calls: 0,
        };
        solver.assert(&SmtTerm::var("x")).expect("assert should succeed");
        assert_eq!(solver.asserted.len(), 1);
        assert_eq!(solver.check_sat().expect("check"), SatResult::Unsat);
        solver.reset().expect("reset should succeed");
        assert!(solver.asserted.is_empty());
        assert_eq!(solver.reset_calls, 1);
    }
}
