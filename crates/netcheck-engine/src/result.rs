use std::fmt;

use indexmap::IndexMap;
use netcheck_smt::solver::Model;
use serde::Serialize;

/// Outcome of one query: the property held, or a counterexample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,
}

impl VerificationResult {
    pub fn verified() -> Self {
        Self {
            verified: true,
            model: None,
        }
    }

    pub fn violated(model: Model) -> Self {
        Self {
            verified: false,
            model: Some(model),
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            None => write!(f, "verified"),
            Some(model) => write!(f, "violated ({} assignments)", model.len()),
        }
    }
}

/// The property a driver checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    BlackHole,
    RoutingLoop,
    Reachability,
    MultipathConsistency,
    LoadBalance,
    BoundedLength,
    EqualLength,
    LocalConsistency,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Property::BlackHole => "black hole",
            Property::RoutingLoop => "routing loop",
            Property::Reachability => "reachability",
            Property::MultipathConsistency => "multipath consistency",
            Property::LoadBalance => "load balance",
            Property::BoundedLength => "bounded length",
            Property::EqualLength => "equal length",
            Property::LocalConsistency => "local consistency",
        })
    }
}

/// A query that could not be decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFailure {
    pub key: String,
    pub reason: String,
}

/// Two routers that could not be compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub left: String,
    pub right: String,
    pub reason: String,
}

/// Everything one driver invocation produced, keyed by edge or router pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyAnswer {
    pub property: Property,
    pub results: IndexMap<String, VerificationResult>,
    pub failures: Vec<QueryFailure>,
    pub mismatches: Vec<Mismatch>,
}

impl PropertyAnswer {
    pub fn new(property: Property) -> Self {
        Self {
            property,
            results: IndexMap::new(),
            failures: Vec::new(),
            mismatches: Vec::new(),
        }
    }

    /// True when every decided query verified and none failed.
    pub fn all_verified(&self) -> bool {
        self.failures.is_empty() && self.results.values().all(|r| r.verified)
    }

    pub fn violations(&self) -> impl Iterator<Item = (&String, &VerificationResult)> + '_ {
        self.results.iter().filter(|(_, r)| !r.verified)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcheck_smt::solver::ModelValue;

    #[test]
    fn verified_result_serializes_without_model() {
        let json = serde_json::to_string(&VerificationResult::verified()).unwrap();
        assert_eq!(json, r#"{"verified":true}"#);
    }

    #[test]
    fn answer_reports_violations_in_insertion_order() {
        let mut model = Model::default();
        model.values.insert("dst_ip".into(), ModelValue::Int(3232235521));
        let mut answer = PropertyAnswer::new(Property::RoutingLoop);
        answer.results.insert("b".into(), VerificationResult::violated(model));
        answer.results.insert("a".into(), VerificationResult::verified());
        assert!(!answer.all_verified());
        let keys: Vec<&String> = answer.violations().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b"]);
        let json = answer.to_json().unwrap();
        assert!(json.contains("\"property\": \"routing_loop\""));
        assert!(json.contains("3232235521"));
    }
}
