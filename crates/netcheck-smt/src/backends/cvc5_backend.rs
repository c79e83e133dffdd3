use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;

use crate::backends::smtlib_printer::{sort_to_smtlib, symbol, to_smtlib};
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Cvc5Error {
    #[error("cvc5 I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cvc5 not found: {0}")]
    NotFound(String),
    #[error("cvc5 error: {0}")]
    SolverError(String),
}

/// An incremental cvc5 subprocess driven over stdin/stdout.
pub struct Cvc5Solver {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
    vars: HashMap<String, SmtSort>,
}

impl Cvc5Solver {
    pub fn new() -> Result<Self, Cvc5Error> {
        Self::with_command_and_timeout("cvc5", None)
    }

    pub fn with_timeout_secs(timeout_secs: u64) -> Result<Self, Cvc5Error> {
        let timeout_ms = (timeout_secs > 0).then(|| timeout_secs.saturating_mul(1000));
        Self::with_command_and_timeout("cvc5", timeout_ms)
    }

    pub fn with_command_and_timeout(cmd: &str, timeout_ms: Option<u64>) -> Result<Self, Cvc5Error> {
        let mut args = vec![
            "--lang".to_string(),
            "smt2".to_string(),
            "--incremental".to_string(),
            "--produce-models".to_string(),
        ];
        if let Some(ms) = timeout_ms {
            args.push(format!("--tlimit-per={ms}"));
        }

        let mut child = Command::new(cmd)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Cvc5Error::NotFound(format!("{cmd}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("failed to capture cvc5 stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("failed to capture cvc5 stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("failed to capture cvc5 stderr".into()))?;

        let mut solver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr: BufReader::new(stderr),
            vars: HashMap::new(),
        };
        solver.send("(set-logic QF_LIA)")?;
        Ok(solver)
    }

    fn send(&mut self, cmd: &str) -> Result<(), Cvc5Error> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn query(&mut self, cmd: &str) -> Result<String, Cvc5Error> {
        self.send(cmd)?;
        let mut response = String::new();
        self.stdout.read_line(&mut response)?;
        if response.is_empty() {
            let mut stderr = String::new();
            let _ = self.stderr.read_line(&mut stderr);
            return Err(Cvc5Error::SolverError(format!(
                "no response for `{cmd}`; stderr: {}",
                stderr.trim()
            )));
        }
        Ok(response.trim_end().to_string())
    }
}

impl Drop for Cvc5Solver {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

impl SmtSolver for Cvc5Solver {
    type Error = Cvc5Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Cvc5Error> {
        self.send(&format!(
            "(declare-const {} {})",
            symbol(name),
            sort_to_smtlib(sort)
        ))?;
        self.vars.insert(name.to_string(), *sort);
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Cvc5Error> {
        self.send(&format!("(assert {})", to_smtlib(term)))
    }

    fn push(&mut self) -> Result<(), Cvc5Error> {
        self.send("(push 1)")
    }

    fn pop(&mut self) -> Result<(), Cvc5Error> {
        self.send("(pop 1)")
    }

    fn check_sat(&mut self) -> Result<SatResult, Cvc5Error> {
        let response = self.query("(check-sat)")?;
        match response.as_str() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => Ok(SatResult::Unknown("cvc5 returned unknown".into())),
            other => Err(Cvc5Error::SolverError(other.to_string())),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Cvc5Error> {
        let result = self.check_sat()?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }
        let mut values = BTreeMap::new();
        for &(name, sort) in var_names {
            if !self.vars.contains_key(name) {
                continue;
            }
            let response = self.query(&format!("(get-value ({}))", symbol(name)))?;
            if let Some(value) = parse_value(&response, *sort) {
                values.insert(name.to_string(), value);
            }
        }
        Ok((SatResult::Sat, Some(Model { values })))
    }

    fn reset(&mut self) -> Result<(), Cvc5Error> {
        self.send("(reset)")?;
        self.send("(set-logic QF_LIA)")?;
        self.vars.clear();
        Ok(())
    }
}

/// Parse a `get-value` response of the form `((sym value))`.
fn parse_value(response: &str, sort: SmtSort) -> Option<ModelValue> {
    let inner = response.trim().strip_prefix("((")?.strip_suffix("))")?;
    let rest = if let Some(quoted) = inner.strip_prefix('|') {
        let end = quoted.find('|')?;
        &quoted[end + 1..]
    } else {
        let end = inner.find(char::is_whitespace)?;
        &inner[end..]
    };
    let value = rest.trim();
    match sort {
        SmtSort::Int => {
            if let Some(neg) = value.strip_prefix("(-").and_then(|v| v.strip_suffix(')')) {
                neg.trim().parse::<i64>().ok().map(|n| ModelValue::Int(-n))
            } else {
                value.parse::<i64>().ok().map(ModelValue::Int)
            }
        }
        SmtSort::Bool => match value {
            "true" => Some(ModelValue::Bool(true)),
            "false" => Some(ModelValue::Bool(false)),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_value() {
        assert_eq!(parse_value("((x 42))", SmtSort::Int), Some(ModelValue::Int(42)));
    }

    #[test]
    fn parse_negative_int_value() {
        assert_eq!(
            parse_value("((x (- 7)))", SmtSort::Int),
            Some(ModelValue::Int(-7))
        );
    }

    #[test]
    fn parse_bool_value() {
        assert_eq!(
            parse_value("((b true))", SmtSort::Bool),
            Some(ModelValue::Bool(true))
        );
        assert_eq!(
            parse_value("((b false))", SmtSort::Bool),
            Some(ModelValue::Bool(false))
        );
    }

    #[test]
    fn parse_quoted_symbol_value() {
        assert_eq!(
            parse_value("((|e0_core 1_cf| true))", SmtSort::Bool),
            Some(ModelValue::Bool(true))
        );
        assert_eq!(
            parse_value("((|a b| 3))", SmtSort::Int),
            Some(ModelValue::Int(3))
        );
    }

    #[test]
    fn malformed_response_yields_none() {
        assert_eq!(parse_value("(error \"x\")", SmtSort::Int), None);
    }
}
