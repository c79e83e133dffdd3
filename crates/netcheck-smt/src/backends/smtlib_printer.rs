use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Print a symbol, quoting it with `|...|` unless it is a simple SMT-LIB2
/// symbol. Router and interface names routinely contain `/` and `:` which
/// are fine, but spaces and brackets are not.
pub fn symbol(name: &str) -> String {
    let simple = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c));
    if simple {
        name.to_string()
    } else {
        format!("|{}|", name.replace('|', "_"))
    }
}

/// Print an SmtTerm as SMT-LIB2.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => symbol(name),
        SmtTerm::IntLit(n) => {
            if *n < 0 {
                format!("(- {})", n.unsigned_abs())
            } else {
                n.to_string()
            }
        }
        SmtTerm::BoolLit(b) => b.to_string(),
        SmtTerm::Add(lhs, rhs) => binary("+", lhs, rhs),
        SmtTerm::Sub(lhs, rhs) => binary("-", lhs, rhs),
        SmtTerm::Eq(lhs, rhs) => binary("=", lhs, rhs),
        SmtTerm::Lt(lhs, rhs) => binary("<", lhs, rhs),
        SmtTerm::Le(lhs, rhs) => binary("<=", lhs, rhs),
        SmtTerm::Gt(lhs, rhs) => binary(">", lhs, rhs),
        SmtTerm::Ge(lhs, rhs) => binary(">=", lhs, rhs),
        SmtTerm::And(terms) => nary("and", "true", terms),
        SmtTerm::Or(terms) => nary("or", "false", terms),
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => binary("=>", lhs, rhs),
        SmtTerm::Ite(cond, then, els) => format!(
            "(ite {} {} {})",
            to_smtlib(cond),
            to_smtlib(then),
            to_smtlib(els)
        ),
    }
}

fn binary(op: &str, lhs: &SmtTerm, rhs: &SmtTerm) -> String {
    format!("({op} {} {})", to_smtlib(lhs), to_smtlib(rhs))
}

fn nary(op: &str, unit: &str, terms: &[SmtTerm]) -> String {
    match terms {
        [] => unit.to_string(),
        [single] => to_smtlib(single),
        _ => {
            let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
            format!("({op} {})", inner.join(" "))
        }
    }
}

/// Print a sort as SMT-LIB2.
pub fn sort_to_smtlib(sort: &SmtSort) -> &'static str {
    match sort {
        SmtSort::Bool => "Bool",
        SmtSort::Int => "Int",
    }
}

/// Render a complete script: logic, declarations, assertions, check-sat.
pub fn script<'a>(
    declarations: impl IntoIterator<Item = (&'a str, SmtSort)>,
    assertions: impl IntoIterator<Item = &'a SmtTerm>,
) -> String {
    let mut out = String::from("(set-logic QF_LIA)\n");
    for (name, sort) in declarations {
        out.push_str(&format!(
            "(declare-const {} {})\n",
            symbol(name),
            sort_to_smtlib(&sort)
        ));
    }
    for assertion in assertions {
        out.push_str(&format!("(assert {})\n", to_smtlib(assertion)));
    }
    out.push_str("(check-sat)\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_prefix_membership() {
        let term = SmtTerm::var("dst_ip").within(10, 20);
        assert_eq!(to_smtlib(&term), "(and (>= dst_ip 10) (<= dst_ip 20))");
    }

    #[test]
    fn print_negative_literal() {
        assert_eq!(to_smtlib(&SmtTerm::int(-5)), "(- 5)");
    }

    #[test]
    fn quotes_symbols_with_spaces_and_brackets() {
        assert_eq!(symbol("e0_r1_GigabitEthernet0/1"), "e0_r1_GigabitEthernet0/1");
        assert_eq!(symbol("e0_core 1[eth0]"), "|e0_core 1[eth0]|");
        assert_eq!(symbol("1abc"), "|1abc|");
    }

    #[test]
    fn script_declares_before_asserting() {
        let a = SmtTerm::var("a");
        let text = script([("a", SmtSort::Bool)], [&a]);
        let decl = text.find("(declare-const a Bool)").expect("declaration");
        let assertion = text.find("(assert a)").expect("assertion");
        assert!(decl < assertion);
        assert!(text.ends_with("(check-sat)\n"));
    }
}
