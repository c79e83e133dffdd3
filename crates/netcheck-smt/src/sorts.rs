/// SMT sorts used by the control-plane encoding.
///
/// Everything the encoder produces lives in QF_LIA, so booleans and
/// unbounded integers are the only sorts needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmtSort {
    Bool,
    Int,
}

impl SmtSort {
    /// Neutral literal of this sort, used to pin unused attributes.
    pub fn zero(self) -> crate::terms::SmtTerm {
        match self {
            SmtSort::Bool => crate::terms::SmtTerm::bool(false),
            SmtSort::Int => crate::terms::SmtTerm::int(0),
        }
    }
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Bool => f.write_str("Bool"),
            SmtSort::Int => f.write_str("Int"),
        }
    }
}
