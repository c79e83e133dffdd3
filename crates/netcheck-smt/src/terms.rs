/// Solver-agnostic term representation.
///
/// The smart constructors fold boolean and integer literals eagerly. The
/// control-plane encoding produces a large number of constant attributes
/// (administrative distances, neutral local preferences), and folding them
/// here keeps the asserted formulas small for every backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Boolean literal.
    BoolLit(bool),

    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),

    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn tt() -> Self {
        SmtTerm::BoolLit(true)
    }

    pub fn ff() -> Self {
        SmtTerm::BoolLit(false)
    }

    /// Returns the literal value if this term is a boolean constant.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SmtTerm::BoolLit(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the literal value if this term is an integer constant.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SmtTerm::IntLit(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.as_bool() == Some(true)
    }

    pub fn is_false(&self) -> bool {
        self.as_bool() == Some(false)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        match (&self, &other) {
            (SmtTerm::IntLit(a), SmtTerm::IntLit(b)) => SmtTerm::IntLit(a.saturating_add(*b)),
            (_, SmtTerm::IntLit(0)) => self,
            (SmtTerm::IntLit(0), _) => other,
            _ => SmtTerm::Add(Box::new(self), Box::new(other)),
        }
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        match (&self, &other) {
            (SmtTerm::IntLit(a), SmtTerm::IntLit(b)) => SmtTerm::IntLit(a.saturating_sub(*b)),
            (_, SmtTerm::IntLit(0)) => self,
            _ => SmtTerm::Sub(Box::new(self), Box::new(other)),
        }
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        match (&self, &other) {
            (SmtTerm::IntLit(a), SmtTerm::IntLit(b)) => SmtTerm::BoolLit(a == b),
            (SmtTerm::BoolLit(a), SmtTerm::BoolLit(b)) => SmtTerm::BoolLit(a == b),
            (SmtTerm::BoolLit(true), _) => other,
            (_, SmtTerm::BoolLit(true)) => self,
            (SmtTerm::BoolLit(false), _) => other.not(),
            (_, SmtTerm::BoolLit(false)) => self.not(),
            _ if self == other => SmtTerm::BoolLit(true),
            _ => SmtTerm::Eq(Box::new(self), Box::new(other)),
        }
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        match (&self, &other) {
            (SmtTerm::IntLit(a), SmtTerm::IntLit(b)) => SmtTerm::BoolLit(a < b),
            _ => SmtTerm::Lt(Box::new(self), Box::new(other)),
        }
    }

    pub fn le(self, other: SmtTerm) -> Self {
        match (&self, &other) {
            (SmtTerm::IntLit(a), SmtTerm::IntLit(b)) => SmtTerm::BoolLit(a <= b),
            _ => SmtTerm::Le(Box::new(self), Box::new(other)),
        }
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        match (&self, &other) {
            (SmtTerm::IntLit(a), SmtTerm::IntLit(b)) => SmtTerm::BoolLit(a > b),
            _ => SmtTerm::Gt(Box::new(self), Box::new(other)),
        }
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        match (&self, &other) {
            (SmtTerm::IntLit(a), SmtTerm::IntLit(b)) => SmtTerm::BoolLit(a >= b),
            _ => SmtTerm::Ge(Box::new(self), Box::new(other)),
        }
    }

    /// Conjunction. Nested conjunctions are flattened and `true` operands
    /// dropped; an empty conjunction is `true`.
    pub fn and(terms: Vec<SmtTerm>) -> Self {
        let mut out = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                SmtTerm::BoolLit(true) => {}
                SmtTerm::BoolLit(false) => return SmtTerm::BoolLit(false),
                SmtTerm::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => SmtTerm::BoolLit(true),
            1 => out.pop().unwrap_or(SmtTerm::BoolLit(true)),
            _ => SmtTerm::And(out),
        }
    }

    /// Disjunction. Nested disjunctions are flattened and `false` operands
    /// dropped; an empty disjunction is `false`.
    pub fn or(terms: Vec<SmtTerm>) -> Self {
        let mut out = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                SmtTerm::BoolLit(false) => {}
                SmtTerm::BoolLit(true) => return SmtTerm::BoolLit(true),
                SmtTerm::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => SmtTerm::BoolLit(false),
            1 => out.pop().unwrap_or(SmtTerm::BoolLit(false)),
            _ => SmtTerm::Or(out),
        }
    }

    pub fn not(self) -> Self {
        match self {
            SmtTerm::BoolLit(b) => SmtTerm::BoolLit(!b),
            SmtTerm::Not(inner) => *inner,
            other => SmtTerm::Not(Box::new(other)),
        }
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        match (&self, &other) {
            (SmtTerm::BoolLit(false), _) | (_, SmtTerm::BoolLit(true)) => SmtTerm::BoolLit(true),
            (SmtTerm::BoolLit(true), _) => other,
            (_, SmtTerm::BoolLit(false)) => self.not(),
            _ => SmtTerm::Implies(Box::new(self), Box::new(other)),
        }
    }

    /// If-then-else over terms of one sort.
    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        match cond {
            SmtTerm::BoolLit(true) => then,
            SmtTerm::BoolLit(false) => els,
            _ if then == els => then,
            cond => SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els)),
        }
    }

    /// `lo <= self <= hi` over integer literals.
    pub fn within(self, lo: i64, hi: i64) -> Self {
        SmtTerm::and(vec![
            self.clone().ge(SmtTerm::int(lo)),
            self.le(SmtTerm::int(hi)),
        ])
    }
}
