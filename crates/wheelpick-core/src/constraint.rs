//! Runtime version constraints (`python-versions = ">=3.7,<3.11"`).
//!
//! A constraint is a comma-separated conjunction of `{op}{version}` clauses.
//! Each clause compares the runtime version truncated to the clause's arity,
//! so `<3.11` rejects every 3.11.x and `==3.9.*` accepts every 3.9.x.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use wheelpick_schema::RuntimeVersion;

static CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<op>>=|<=|==|!=|>|<)\s*(?P<num>[0-9.*]+)\s*$")
        .expect("constraint clause pattern is valid")
});

/// Errors produced when parsing a constraint.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// A clause does not match `{op}{dotted numbers}[.*]`.
    #[error("Invalid version constraint clause '{0}'")]
    InvalidClause(String),
}

/// Comparison operator of a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl Operator {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => ordering == Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Ge => ordering != Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
        }
    }
}

impl FromStr for Operator {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            ">=" => Ok(Self::Ge),
            "<=" => Ok(Self::Le),
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            _ => Err(ConstraintError::InvalidClause(s.to_string())),
        }
    }
}

/// One `{op}{version}` clause. A trailing `.*` is dropped at parse time; it
/// only shortens the arity the runtime version is truncated to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Comparison operator.
    pub op: Operator,
    /// Numeric version segments, wildcard removed.
    pub segments: Vec<u32>,
}

impl Clause {
    /// Whether `version`, truncated to this clause's arity, satisfies it.
    pub fn matches(&self, version: RuntimeVersion) -> bool {
        let triple = version.segments();
        let arity = self.segments.len().min(triple.len());
        self.op.holds(triple[..arity].cmp(&self.segments[..]))
    }
}

impl FromStr for Clause {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConstraintError::InvalidClause(s.trim().to_string());
        let caps = CLAUSE.captures(s).ok_or_else(invalid)?;

        let mut parts: Vec<&str> = caps["num"].split('.').collect();
        if parts.last() == Some(&"*") {
            parts.pop();
        }
        if parts.is_empty() {
            return Err(invalid());
        }
        let segments = parts
            .iter()
            .map(|p| p.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            op: caps["op"].parse()?,
            segments,
        })
    }
}

/// A conjunction of clauses. The empty constraint and `*` accept everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeConstraint {
    clauses: Vec<Clause>,
}

impl RuntimeConstraint {
    /// Parsed clauses, in source order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Whether every clause holds for `version`.
    pub fn is_satisfied_by(&self, version: RuntimeVersion) -> bool {
        self.clauses.iter().all(|c| c.matches(version))
    }
}

impl FromStr for RuntimeConstraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::default());
        }
        let clauses = s
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Clause>, _>>()?;
        Ok(Self { clauses })
    }
}

/// Evaluate an optional constraint string against a runtime version.
///
/// A missing constraint is satisfied; a constraint that does not parse is
/// not.
///
/// ```
/// use wheelpick_core::constraint::is_satisfied_by;
/// use wheelpick_schema::RuntimeVersion;
///
/// assert!(is_satisfied_by(Some(">=3.7,<3.11"), RuntimeVersion::new(3, 9, 18)));
/// assert!(!is_satisfied_by(Some(">=3.7,<3.11"), RuntimeVersion::new(3, 11, 0)));
/// assert!(is_satisfied_by(Some("*"), RuntimeVersion::new(2, 7, 0)));
/// assert!(is_satisfied_by(None, RuntimeVersion::new(2, 7, 0)));
/// ```
pub fn is_satisfied_by(constraint: Option<&str>, version: RuntimeVersion) -> bool {
    match constraint.map(str::parse::<RuntimeConstraint>) {
        None => true,
        Some(Ok(constraint)) => constraint.is_satisfied_by(version),
        Some(Err(e)) => {
            tracing::debug!("{e}; treating constraint as unsatisfied");
            false
        }
    }
}
