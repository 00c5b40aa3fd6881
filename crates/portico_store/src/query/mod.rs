//! The object-query dialect.
//!
//! A deliberately small query language over registered entity types:
//!
//! ```text
//! [select <attr>] from <Entity> [where <expr>] [order by <attr> [asc|desc]]
//! ```
//!
//! Comparisons are `=`, `!=`, `<`, `<=`, `>`, `>=` and `like`; conditions
//! combine with `and`/`or` (with `and` binding tighter) and group with
//! parentheses. Operands are literals (`42`, `1.5`, `'text'`, `true`,
//! `false`, `null`) or named parameters written `:name`. Keywords are
//! case-insensitive, entity and attribute names are not.
//!
//! Parsing and evaluation both live here; sessions parse caller text with
//! [`parse`], validate it against the bound entity definition, and
//! evaluate it row by row over their merged scan.

mod eval;
mod parser;
mod pattern;

pub use pattern::like_match;

pub(crate) use eval::{check_attribute, read_attribute, validate, EvalContext};
pub(crate) use parser::parse;

use portico_model::Value;

/// A parsed dialect query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Query {
    /// Attribute projected by `select`, if any.
    pub projection: Option<String>,
    /// Entity name after `from`.
    pub entity: String,
    /// The `where` expression, if any.
    pub filter: Option<Expr>,
    /// The `order by` clause, if any.
    pub order: Option<OrderBy>,
}

/// A boolean filter expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// `attribute op operand`
    Cmp {
        attribute: String,
        op: CmpOp,
        operand: Operand,
    },
    /// Both sides must hold.
    And(Box<Expr>, Box<Expr>),
    /// Either side must hold.
    Or(Box<Expr>, Box<Expr>),
}

/// Comparison operator of a single predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    /// An inline literal value.
    Literal(Value),
    /// A named parameter, bound at execution time.
    Param(String),
}

/// An `order by` clause.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderBy {
    pub attribute: String,
    pub descending: bool,
}
