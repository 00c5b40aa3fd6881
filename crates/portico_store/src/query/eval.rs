//! Query validation and row-by-row evaluation.

use std::cmp::Ordering;

use portico_model::{EntityDef, Record, Value};

use crate::error::{EngineError, EngineResult};
use crate::session::Params;

use super::pattern::like_match;
use super::{CmpOp, Expr, Operand, OrderBy, Query};

/// Checks every attribute and parameter reference in `query` up front,
/// so a query over an empty table still reports its mistakes.
pub(crate) fn validate(
    query: &Query,
    def: &'static EntityDef,
    params: &Params,
) -> EngineResult<()> {
    if let Some(attribute) = &query.projection {
        check_attribute(def, attribute)?;
    }
    if let Some(order) = &query.order {
        check_attribute(def, &order.attribute)?;
    }
    if let Some(filter) = &query.filter {
        validate_expr(filter, def, params)?;
    }
    Ok(())
}

fn validate_expr(expr: &Expr, def: &'static EntityDef, params: &Params) -> EngineResult<()> {
    match expr {
        Expr::Cmp {
            attribute, operand, ..
        } => {
            check_attribute(def, attribute)?;
            if let Operand::Param(name) = operand {
                if params.get(name).is_none() {
                    return Err(EngineError::unbound_parameter(name));
                }
            }
            Ok(())
        }
        Expr::And(left, right) | Expr::Or(left, right) => {
            validate_expr(left, def, params)?;
            validate_expr(right, def, params)
        }
    }
}

/// Checks that `name` is the identity attribute or declared somewhere on
/// the definition chain.
pub(crate) fn check_attribute(def: &'static EntityDef, name: &str) -> EngineResult<()> {
    if def.key_attribute() == Some(name) || def.attr(name).is_some() {
        Ok(())
    } else {
        Err(EngineError::unknown_attribute(def.name, name))
    }
}

/// Reads one attribute off a record, resolving the identity attribute to
/// the row key.
pub(crate) fn read_attribute(record: &Record, def: &'static EntityDef, name: &str) -> Value {
    if def.key_attribute() == Some(name) {
        return record.key().map_or(Value::Null, Value::from);
    }
    record.value(name).clone()
}

/// Evaluation state shared across the rows of one query.
pub(crate) struct EvalContext<'a> {
    pub def: &'static EntityDef,
    pub params: &'a Params,
    pub like_case_insensitive: bool,
}

impl EvalContext<'_> {
    /// Whether a record satisfies the filter expression.
    pub fn matches(&self, expr: &Expr, record: &Record) -> EngineResult<bool> {
        match expr {
            Expr::And(left, right) => {
                Ok(self.matches(left, record)? && self.matches(right, record)?)
            }
            Expr::Or(left, right) => {
                Ok(self.matches(left, record)? || self.matches(right, record)?)
            }
            Expr::Cmp {
                attribute,
                op,
                operand,
            } => {
                let left = read_attribute(record, self.def, attribute);
                let right = self.operand_value(operand)?;
                self.compare(attribute, &left, *op, &right)
            }
        }
    }

    /// Sorts records by the `order by` attribute. Null sorts before
    /// everything; `desc` reverses the whole ordering, nulls included.
    /// The sort is stable, so ties keep scan order.
    pub fn sort(&self, records: &mut [Record], order: &OrderBy) {
        records.sort_by(|a, b| {
            let va = read_attribute(a, self.def, &order.attribute);
            let vb = read_attribute(b, self.def, &order.attribute);
            let ordering = order_values(&va, &vb);
            if order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    fn operand_value(&self, operand: &Operand) -> EngineResult<Value> {
        match operand {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Param(name) => self
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::unbound_parameter(name)),
        }
    }

    /// Null semantics: `=` holds for null against null, fails against
    /// anything else, and `!=` is its exact negation. The ordering
    /// operators never hold when either side is null. Comparing values of
    /// unrelated types (beyond int/float coercion) is a query error.
    fn compare(
        &self,
        attribute: &str,
        left: &Value,
        op: CmpOp,
        right: &Value,
    ) -> EngineResult<bool> {
        match op {
            CmpOp::Like => {
                let Some(pattern) = right.as_text() else {
                    return Err(EngineError::query(format!(
                        "like pattern for '{attribute}' must be text, got {}",
                        right.type_name()
                    )));
                };
                match left {
                    Value::Null => Ok(false),
                    Value::Text(text) => Ok(like_match(pattern, text, self.like_case_insensitive)),
                    other => Err(EngineError::query(format!(
                        "like applies to text attributes; '{attribute}' holds {}",
                        other.type_name()
                    ))),
                }
            }
            CmpOp::Eq | CmpOp::Ne => {
                let equal = if left.is_null() || right.is_null() {
                    left.is_null() && right.is_null()
                } else {
                    match left.compare(right) {
                        Some(ordering) => ordering == Ordering::Equal,
                        None => return Err(type_error(attribute, left, right)),
                    }
                };
                Ok(if op == CmpOp::Eq { equal } else { !equal })
            }
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                if left.is_null() || right.is_null() {
                    return Ok(false);
                }
                let ordering = left
                    .compare(right)
                    .ok_or_else(|| type_error(attribute, left, right))?;
                Ok(match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Le => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                })
            }
        }
    }
}

fn order_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn type_error(attribute: &str, left: &Value, right: &Value) -> EngineError {
    EngineError::query(format!(
        "cannot compare '{attribute}' ({}) with {}",
        left.type_name(),
        right.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use portico_model::{AttrDef, AttrKind, Key};

    use crate::query::parse;

    use super::*;

    static PET: EntityDef = EntityDef {
        name: "Pet",
        parent: None,
        key_attr: Some("id"),
        declared: &[
            AttrDef::new("name", AttrKind::Text),
            AttrDef::new("age", AttrKind::Int),
            AttrDef::new("weight", AttrKind::Float),
            AttrDef::new("adopted", AttrKind::Bool),
        ],
    };

    fn pet(key: u64, name: Option<&str>, age: Option<i64>) -> Record {
        let mut record = Record::new("Pet").with_key(Key::new(key));
        record.set("name", Value::from(name));
        record.set("age", Value::from(age));
        record
    }

    /// Parse, validate, and run one query over the given rows.
    fn run(text: &str, params: &Params, rows: &[Record]) -> EngineResult<Vec<Record>> {
        let query = parse(text)?;
        validate(&query, &PET, params)?;
        let ctx = EvalContext {
            def: &PET,
            params,
            like_case_insensitive: false,
        };
        let mut kept = Vec::new();
        for record in rows {
            let keep = match &query.filter {
                Some(filter) => ctx.matches(filter, record)?,
                None => true,
            };
            if keep {
                kept.push(record.clone());
            }
        }
        if let Some(order) = &query.order {
            ctx.sort(&mut kept, order);
        }
        Ok(kept)
    }

    fn names(rows: &[Record]) -> Vec<String> {
        rows.iter()
            .map(|r| match r.value("name") {
                Value::Text(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    #[test]
    fn equality_and_negation() {
        let rows = vec![
            pet(1, Some("Lups"), Some(3)),
            pet(2, Some("Pipa"), Some(5)),
        ];
        let none = Params::new();

        let hits = run("from Pet where age = 3", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Lups"]);

        let hits = run("from Pet where age != 3", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Pipa"]);
    }

    #[test]
    fn null_semantics() {
        let rows = vec![pet(1, Some("Lups"), Some(3)), pet(2, Some("Pipa"), None)];
        let none = Params::new();

        // null = null holds, null against a value does not
        let hits = run("from Pet where age = null", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Pipa"]);

        let hits = run("from Pet where age != null", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Lups"]);

        // ordering operators never hold on null
        let hits = run("from Pet where age < 100", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Lups"]);
    }

    #[test]
    fn numeric_coercion() {
        let rows = vec![pet(1, Some("Lups"), Some(3))];
        let none = Params::new();
        let hits = run("from Pet where age = 3.0", &none, &rows).unwrap();
        assert_eq!(hits.len(), 1);
        let hits = run("from Pet where age > 2.5", &none, &rows).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn like_over_text() {
        let rows = vec![
            pet(1, Some("Lups"), Some(3)),
            pet(2, Some("Lemmi"), Some(4)),
            pet(3, None, Some(5)),
        ];
        let none = Params::new();
        let hits = run("from Pet where name like 'L%'", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Lups", "Lemmi"]);
    }

    #[test]
    fn like_type_errors() {
        let rows = vec![pet(1, Some("Lups"), Some(3))];
        let none = Params::new();

        // non-text attribute
        let err = run("from Pet where age like 'L%'", &none, &rows).unwrap_err();
        assert!(err.to_string().contains("text"), "got: {err}");

        // non-text pattern
        let params = Params::new().bind("p", 7i64);
        let err = run("from Pet where name like :p", &params, &rows).unwrap_err();
        assert!(err.to_string().contains("pattern"), "got: {err}");
    }

    #[test]
    fn mismatched_comparison_is_an_error() {
        let rows = vec![pet(1, Some("Lups"), Some(3))];
        let none = Params::new();
        assert!(run("from Pet where name = 3", &none, &rows).is_err());
        assert!(run("from Pet where adopted = 1", &none, &rows).is_err());
    }

    #[test]
    fn key_attribute_resolves_to_row_key() {
        let rows = vec![
            pet(1, Some("Lups"), Some(3)),
            pet(2, Some("Pipa"), Some(5)),
        ];
        let none = Params::new();
        let hits = run("from Pet where id = 2", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Pipa"]);
        let hits = run("from Pet where id > 1", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Pipa"]);
    }

    #[test]
    fn parameters_bind_by_name() {
        let rows = vec![
            pet(1, Some("Lups"), Some(3)),
            pet(2, Some("Pipa"), Some(5)),
        ];
        let params = Params::new().bind("n", "Pipa");
        let hits = run("from Pet where name = :n", &params, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Pipa"]);
    }

    #[test]
    fn unbound_parameter_fails_before_evaluation() {
        let none = Params::new();
        // no rows at all, the validation still catches it
        let err = run("from Pet where name = :n", &none, &[]).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnboundParameter {
                name: "n".to_string()
            }
        );
    }

    #[test]
    fn unknown_attribute_fails_before_evaluation() {
        let none = Params::new();
        let err = run("from Pet where color = 'red'", &none, &[]).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownAttribute {
                entity: "Pet".to_string(),
                attribute: "color".to_string()
            }
        );
        assert!(run("select color from Pet", &none, &[]).is_err());
        assert!(run("from Pet order by color", &none, &[]).is_err());
    }

    #[test]
    fn order_by_sorts_nulls_first() {
        let rows = vec![
            pet(1, Some("Lups"), Some(3)),
            pet(2, Some("Pipa"), None),
            pet(3, Some("Nikki"), Some(1)),
        ];
        let none = Params::new();

        let hits = run("from Pet order by age", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Pipa", "Nikki", "Lups"]);

        let hits = run("from Pet order by age desc", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Lups", "Nikki", "Pipa"]);
    }

    #[test]
    fn boolean_equality() {
        let mut adopted = pet(1, Some("Lups"), Some(3));
        adopted.set("adopted", true);
        let mut stray = pet(2, Some("Pipa"), Some(5));
        stray.set("adopted", false);
        let rows = vec![adopted, stray];
        let none = Params::new();

        let hits = run("from Pet where adopted = false", &none, &rows).unwrap();
        assert_eq!(names(&hits), vec!["Pipa"]);
    }
}
