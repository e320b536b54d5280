//! Composable row predicates.
//!
//! A [`Predicate`] is what the engine hands to an entity store to restrict a
//! query. Leaves are either compiled permission conditions or identity-set
//! restrictions; inner nodes are `AND`/`OR`.

use std::fmt;

use serde_json::Value;

use crate::error::{Result, ScriptError};
use crate::eval::{is_truthy, Bindings};
use crate::expr::{parse_expression, Expr};
use crate::principal::Principal;
use crate::types::EntityId;

/// Binding name under which the candidate row is exposed to a condition.
pub const ROW_BINDING: &str = "self";

/// A positional value bound to a condition placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// The principal itself; binds by identity.
    Principal(Principal),
    /// A value produced by a scripted parameter expression.
    Value(Value),
}

impl QueryParam {
    /// The scalar a store compares against.
    pub fn to_value(&self) -> Value {
        match self {
            QueryParam::Principal(p) => Value::from(p.id.get()),
            QueryParam::Value(v) => v.clone(),
        }
    }
}

/// A permission condition bound to its resolved parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCondition {
    permission: String,
    query: String,
    expr: Expr,
    params: Vec<QueryParam>,
}

impl CompiledCondition {
    /// Parse `query` and bind it to `params`.
    ///
    /// Fails if the query does not parse or references a placeholder beyond
    /// the supplied parameters.
    pub fn new(
        permission: impl Into<String>,
        query: impl Into<String>,
        params: Vec<QueryParam>,
    ) -> Result<Self> {
        let query = query.into();
        let expr = parse_expression(&query)?;
        let highest = expr.max_param();
        if highest > params.len() {
            return Err(ScriptError::MissingParam(highest));
        }
        Ok(Self {
            permission: permission.into(),
            query,
            expr,
            params,
        })
    }

    /// Name of the permission this condition came from.
    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// The raw condition text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The parsed condition.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Bound parameters, in placeholder order.
    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    /// Parameter values as scalars, in placeholder order.
    pub fn param_values(&self) -> Vec<Value> {
        self.params.iter().map(QueryParam::to_value).collect()
    }

    /// Whether `row` satisfies this condition.
    pub fn matches(&self, row: &Value) -> Result<bool> {
        let mut bindings = Bindings::new();
        bindings.insert(ROW_BINDING.into(), row.clone());
        let result = self.expr.evaluate(&bindings, &self.param_values())?;
        Ok(is_truthy(&result))
    }
}

/// A composable row restriction.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Condition(CompiledCondition),
    In { field: String, values: Vec<EntityId> },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Both sides must hold.
    pub fn and(left: Predicate, right: Predicate) -> Predicate {
        Predicate::And(vec![left, right])
    }

    /// Any operand may hold. A single operand is returned as-is.
    pub fn or(mut operands: Vec<Predicate>) -> Predicate {
        if operands.len() == 1 {
            operands.remove(0)
        } else {
            Predicate::Or(operands)
        }
    }

    /// `field IN (values)`.
    pub fn in_set(field: impl Into<String>, values: impl IntoIterator<Item = EntityId>) -> Predicate {
        Predicate::In {
            field: field.into(),
            values: values.into_iter().collect(),
        }
    }

    /// Evaluate against a row. `row` must carry its identity under the
    /// field used by any `In` restriction.
    pub fn matches(&self, row: &Value) -> Result<bool> {
        match self {
            Predicate::Condition(cond) => cond.matches(row),
            Predicate::In { field, values } => Ok(row
                .get(field)
                .and_then(Value::as_i64)
                .is_some_and(|id| values.iter().any(|v| v.get() == id))),
            Predicate::And(operands) => {
                for operand in operands {
                    if !operand.matches(row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(operands) => {
                for operand in operands {
                    if operand.matches(row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

impl From<CompiledCondition> for Predicate {
    fn from(cond: CompiledCondition) -> Self {
        Predicate::Condition(cond)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Condition(cond) => f.write_str(cond.query()),
            Predicate::In { field, values } => {
                let list: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{field} IN ({})", list.join(", "))
            }
            Predicate::And(operands) => join(f, operands, " AND "),
            Predicate::Or(operands) => join(f, operands, " OR "),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, operands: &[Predicate], sep: &str) -> fmt::Result {
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "({operand})")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owner_condition(owner: &Principal) -> CompiledCondition {
        CompiledCondition::new(
            "own-invoices",
            "self.owner == ?1",
            vec![QueryParam::Principal(owner.clone())],
        )
        .unwrap()
    }

    #[test]
    fn test_principal_param_binds_by_identity() {
        let alice = Principal::new(3, "alice");
        let cond = owner_condition(&alice);

        assert!(cond.matches(&json!({ "id": 1, "owner": 3 })).unwrap());
        assert!(!cond.matches(&json!({ "id": 2, "owner": 4 })).unwrap());
    }

    #[test]
    fn test_missing_placeholder_rejected() {
        let err = CompiledCondition::new("p", "self.a == ?2", vec![QueryParam::Value(json!(1))])
            .unwrap_err();
        assert_eq!(err, ScriptError::MissingParam(2));
    }

    #[test]
    fn test_composite_matches() {
        let alice = Principal::new(3, "alice");
        let open = CompiledCondition::new("open", "self.status == 'open'", vec![]).unwrap();
        let pred = Predicate::and(
            Predicate::or(vec![owner_condition(&alice).into(), open.into()]),
            Predicate::in_set("id", [EntityId(1), EntityId(2)]),
        );

        assert!(pred.matches(&json!({ "id": 1, "owner": 3, "status": "paid" })).unwrap());
        assert!(pred.matches(&json!({ "id": 2, "owner": 9, "status": "open" })).unwrap());
        assert!(!pred.matches(&json!({ "id": 2, "owner": 9, "status": "paid" })).unwrap());
        assert!(!pred.matches(&json!({ "id": 5, "owner": 3, "status": "open" })).unwrap());
    }

    #[test]
    fn test_display() {
        let alice = Principal::new(3, "alice");
        let open = CompiledCondition::new("open", "self.status == 'open'", vec![]).unwrap();
        let pred = Predicate::and(
            Predicate::or(vec![owner_condition(&alice).into(), open.into()]),
            Predicate::in_set("id", [EntityId(7), EntityId(9)]),
        );
        assert_eq!(
            pred.to_string(),
            "((self.owner == ?1) OR (self.status == 'open')) AND (id IN (7, 9))"
        );
    }

    #[test]
    fn test_single_operand_or_collapses() {
        let open = CompiledCondition::new("open", "self.status == 'open'", vec![]).unwrap();
        assert_eq!(
            Predicate::or(vec![open.clone().into()]),
            Predicate::Condition(open)
        );
    }
}
