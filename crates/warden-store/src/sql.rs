//! Lowering of row predicates to SQLite SQL.
//!
//! Rows live in `entities.data` as JSON objects; `self.a.b` lowers to
//! `json_extract(data, '$.a.b')` and `self.id` to the `id` column. Values are
//! bound as numbered `?N` parameters, so a lowered operand may appear more
//! than once in the generated SQL.
//!
//! The lowered SQL decides rows exactly as in-memory evaluation does. Every
//! operand carries its JSON kind: equality and ordering hold only between
//! values of the same kind, `null` compares with `IS`, and a condition holds
//! when its value is truthy. Every boolean produced here is `0` or `1`, never
//! `NULL`, so `NOT` needs no special casing.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use warden_core::{BinOp, Expr, Predicate, ROW_BINDING};

use crate::error::{Result, StoreError};

/// A SQL boolean expression with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Lower a predicate to a SQL boolean expression.
pub fn lower_predicate(predicate: &Predicate) -> Result<SqlFragment> {
    let mut lowering = Lowering::default();
    let sql = lowering.predicate(predicate)?;
    Ok(SqlFragment {
        sql,
        params: lowering.params,
    })
}

/// JSON value kinds, as seen by the expression evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Null,
    Bool,
    Number,
    Text,
    Array,
    Object,
}

impl Kind {
    fn of(value: &Value) -> Kind {
        match value {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::Text,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Number => "number",
            Kind::Text => "text",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }

    /// The `json_type` names that make up this kind.
    fn json_types(self) -> &'static str {
        match self {
            Kind::Null => "'null'",
            Kind::Bool => "'true', 'false'",
            Kind::Number => "'integer', 'real'",
            Kind::Text => "'text'",
            Kind::Array => "'array'",
            Kind::Object => "'object'",
        }
    }

    fn is_ordered(self) -> bool {
        matches!(self, Kind::Bool | Kind::Number | Kind::Text)
    }
}

/// How the kind of an operand is determined.
#[derive(Debug, Clone)]
enum Typing {
    /// Fixed when the SQL is built.
    Known(Kind),
    /// Read per row from a SQL expression yielding a `json_type` name.
    /// The expression is never `NULL`.
    Json(String),
}

impl Typing {
    /// SQL that is 1 when the operand is of `kind`.
    fn test(&self, kind: Kind) -> String {
        match self {
            Typing::Known(known) => flag(*known == kind),
            Typing::Json(ty) => format!("{ty} IN ({})", kind.json_types()),
        }
    }

    /// SQL yielding the operand's [`Kind::name`].
    fn name(&self) -> String {
        match self {
            Typing::Known(kind) => format!("'{}'", kind.name()),
            Typing::Json(ty) => format!(
                "(CASE {ty} WHEN 'true' THEN 'bool' WHEN 'false' THEN 'bool' \
                 WHEN 'integer' THEN 'number' WHEN 'real' THEN 'number' ELSE {ty} END)"
            ),
        }
    }
}

/// A lowered value expression and its kind.
#[derive(Debug, Clone)]
struct Operand {
    sql: String,
    typing: Typing,
}

impl Operand {
    fn boolean(sql: String) -> Self {
        Self {
            sql,
            typing: Typing::Known(Kind::Bool),
        }
    }

    /// SQL that is 1 when the value is truthy and 0 otherwise.
    fn truth(&self) -> String {
        let v = &self.sql;
        match &self.typing {
            Typing::Known(Kind::Null) => "0".into(),
            Typing::Known(Kind::Bool) => v.clone(),
            Typing::Known(Kind::Number) => format!("({v}) <> 0"),
            Typing::Known(Kind::Text) => format!("({v}) <> ''"),
            Typing::Known(Kind::Array) => format!("({v}) <> '[]'"),
            Typing::Known(Kind::Object) => "1".into(),
            Typing::Json(ty) => format!(
                "(CASE {ty} WHEN 'true' THEN 1 WHEN 'integer' THEN ({v}) <> 0 \
                 WHEN 'real' THEN ({v}) <> 0 WHEN 'text' THEN ({v}) <> '' \
                 WHEN 'array' THEN ({v}) <> '[]' WHEN 'object' THEN 1 ELSE 0 END)"
            ),
        }
    }
}

/// A row field a path refers to.
enum Field {
    Id,
    /// A JSON path into `data`, such as `$.owner.id`.
    Json(String),
}

impl Field {
    fn operand(&self) -> Operand {
        match self {
            Field::Id => Operand {
                sql: "entities.id".into(),
                typing: Typing::Known(Kind::Number),
            },
            Field::Json(path) => Operand {
                sql: format!("json_extract(data, '{path}')"),
                typing: Typing::Json(format!("COALESCE(json_type(data, '{path}'), 'null')")),
            },
        }
    }
}

#[derive(Default)]
struct Lowering {
    params: Vec<SqlValue>,
    aliases: usize,
}

impl Lowering {
    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    fn predicate(&mut self, predicate: &Predicate) -> Result<String> {
        match predicate {
            Predicate::Condition(cond) => {
                let values = cond.param_values();
                Ok(self.expr(cond.expr(), &values)?.truth())
            }
            Predicate::In { field, values } => {
                if values.is_empty() {
                    return Ok("0".into());
                }
                let field = field_for(std::slice::from_ref(field))?;
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| self.bind(SqlValue::Integer(v.get())))
                    .collect();
                let list = placeholders.join(", ");
                Ok(match field {
                    Field::Id => format!("entities.id IN ({list})"),
                    Field::Json(path) => format!(
                        "json_type(data, '{path}') IS 'integer' \
                         AND json_extract(data, '{path}') IN ({list})"
                    ),
                })
            }
            Predicate::And(operands) => self.join(operands, " AND ", "1"),
            Predicate::Or(operands) => self.join(operands, " OR ", "0"),
        }
    }

    fn join(&mut self, operands: &[Predicate], sep: &str, empty: &str) -> Result<String> {
        if operands.is_empty() {
            return Ok(empty.into());
        }
        let parts = operands
            .iter()
            .map(|op| self.predicate(op).map(|sql| format!("({sql})")))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(sep))
    }

    fn expr(&mut self, expr: &Expr, params: &[Value]) -> Result<Operand> {
        match expr {
            Expr::Literal(value) => self.scalar(value),
            Expr::Param(n) => {
                let value = param(params, *n)?;
                self.scalar(value)
            }
            Expr::Path(segments) => Ok(row_field(segments)?.operand()),
            Expr::List(_) => Err(StoreError::UnsupportedPredicate(
                "list literal outside of `in`".into(),
            )),
            Expr::Not(inner) => {
                let inner = self.expr(inner, params)?;
                Ok(Operand::boolean(format!("NOT ({})", inner.truth())))
            }
            Expr::Neg(inner) => {
                let Operand { sql, typing } = self.expr(inner, params)?;
                match typing {
                    Typing::Known(kind @ (Kind::Bool | Kind::Text | Kind::Array | Kind::Object)) => {
                        Err(StoreError::UnsupportedPredicate(format!(
                            "cannot negate a {} value",
                            kind.name()
                        )))
                    }
                    typing => Ok(Operand {
                        sql: format!("-({sql})"),
                        typing,
                    }),
                }
            }
            Expr::Binary { op, left, right } => {
                let l = self.expr(left, params)?;
                let r = self.expr(right, params)?;
                let sql = match op {
                    BinOp::And => format!("({}) AND ({})", l.truth(), r.truth()),
                    BinOp::Or => format!("({}) OR ({})", l.truth(), r.truth()),
                    BinOp::Eq => equal(&l, &r),
                    BinOp::Ne => format!("NOT ({})", equal(&l, &r)),
                    BinOp::Lt => ordered(&l, "<", &r),
                    BinOp::Le => ordered(&l, "<=", &r),
                    BinOp::Gt => ordered(&l, ">", &r),
                    BinOp::Ge => ordered(&l, ">=", &r),
                };
                Ok(Operand::boolean(sql))
            }
            Expr::In {
                element,
                collection,
            } => {
                let needle = self.expr(element, params)?;
                let sql = self.membership(&needle, collection, params)?;
                Ok(Operand::boolean(sql))
            }
        }
    }

    /// `needle in collection`. A `null` needle is in nothing.
    fn membership(
        &mut self,
        needle: &Operand,
        collection: &Expr,
        params: &[Value],
    ) -> Result<String> {
        let matches = match collection {
            Expr::List(items) => {
                let mut alternatives = Vec::with_capacity(items.len());
                for item in items {
                    let item = self.expr(item, params)?;
                    alternatives.push(equal(needle, &item));
                }
                any(alternatives)
            }
            Expr::Param(n) => match param(params, *n)? {
                Value::Null => "0".into(),
                Value::Array(items) => {
                    let mut alternatives = Vec::with_capacity(items.len());
                    for item in items {
                        let item = self.scalar(item)?;
                        alternatives.push(equal(needle, &item));
                    }
                    any(alternatives)
                }
                other => {
                    return Err(StoreError::UnsupportedPredicate(format!(
                        "`in` expects a list parameter, got {other}"
                    )))
                }
            },
            Expr::Path(segments) => match row_field(segments)? {
                Field::Json(path) => {
                    self.aliases += 1;
                    let alias = format!("e{}", self.aliases);
                    let element = Operand {
                        sql: format!("{alias}.value"),
                        typing: Typing::Json(format!("{alias}.type")),
                    };
                    format!(
                        "json_type(data, '{path}') IS 'array' AND EXISTS (SELECT 1 FROM \
                         json_each(data, '{path}') AS {alias} WHERE {})",
                        equal(needle, &element)
                    )
                }
                Field::Id => {
                    return Err(StoreError::UnsupportedPredicate(
                        "`in` expects a list, got the id column".into(),
                    ))
                }
            },
            other => {
                return Err(StoreError::UnsupportedPredicate(format!(
                    "unsupported `in` collection: {other:?}"
                )))
            }
        };

        if matches == "0" {
            return Ok(matches);
        }
        Ok(match &needle.typing {
            Typing::Known(Kind::Null) => "0".into(),
            Typing::Known(_) => matches,
            Typing::Json(ty) => format!("{ty} <> 'null' AND ({matches})"),
        })
    }

    fn scalar(&mut self, value: &Value) -> Result<Operand> {
        let bound = match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => {
                return Err(StoreError::UnsupportedPredicate(format!(
                    "cannot bind {value} as a scalar"
                )))
            }
        };
        Ok(Operand {
            sql: self.bind(bound),
            typing: Typing::Known(Kind::of(value)),
        })
    }
}

fn flag(value: bool) -> String {
    String::from(if value { "1" } else { "0" })
}

/// `sql`, but only where `guard` holds.
fn guarded(guard: String, sql: String) -> String {
    match guard.as_str() {
        "0" => guard,
        "1" => sql,
        _ => format!("{guard} AND {sql}"),
    }
}

/// SQL that is 1 when both operands are of the same kind.
fn same_kind(l: &Operand, r: &Operand) -> String {
    match (&l.typing, &r.typing) {
        (Typing::Known(a), Typing::Known(b)) => flag(a == b),
        (Typing::Known(kind), other) | (other, Typing::Known(kind)) => other.test(*kind),
        (Typing::Json(_), Typing::Json(_)) => {
            format!("{} = {}", l.typing.name(), r.typing.name())
        }
    }
}

fn equal(l: &Operand, r: &Operand) -> String {
    guarded(same_kind(l, r), format!("({}) IS ({})", l.sql, r.sql))
}

/// Ordering holds between two booleans, two numbers or two strings.
fn ordered(l: &Operand, op: &str, r: &Operand) -> String {
    let guard = match (&l.typing, &r.typing) {
        (Typing::Known(a), Typing::Known(b)) => flag(a == b && a.is_ordered()),
        (Typing::Known(kind), other) | (other, Typing::Known(kind)) => {
            if kind.is_ordered() {
                other.test(*kind)
            } else {
                "0".into()
            }
        }
        (Typing::Json(_), Typing::Json(_)) => {
            let kind = l.typing.name();
            format!(
                "{kind} = {} AND {kind} IN ('bool', 'number', 'text')",
                r.typing.name()
            )
        }
    };
    guarded(guard, format!("({}) {op} ({})", l.sql, r.sql))
}

fn any(alternatives: Vec<String>) -> String {
    if alternatives.is_empty() {
        return "0".into();
    }
    alternatives
        .iter()
        .map(|alt| format!("({alt})"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn param(params: &[Value], n: usize) -> Result<&Value> {
    n.checked_sub(1)
        .and_then(|i| params.get(i))
        .ok_or(StoreError::Script(warden_core::ScriptError::MissingParam(n)))
}

/// The field a `self.…` path refers to.
fn row_field(segments: &[String]) -> Result<Field> {
    let (root, rest) = segments
        .split_first()
        .ok_or_else(|| StoreError::UnsupportedPredicate("empty path".into()))?;
    if root != ROW_BINDING {
        return Err(StoreError::UnsupportedPredicate(format!(
            "only `{ROW_BINDING}` paths can be queried, found `{root}`"
        )));
    }
    field_for(rest)
}

/// The field for a path below the row root.
fn field_for(fields: &[String]) -> Result<Field> {
    match fields {
        [] => Err(StoreError::UnsupportedPredicate(
            "a row cannot be compared as a whole".into(),
        )),
        [only] if only == "id" => Ok(Field::Id),
        _ => {
            let mut path = String::from("$");
            for field in fields {
                if !field
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
                {
                    return Err(StoreError::UnsupportedPredicate(format!(
                        "invalid field name `{field}`"
                    )));
                }
                if field.chars().all(|c| c.is_ascii_digit()) {
                    path.push_str(&format!("[{field}]"));
                } else {
                    path.push('.');
                    path.push_str(field);
                }
            }
            Ok(Field::Json(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_core::{CompiledCondition, EntityId, QueryParam};

    fn condition(query: &str, params: Vec<Value>) -> Predicate {
        CompiledCondition::new(
            "p",
            query,
            params.into_iter().map(QueryParam::Value).collect(),
        )
        .unwrap()
        .into()
    }

    #[test]
    fn test_lower_comparison() {
        let frag = lower_predicate(&condition("self.owner.id == ?1", vec![json!(4)])).unwrap();
        assert_eq!(
            frag.sql,
            "COALESCE(json_type(data, '$.owner.id'), 'null') IN ('integer', 'real') \
             AND (json_extract(data, '$.owner.id')) IS (?1)"
        );
        assert_eq!(frag.params, vec![SqlValue::Integer(4)]);
    }

    #[test]
    fn test_lower_id_set() {
        let frag = lower_predicate(&Predicate::in_set("id", [EntityId(7), EntityId(9)])).unwrap();
        assert_eq!(frag.sql, "entities.id IN (?1, ?2)");
        assert_eq!(frag.params, vec![SqlValue::Integer(7), SqlValue::Integer(9)]);
    }

    #[test]
    fn test_lower_custom_id_field() {
        let frag = lower_predicate(&Predicate::in_set("number", [EntityId(3)])).unwrap();
        assert_eq!(
            frag.sql,
            "json_type(data, '$.number') IS 'integer' AND json_extract(data, '$.number') IN (?1)"
        );
    }

    #[test]
    fn test_lower_composite_keeps_param_order() {
        let pred = Predicate::and(
            Predicate::or(vec![
                condition("self.status == 'open'", vec![]),
                condition("self.total > ?1", vec![json!(100)]),
            ]),
            Predicate::in_set("id", [EntityId(1)]),
        );
        let frag = lower_predicate(&pred).unwrap();

        let first = frag.sql.find("IS (?1)").unwrap();
        let second = frag.sql.find("> (?2)").unwrap();
        let third = frag.sql.find("entities.id IN (?3)").unwrap();
        assert!(first < second && second < third, "{}", frag.sql);
        assert_eq!(
            frag.params,
            vec![
                SqlValue::Text("open".into()),
                SqlValue::Integer(100),
                SqlValue::Integer(1)
            ]
        );
    }

    #[test]
    fn test_known_kinds_fold() {
        let same = lower_predicate(&condition("self.id == ?1", vec![json!(2)])).unwrap();
        assert_eq!(same.sql, "(entities.id) IS (?1)");

        let mismatch = lower_predicate(&condition("self.id == 'two'", vec![])).unwrap();
        assert_eq!(mismatch.sql, "0");

        let unordered = lower_predicate(&condition("self.total < null", vec![])).unwrap();
        assert_eq!(unordered.sql, "0");
    }

    #[test]
    fn test_bare_path_lowers_to_truthiness() {
        let frag = lower_predicate(&condition("self.status", vec![])).unwrap();
        assert!(frag.sql.starts_with("(CASE COALESCE(json_type(data, '$.status'), 'null')"));
        assert!(frag.sql.contains("WHEN 'text' THEN (json_extract(data, '$.status')) <> ''"));

        let negated = lower_predicate(&condition("not self.status", vec![])).unwrap();
        assert_eq!(negated.sql, format!("NOT ({})", frag.sql));
    }

    #[test]
    fn test_lower_in_param_list() {
        let frag =
            lower_predicate(&condition("self.region in ?1", vec![json!(["emea", "apac"])])).unwrap();
        assert!(frag.sql.contains("IS (?1)") && frag.sql.contains("IS (?2)"));
        assert_eq!(
            frag.params,
            vec![SqlValue::Text("emea".into()), SqlValue::Text("apac".into())]
        );

        let empty = lower_predicate(&condition("self.region in ?1", vec![json!([])])).unwrap();
        assert_eq!(empty.sql, "0");
    }

    #[test]
    fn test_nested_collections_get_distinct_aliases() {
        let frag = lower_predicate(&condition(
            "(1 in self.a) in self.b or 2 in self.c",
            vec![],
        ))
        .unwrap();
        assert!(frag.sql.contains("AS e1") && frag.sql.contains("AS e2"));
        assert!(frag.sql.contains("AS e3"));
    }

    #[test]
    fn test_rejects_unsupported_shapes() {
        for query in ["other.x == 1", "-'x' == 1", "self.id in self.id", "self.tags == [1]"] {
            let err = lower_predicate(&condition(query, vec![])).unwrap_err();
            assert!(matches!(err, StoreError::UnsupportedPredicate(_)), "{query}");
        }
    }
}
