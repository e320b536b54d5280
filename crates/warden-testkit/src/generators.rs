//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Value};

use warden_core::{AccessKind, EntityId, Permission};

/// Generate an AccessKind.
pub fn access_kind() -> impl Strategy<Value = AccessKind> {
    prop::sample::select(AccessKind::ALL.to_vec())
}

/// Generate an object pattern in the `com.acme` package.
pub fn object() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("com.acme.Invoice".to_string()),
        Just("com.acme.Order".to_string()),
        Just("com.acme.*".to_string()),
        Just("com.other.*".to_string()),
    ]
}

/// Generate a row condition over [`invoice_row`]s, with its parameter spec.
pub fn condition() -> impl Strategy<Value = (String, Option<String>)> {
    prop_oneof![comparison(), truthiness()]
}

fn comparison() -> impl Strategy<Value = (String, Option<String>)> {
    prop_oneof![
        (1i64..=4).prop_map(|owner| (format!("self.owner == {owner}"), None)),
        Just(("self.owner == ?1".to_string(), Some("__user__".to_string()))),
        Just(("self.status == 'open'".to_string(), None)),
        Just(("self.status != 'paid' and self.total >= 50".to_string(), None)),
        Just(("self.status in ['open', 'draft']".to_string(), None)),
        Just(("not (self.total < 10)".to_string(), None)),
        Just(("self.note == null".to_string(), None)),
        (0i64..=200).prop_map(|limit| (format!("self.total > {limit} or self.owner == 1"), None)),
    ]
}

/// Conditions over bare fields and mixed kinds, where equality is kind-strict.
fn truthiness() -> impl Strategy<Value = (String, Option<String>)> {
    prop_oneof![
        Just(("self.note".to_string(), None)),
        Just(("not self.paid".to_string(), None)),
        Just(("self.paid == 1".to_string(), None)),
        Just(("self.paid == true or self.note".to_string(), None)),
        Just(("self.paid in [true, 1]".to_string(), None)),
        Just(("self.tags and not self.status".to_string(), None)),
        Just(("1 in self.tags".to_string(), None)),
        Just(("self.paid != null and self.paid != false".to_string(), None)),
    ]
}

/// Parameters for generating a permission.
#[derive(Debug, Clone)]
pub struct PermissionParams {
    pub name: String,
    pub object: String,
    pub flags: [bool; 6],
    pub condition: Option<(String, Option<String>)>,
}

impl Arbitrary for PermissionParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            "[a-z]{1,8}",
            object(),
            any::<[bool; 6]>(),
            prop::option::of(condition()),
        )
            .prop_map(|(name, object, flags, condition)| PermissionParams {
                name,
                object,
                flags,
                condition,
            })
            .boxed()
    }
}

/// Build a permission from parameters.
pub fn permission_from_params(params: &PermissionParams) -> Permission {
    let mut perm = Permission::new(params.name.clone(), params.object.clone());
    for (kind, flag) in AccessKind::ALL.into_iter().zip(params.flags) {
        perm.set(kind, flag);
    }
    if let Some((condition, spec)) = &params.condition {
        perm = perm.with_condition(condition.clone(), spec.as_deref());
    }
    perm
}

/// Generate an invoice row.
///
/// `note` is sometimes absent, sometimes null. `paid` and `tags` mix JSON
/// kinds: `paid` may be a boolean, a number or a string.
pub fn invoice_row() -> impl Strategy<Value = Value> {
    (
        1i64..=4,
        prop_oneof![Just(""), Just("open"), Just("paid"), Just("draft")],
        0i64..=200,
        prop_oneof![
            Just(None),
            Just(Some(Value::Null)),
            Just(Some(json!(""))),
            Just(Some(json!("late")))
        ],
        prop_oneof![
            Just(json!(true)),
            Just(json!(false)),
            Just(json!(1)),
            Just(json!(0)),
            Just(json!("yes")),
            Just(Value::Null)
        ],
        prop::collection::vec(
            prop_oneof![Just(json!(1)), Just(json!(true)), Just(json!("1")), Just(json!(1.5))],
            0..3,
        ),
    )
        .prop_map(|(owner, status, total, note, paid, tags)| {
            let mut row = json!({
                "owner": owner,
                "status": status,
                "total": total,
                "paid": paid,
                "tags": tags,
            });
            if let (Some(note), Value::Object(fields)) = (note, &mut row) {
                fields.insert("note".into(), note);
            }
            row
        })
}

/// Generate a set of rows keyed by distinct ids starting at 1.
pub fn invoice_rows(max: usize) -> impl Strategy<Value = Vec<(EntityId, Value)>> {
    prop::collection::vec(invoice_row(), 0..=max).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, row)| (EntityId(i as i64 + 1), row))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_permission_flags_roundtrip(params: PermissionParams) {
            let perm = permission_from_params(&params);
            for (kind, flag) in AccessKind::ALL.into_iter().zip(params.flags) {
                prop_assert_eq!(perm.grants(kind), flag);
            }
            prop_assert_eq!(perm.is_conditional(), params.condition.is_some());
            prop_assert_eq!(perm.is_wildcard(), params.object.ends_with(".*"));
        }

        #[test]
        fn test_generated_conditions_parse((condition, _spec) in condition()) {
            prop_assert!(warden_core::parse_expression(&condition).is_ok());
        }

        #[test]
        fn test_rows_have_distinct_ids(rows in invoice_rows(10)) {
            let mut seen = std::collections::HashSet::new();
            for (id, _) in &rows {
                prop_assert!(seen.insert(*id));
            }
        }
    }
}
