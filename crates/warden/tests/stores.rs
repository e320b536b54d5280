//! Both store backends count the same rows for the same predicate.

use proptest::prelude::*;
use serde_json::Value;

use warden::core::{CompiledCondition, EntityId, Predicate, Principal, QueryParam};
use warden::store::{EntityStore, MemoryStore, SqliteStore};
use warden_testkit::fixtures::invoice_type;
use warden_testkit::generators::{condition, invoice_rows};

fn compile(
    name: &str,
    (query, spec): (String, Option<String>),
    principal: &Principal,
) -> CompiledCondition {
    let params = match spec.as_deref() {
        Some("__user__") => vec![QueryParam::Principal(principal.clone())],
        _ => Vec::new(),
    };
    CompiledCondition::new(name, query, params).unwrap()
}

fn counts(rows: &[(EntityId, Value)], predicate: &Predicate) -> (u64, u64) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let memory = MemoryStore::new();
        let sqlite = SqliteStore::open_memory().unwrap();
        for (id, row) in rows {
            memory.insert_entity(&invoice_type(), *id, row.clone()).await.unwrap();
            sqlite.insert_entity(&invoice_type(), *id, row.clone()).await.unwrap();
        }
        (
            memory.count(&invoice_type(), predicate).await.unwrap(),
            sqlite.count(&invoice_type(), predicate).await.unwrap(),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_single_condition_agrees(
        rows in invoice_rows(12),
        cond in condition(),
        owner in 1i64..=4,
    ) {
        let principal = Principal::new(owner, "p");
        let predicate: Predicate = compile("c", cond, &principal).into();

        let (memory, sqlite) = counts(&rows, &predicate);
        prop_assert_eq!(memory, sqlite, "{}", predicate);
    }

    #[test]
    fn prop_composed_predicate_agrees(
        rows in invoice_rows(12),
        first in condition(),
        second in condition(),
        wanted in prop::collection::vec(1i64..=14, 0..5),
    ) {
        let principal = Principal::new(1, "p");
        let mut predicate = Predicate::or(vec![
            compile("a", first, &principal).into(),
            compile("b", second, &principal).into(),
        ]);
        if !wanted.is_empty() {
            predicate = Predicate::and(
                predicate,
                Predicate::in_set("id", wanted.into_iter().map(EntityId)),
            );
        }

        let (memory, sqlite) = counts(&rows, &predicate);
        prop_assert_eq!(memory, sqlite, "{}", predicate);
    }
}
