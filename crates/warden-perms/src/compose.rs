//! Composition of compiled conditions and identity restrictions.

use warden_core::{CompiledCondition, EntityId, Predicate};

/// Build the row predicate for a decision.
///
/// Fragments are OR-ed together in order; a non-empty `ids` adds
/// `id_field IN ids`; with both present the two are AND-ed. Returns `None`
/// when there is nothing to restrict.
pub fn compose(
    fragments: Vec<CompiledCondition>,
    ids: &[EntityId],
    id_field: &str,
) -> Option<Predicate> {
    let conditions = if fragments.is_empty() {
        None
    } else {
        Some(Predicate::or(
            fragments.into_iter().map(Predicate::Condition).collect(),
        ))
    };
    let identities = if ids.is_empty() {
        None
    } else {
        Some(Predicate::in_set(id_field, ids.iter().copied()))
    };

    match (conditions, identities) {
        (Some(c), Some(i)) => Some(Predicate::and(c, i)),
        (Some(c), None) => Some(c),
        (None, Some(i)) => Some(i),
        (None, None) => None,
    }
}
