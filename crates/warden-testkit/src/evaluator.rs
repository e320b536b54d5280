//! Instrumented evaluators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;

use warden_core::{Bindings, Evaluator, ExprEvaluator, Result};

/// Delegates to [`ExprEvaluator`] and counts every call.
///
/// Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct CountingEvaluator {
    calls: Arc<AtomicUsize>,
}

impl CountingEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of expressions evaluated so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Evaluator for CountingEvaluator {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ExprEvaluator.evaluate(expression, bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counts_and_delegates() {
        let evaluator = CountingEvaluator::new();
        let shared = evaluator.clone();

        let mut bindings = Bindings::new();
        bindings.insert("__user__".into(), json!({ "id": 4 }));

        assert_eq!(evaluator.evaluate("__user__.id", &bindings).unwrap(), json!(4));
        assert!(evaluator.evaluate("__user__ ==", &bindings).is_err());
        assert_eq!(shared.calls(), 2);
    }
}
