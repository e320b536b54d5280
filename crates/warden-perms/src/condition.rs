//! Compilation of permission conditions into row predicates.
//!
//! A condition such as `self.owner == ?1 and self.region in ?2` comes with a
//! parameter spec such as `__user__, __user__.regions`. Each spec token
//! becomes one positional parameter: `__user__` binds the principal itself,
//! anything else is evaluated with the principal bound as `__user__`.

use std::sync::Arc;

use warden_core::{
    Bindings, CompiledCondition, Evaluator, ExprEvaluator, Permission, Principal, QueryParam,
    USER_BINDING,
};

use crate::error::Result;

/// Turns conditions into [`CompiledCondition`]s for one principal.
#[derive(Clone)]
pub struct ConditionCompiler {
    evaluator: Arc<dyn Evaluator>,
}

impl ConditionCompiler {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self { evaluator }
    }

    /// Bind `condition` to the parameters described by `param_spec`.
    pub fn compile(
        &self,
        permission: &str,
        principal: &Principal,
        condition: &str,
        param_spec: Option<&str>,
    ) -> Result<CompiledCondition> {
        let params = self.resolve_params(principal, param_spec.unwrap_or(""))?;
        Ok(CompiledCondition::new(permission, condition.trim(), params)?)
    }

    /// Compile a permission's condition, or `None` if it has none.
    pub fn compile_permission(
        &self,
        principal: &Principal,
        permission: &Permission,
    ) -> Result<Option<CompiledCondition>> {
        let Some(condition) = permission.condition() else {
            return Ok(None);
        };
        self.compile(
            &permission.name,
            principal,
            condition,
            permission.condition_params.as_deref(),
        )
        .map(Some)
    }

    fn resolve_params(&self, principal: &Principal, spec: &str) -> Result<Vec<QueryParam>> {
        let tokens: Vec<&str> = spec
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut bindings = Bindings::new();
        bindings.insert(USER_BINDING.into(), principal.to_value());

        let mut params = Vec::with_capacity(tokens.len());
        for token in tokens {
            if token == USER_BINDING {
                params.push(QueryParam::Principal(principal.clone()));
            } else {
                let value = self.evaluator.evaluate(token, &bindings)?;
                params.push(QueryParam::Value(value));
            }
        }
        Ok(params)
    }
}

impl Default for ConditionCompiler {
    fn default() -> Self {
        Self::new(Arc::new(ExprEvaluator))
    }
}
