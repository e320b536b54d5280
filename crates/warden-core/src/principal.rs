//! The authenticated actor a decision is made for.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::EntityId;

/// An authenticated principal.
///
/// Scripted expressions see the principal through its JSON form (see
/// [`Principal::to_value`]); `attributes` are merged into that form so
/// deployments can expose extra fields without changing this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Record identity of the principal.
    pub id: EntityId,

    /// Login code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Names of directly assigned roles.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Code of the principal's group, if any.
    #[serde(default)]
    pub group: Option<String>,

    /// Extra fields exposed to expressions.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Principal {
    /// Create a principal with no roles, group or attributes.
    pub fn new(id: impl Into<EntityId>, code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            id: id.into(),
            name: code.clone(),
            code,
            roles: Vec::new(),
            group: None,
            attributes: Map::new(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a directly assigned role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Set the group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set an attribute visible to expressions.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether the role is directly assigned to this principal.
    pub fn has_direct_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// The JSON view of this principal used as the `__user__` binding.
    ///
    /// Attributes never shadow the built-in fields.
    pub fn to_value(&self) -> Value {
        let mut map = self.attributes.clone();
        map.insert("id".into(), Value::from(self.id.get()));
        map.insert("code".into(), Value::from(self.code.clone()));
        map.insert("name".into(), Value::from(self.name.clone()));
        map.insert(
            "roles".into(),
            Value::Array(self.roles.iter().cloned().map(Value::from).collect()),
        );
        map.insert(
            "group".into(),
            self.group.clone().map(Value::from).unwrap_or(Value::Null),
        );
        Value::Object(map)
    }
}
