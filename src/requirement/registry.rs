//! Requirement Registry
//!
//! Tagged constructors keyed by type name. Assembled once at startup and
//! shared read-only afterwards.

use crate::error::GatewayError;
use crate::requirement::{Contains, Pattern, Requirement, RequirementRef, Written};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const TYPE_FIELD: &str = "type";

/// Build a requirement from its fields (the `type` tag already removed).
pub type RequirementFactory = fn(Value) -> Result<RequirementRef, GatewayError>;

/// A requirement variant that can be registered by type.
pub trait RequirementKind: Requirement + DeserializeOwned + 'static {
    const TYPE_KEY: &'static str;

    /// Field checks serde cannot express.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

fn build<T: RequirementKind>(fields: Value) -> Result<RequirementRef, GatewayError> {
    let requirement: T = serde_json::from_value(fields)
        .map_err(|e| GatewayError::malformed(T::TYPE_KEY, e.to_string()))?;
    requirement
        .validate()
        .map_err(|reason| GatewayError::malformed(T::TYPE_KEY, reason))?;
    Ok(Arc::new(requirement))
}

/// Requirement registry
#[derive(Clone, Default)]
pub struct RequirementRegistry {
    factories: BTreeMap<String, RequirementFactory>,
}

impl RequirementRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `Contains`, `Written` and `Regex`.
    pub fn with_builtins() -> Self {
        let mut factories: BTreeMap<String, RequirementFactory> = BTreeMap::new();
        factories.insert(Contains::TYPE_KEY.to_string(), build::<Contains>);
        factories.insert(Written::TYPE_KEY.to_string(), build::<Written>);
        factories.insert(Pattern::TYPE_KEY.to_string(), build::<Pattern>);
        Self { factories }
    }

    pub fn register(
        &mut self,
        type_key: impl Into<String>,
        factory: RequirementFactory,
    ) -> Result<(), GatewayError> {
        let type_key = type_key.into();
        if self.factories.contains_key(&type_key) {
            return Err(GatewayError::DuplicateTypeKey(type_key));
        }
        debug!(type_key = %type_key, "Registered requirement type");
        self.factories.insert(type_key, factory);
        Ok(())
    }

    pub fn register_kind<T: RequirementKind>(&mut self) -> Result<(), GatewayError> {
        self.register(T::TYPE_KEY, build::<T>)
    }

    pub fn is_registered(&self, type_key: &str) -> bool {
        self.factories.contains_key(type_key)
    }

    pub fn type_keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Canonical form: `{"type": <type_key>, ...fields}`.
    pub fn serialize(&self, requirement: &dyn Requirement) -> Result<Value, GatewayError> {
        let type_key = requirement.type_key();
        if !self.is_registered(type_key) {
            return Err(GatewayError::UnknownRequirementType(type_key.to_string()));
        }
        let mut fields = requirement.to_fields()?;
        fields.insert(TYPE_FIELD.to_string(), Value::String(type_key.to_string()));
        Ok(Value::Object(fields))
    }

    pub fn serialize_all(&self, requirements: &[RequirementRef]) -> Result<Vec<Value>, GatewayError> {
        requirements
            .iter()
            .map(|r| self.serialize(r.as_ref()))
            .collect()
    }

    pub fn deserialize(&self, doc: &Value) -> Result<RequirementRef, GatewayError> {
        let Value::Object(object) = doc else {
            return Err(GatewayError::malformed(
                "requirement",
                "a requirement must be a JSON object",
            ));
        };
        let type_key = match object.get(TYPE_FIELD) {
            Some(Value::String(key)) => key.as_str(),
            Some(_) => {
                return Err(GatewayError::malformed(
                    "requirement",
                    "field 'type' must be a string",
                ))
            }
            None => {
                return Err(GatewayError::malformed(
                    "requirement",
                    "missing field 'type'",
                ))
            }
        };
        let factory = self
            .factories
            .get(type_key)
            .ok_or_else(|| GatewayError::UnknownRequirementType(type_key.to_string()))?;

        let mut fields = object.clone();
        fields.remove(TYPE_FIELD);
        factory(Value::Object(fields))
    }

    /// Deserialize in declared order; the first failure aborts.
    pub fn deserialize_all(&self, docs: &[Value]) -> Result<Vec<RequirementRef>, GatewayError> {
        docs.iter().map(|doc| self.deserialize(doc)).collect()
    }
}
