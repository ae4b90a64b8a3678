use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::ContextError;

/// Resolved variables produced by a successful
/// [`ContextBuilder::build`](crate::ContextBuilder::build).
///
/// There are no mutators; a `VarContext` can be shared freely between
/// readers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VarContext {
    vars: Map<String, Value>,
}

impl VarContext {
    pub(crate) fn new(vars: Map<String, Value>) -> Self {
        Self { vars }
    }

    /// Copy of every variable. Changing the copy leaves the context intact.
    pub fn to_map(&self) -> Map<String, Value> {
        self.vars.clone()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.vars
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.vars
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn require(&self, key: &str) -> Result<&Value, ContextError> {
        self.vars
            .get(key)
            .ok_or_else(|| ContextError::Missing(key.to_string()))
    }

    fn conversion(key: &str, expected: &'static str, value: &Value) -> ContextError {
        ContextError::Conversion {
            key: key.to_string(),
            expected,
            value: value.clone(),
        }
    }

    /// Strings come back as-is; numbers and booleans in their text form.
    pub fn get_string(&self, key: &str) -> Result<String, ContextError> {
        match self.require(key)? {
            Value::String(s) => Ok(s.clone()),
            v @ (Value::Number(_) | Value::Bool(_)) => Ok(v.to_string()),
            v => Err(Self::conversion(key, "string", v)),
        }
    }

    /// Accepts integral numbers and strings holding one, since rendered
    /// templates are always strings.
    pub fn get_i64(&self, key: &str) -> Result<i64, ContextError> {
        let v = self.require(key)?;
        let parsed = match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| Self::conversion(key, "integer", v))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ContextError> {
        let v = self.require(key)?;
        let parsed = match v {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| Self::conversion(key, "boolean", v))
    }

    /// Strict conversion of one variable into any deserializable type.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContextError> {
        let v = self.require(key)?;
        Ok(serde_json::from_value(v.clone())?)
    }

    /// Fills `T` from the variables by field name (or serde rename). Unknown
    /// variables are ignored; fields with no variable need `#[serde(default)]`.
    pub fn to_struct<T: DeserializeOwned>(&self) -> Result<T, ContextError> {
        Ok(serde_json::from_value(Value::Object(self.vars.clone()))?)
    }

    pub fn to_json(&self) -> Result<String, ContextError> {
        Ok(serde_json::to_string(&self.vars)?)
    }
}

impl<'a> IntoIterator for &'a VarContext {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    fn ctx(v: Value) -> VarContext {
        VarContext::new(v.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn to_map_is_a_defensive_copy() {
        let c = ctx(json!({"a": 1}));
        let mut m = c.to_map();
        m.insert("a".into(), json!(2));
        m.insert("b".into(), json!(3));
        assert_eq!(c.get("a"), Some(&json!(1)));
        assert!(!c.contains_key("b"));
    }

    #[test]
    fn lenient_getters_convert_rendered_strings() {
        let c = ctx(json!({"n": "42", "b": "true", "f": 1.5, "o": {}}));
        assert_eq!(c.get_i64("n").unwrap(), 42);
        assert!(c.get_bool("b").unwrap());
        assert_eq!(c.get_string("f").unwrap(), "1.5");
        assert!(matches!(c.get_i64("f"), Err(ContextError::Conversion { expected: "integer", .. })));
        assert!(matches!(c.get_string("o"), Err(ContextError::Conversion { .. })));
        assert!(matches!(c.get_bool("zzz"), Err(ContextError::Missing(k)) if k == "zzz"));
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Plan {
        #[serde(rename = "plan_id")]
        id: String,
        instances: u32,
        tier: Option<String>,
    }

    #[test]
    fn to_struct_ignores_unknown_and_defaults_missing() {
        let c = ctx(json!({"plan_id": "p1", "instances": 3, "extra": true}));
        let plan: Plan = c.to_struct().unwrap();
        assert_eq!(plan, Plan { id: "p1".into(), instances: 3, tier: None });
    }

    #[test]
    fn to_struct_fails_on_unconvertible_value() {
        let c = ctx(json!({"instances": "three"}));
        assert!(matches!(c.to_struct::<Plan>(), Err(ContextError::Decode(_))));
    }

    #[test]
    fn serializes_as_plain_object() {
        let c = ctx(json!({"b": 2, "a": "x"}));
        assert_eq!(c.to_json().unwrap(), r#"{"a":"x","b":2}"#);
        assert_eq!(serde_json::to_value(&c).unwrap(), json!({"a": "x", "b": 2}));
    }
}
