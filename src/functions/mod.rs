use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use crate::errors::{EvalError, Result};

/// Trait for pluggable functions used by the expression evaluator.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> std::ops::RangeInclusive<usize>;
    fn call(&self, args: &[Value]) -> Result<Value>;
}

/// Thread-safe function registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, Arc<dyn Function>>>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    pub fn with_builtins() -> Self {
        let mut map: HashMap<&'static str, Arc<dyn Function>> = HashMap::new();
        map.insert("assert", Arc::new(builtins::Assert));
        map.insert("lower", Arc::new(builtins::Lower));
        map.insert("upper", Arc::new(builtins::Upper));
        map.insert("len", Arc::new(builtins::Len));
        map.insert("str.truncate", Arc::new(builtins::Truncate));
        map.insert("regexp.matches", Arc::new(builtins::RegexpMatches));
        map.insert("json.marshal", Arc::new(builtins::JsonMarshal));
        map.insert("map.flatten", Arc::new(builtins::MapFlatten));
        Self { inner: Arc::new(map) }
    }

    pub fn register<F: Function + 'static>(&mut self, f: F) {
        let mut_map = Arc::make_mut(&mut self.inner);
        mut_map.insert(f.name(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.inner.get(name).cloned()
    }

    /// Looks up `name`, checks the argument count and invokes it.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let f = self
            .get(name)
            .ok_or_else(|| EvalError::runtime(format!("unknown function called: {name}")))?;
        let arity = f.arity();
        if !arity.contains(&args.len()) {
            let expected = if arity.start() == arity.end() {
                arity.start().to_string()
            } else {
                format!("{} to {}", arity.start(), arity.end())
            };
            return Err(EvalError::function(
                name,
                format!("expected {expected} argument(s), got {}", args.len()),
            ));
        }
        f.call(args)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.inner.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("functions", &names).finish()
    }
}

pub mod builtins {
    use super::*;
    use crate::template::render_value;
    use itertools::Itertools;
    use serde_json::Value;

    fn truthy(name: &str, v: &Value) -> Result<bool> {
        match v {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => s
                .parse::<bool>()
                .map_err(|_| EvalError::function(name, format!("expected a boolean, got {v}"))),
            other => Err(EvalError::function(name, format!("expected a boolean, got {other}"))),
        }
    }

    fn arg<'v>(name: &str, args: &'v [Value], idx: usize) -> Result<&'v Value> {
        args.get(idx)
            .ok_or_else(|| EvalError::function(name, format!("missing argument {}", idx + 1)))
    }

    fn string_arg<'v>(name: &str, args: &'v [Value], idx: usize) -> Result<&'v str> {
        match arg(name, args, idx)? {
            Value::String(s) => Ok(s),
            other => Err(EvalError::function(
                name,
                format!("argument {} must be a string, got {other}", idx + 1),
            )),
        }
    }

    pub struct Assert;
    impl Function for Assert {
        fn name(&self) -> &'static str { "assert" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 2..=2 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            if truthy(self.name(), arg(self.name(), args, 0)?)? {
                return Ok(Value::Bool(true));
            }
            let message = args.get(1).map(render_value).unwrap_or_default();
            Err(EvalError::function(
                self.name(),
                format!("Assertion failed: {message}"),
            ))
        }
    }

    pub struct Lower;
    impl Function for Lower {
        fn name(&self) -> &'static str { "lower" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let s = args.first().cloned().unwrap_or(Value::Null);
            Ok(match s {
                Value::String(t) => Value::String(t.to_lowercase()),
                other => other,
            })
        }
    }

    pub struct Upper;
    impl Function for Upper {
        fn name(&self) -> &'static str { "upper" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let s = args.first().cloned().unwrap_or(Value::Null);
            Ok(match s {
                Value::String(t) => Value::String(t.to_uppercase()),
                other => other,
            })
        }
    }

    pub struct Len;
    impl Function for Len {
        fn name(&self) -> &'static str { "len" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let n = match arg(self.name(), args, 0)? {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => {
                    return Err(EvalError::function(
                        self.name(),
                        format!("value has no length: {other}"),
                    ))
                }
            };
            Ok(Value::from(n))
        }
    }

    /// `str.truncate(limit, text)` keeps at most `limit` characters.
    pub struct Truncate;
    impl Function for Truncate {
        fn name(&self) -> &'static str { "str.truncate" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 2..=2 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let raw = arg(self.name(), args, 0)?;
            let limit = match raw {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            }
            .ok_or_else(|| {
                EvalError::function(
                    self.name(),
                    format!("limit must be a non-negative integer, got {raw}"),
                )
            })?;
            let text = string_arg(self.name(), args, 1)?;
            Ok(Value::String(text.chars().take(limit as usize).collect()))
        }
    }

    /// `regexp.matches(pattern, text)`
    pub struct RegexpMatches;
    impl Function for RegexpMatches {
        fn name(&self) -> &'static str { "regexp.matches" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 2..=2 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let pattern = string_arg(self.name(), args, 0)?;
            let text = string_arg(self.name(), args, 1)?;
            let re = regex::Regex::new(pattern)
                .map_err(|e| EvalError::function(self.name(), e.to_string()))?;
            Ok(Value::Bool(re.is_match(text)))
        }
    }

    pub struct JsonMarshal;
    impl Function for JsonMarshal {
        fn name(&self) -> &'static str { "json.marshal" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            serde_json::to_string(arg(self.name(), args, 0)?)
                .map(Value::String)
                .map_err(|e| EvalError::function(self.name(), e.to_string()))
        }
    }

    /// `map.flatten(kv_sep, tuple_sep, object)` renders `k=v;k2=v2` in key order.
    pub struct MapFlatten;
    impl Function for MapFlatten {
        fn name(&self) -> &'static str { "map.flatten" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 3..=3 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let kv_sep = string_arg(self.name(), args, 0)?;
            let tuple_sep = string_arg(self.name(), args, 1)?;
            let map = match arg(self.name(), args, 2)? {
                Value::Object(map) => map,
                other => {
                    return Err(EvalError::function(
                        self.name(),
                        format!("argument 3 must be an object, got {other}"),
                    ))
                }
            };
            let flat = map
                .iter()
                .sorted_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(k, v)| format!("{k}{kv_sep}{}", render_value(v)))
                .join(tuple_sep);
            Ok(Value::String(flat))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn assert_failure_carries_message() {
        let reg = Registry::with_builtins();
        let err = reg.call("assert", &[json!(false), json!("failure!")]).unwrap_err();
        assert_eq!(err.to_string(), "assert: Assertion failed: failure!");
        assert_eq!(reg.call("assert", &[json!("true"), json!("x")]).unwrap(), json!(true));
    }

    #[test]
    fn arity_is_checked_before_the_call() {
        let reg = Registry::with_builtins();
        let err = reg.call("lower", &[]).unwrap_err();
        assert_eq!(err.to_string(), "lower: expected 1 argument(s), got 0");
    }

    #[test]
    fn unknown_function_is_a_runtime_error() {
        let err = Registry::with_builtins().call("nope", &[]).unwrap_err();
        assert_eq!(err, EvalError::Runtime("unknown function called: nope".into()));
    }

    #[test]
    fn string_helpers() {
        let reg = Registry::with_builtins();
        assert_eq!(reg.call("str.truncate", &[json!(3), json!("abcdef")]).unwrap(), json!("abc"));
        assert_eq!(reg.call("len", &[json!("héllo")]).unwrap(), json!(5));
        assert_eq!(
            reg.call("regexp.matches", &[json!("^[a-z]+$"), json!("abc")]).unwrap(),
            json!(true)
        );
        assert_eq!(
            reg.call("map.flatten", &[json!("="), json!(";"), json!({"b": 2, "a": "x"})]).unwrap(),
            json!("a=x;b=2")
        );
        assert_eq!(reg.call("json.marshal", &[json!({"a": [1]})]).unwrap(), json!(r#"{"a":[1]}"#));
    }

    #[test]
    fn direct_calls_without_arguments_fail_cleanly() {
        use builtins::*;
        let fns: [&dyn Function; 8] = [
            &Assert, &Lower, &Upper, &Len, &Truncate, &RegexpMatches, &JsonMarshal, &MapFlatten,
        ];
        for f in fns {
            match f.call(&[]) {
                Ok(v) => assert!(v.is_null(), "{} returned {v}", f.name()),
                Err(e) => assert!(
                    e.to_string().starts_with(f.name()),
                    "{} failed with {e}",
                    f.name()
                ),
            }
        }
        let err = Assert.call(&[json!(false)]).unwrap_err();
        assert_eq!(err.to_string(), "assert: Assertion failed: ");
    }

    struct Double;
    impl Function for Double {
        fn name(&self) -> &'static str { "double" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(json!(args[0].as_i64().unwrap_or_default() * 2))
        }
    }

    #[test]
    fn registered_functions_do_not_leak_into_clones_taken_earlier() {
        let base = Registry::with_builtins();
        let mut extended = base.clone();
        extended.register(Double);
        assert_eq!(extended.call("double", &[json!(21)]).unwrap(), json!(42));
        assert!(base.get("double").is_none());
    }
}
