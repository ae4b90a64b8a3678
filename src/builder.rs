use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::VarContext;
use crate::errors::{BuildError, VarError};
use crate::evaluator::{Evaluator, TemplateEvaluator};
use crate::scope::Scope;

/// A variable to pre-populate unless the caller already supplied it.
///
/// A null `default` means there is no default and the variable is skipped.
/// String defaults are templates and are evaluated at build time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultVariable {
    pub name: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub overwrite: bool,
}

impl DefaultVariable {
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            overwrite: false,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// How an accumulated variable gets its final value.
#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Literal(Value),
    Expression(String),
}

/// Accumulates variables and resolves the templated ones on [`build`].
///
/// Every merge takes the builder by value and hands it back, so calls chain
/// left to right and later calls win. Merges never fail on the spot: bad
/// input is recorded and reported by `build`.
///
/// `build` consumes the builder, so an instance cannot be built twice.
/// Clone it first to build the same state more than once.
///
/// [`build`]: ContextBuilder::build
#[derive(Clone)]
pub struct ContextBuilder {
    // Latest entry per name, in first-merge order.
    entries: IndexMap<String, Entry>,
    // Every merge in call order, superseded entries included.
    history: Vec<(String, Entry)>,
    constants: Map<String, Value>,
    errors: Vec<VarError>,
    evaluator: Arc<dyn Evaluator>,
}

/// Shorthand for [`ContextBuilder::new`].
pub fn builder() -> ContextBuilder {
    ContextBuilder::new()
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("entries", &self.entries)
            .field("history", &self.history.len())
            .field("constants", &self.constants)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            history: Vec::new(),
            constants: Map::new(),
            errors: Vec::new(),
            evaluator: Arc::new(TemplateEvaluator::default()),
        }
    }

    pub fn with_evaluator<E: Evaluator + 'static>(mut self, evaluator: E) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    fn insert(&mut self, name: String, entry: Entry) {
        self.history.push((name.clone(), entry.clone()));
        self.entries.insert(name, entry);
    }

    fn defer(&mut self, err: VarError) {
        tracing::debug!(error = %err, "deferring merge error until build");
        self.errors.push(err);
    }

    /// Merges every pair as a literal, replacing same-named variables.
    pub fn merge_map<I, K>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (name, value) in values {
            self.insert(name.into(), Entry::Literal(value));
        }
        self
    }

    pub fn merge_defaults<I>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = DefaultVariable>,
    {
        for var in defaults {
            if var.default.is_null() {
                continue;
            }
            if !var.overwrite && self.entries.contains_key(&var.name) {
                continue;
            }
            let entry = match var.default {
                Value::String(template) => Entry::Expression(template),
                other => Entry::Literal(other),
            };
            self.insert(var.name, entry);
        }
        self
    }

    /// Registers `name` to be computed from `expression` at build time.
    pub fn merge_eval_result(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.insert(name.into(), Entry::Expression(expression.into()));
        self
    }

    /// Merges the top-level keys of a JSON object as literals. Blank input
    /// merges nothing.
    pub fn merge_json_object(mut self, raw: impl AsRef<[u8]>) -> Self {
        let raw = raw.as_ref();
        if raw.iter().all(u8::is_ascii_whitespace) {
            return self;
        }
        match serde_json::from_slice::<Map<String, Value>>(raw) {
            Ok(values) => self.merge_map(values),
            Err(err) => {
                self.defer(VarError::Decode(describe_decode_error(raw, &err)));
                self
            }
        }
    }

    /// Merges the serialized fields of `value` as literals. Field names
    /// honour `#[serde(rename = "...")]`.
    pub fn merge_struct<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(Value::Object(fields)) => self.merge_map(fields),
            Ok(other) => {
                self.defer(VarError::Struct(format!(
                    "expected a struct-like value, got {}",
                    kind(&other)
                )));
                self
            }
            Err(err) => {
                self.defer(VarError::Struct(err.to_string()));
                self
            }
        }
    }

    /// Replaces the constants visible to expressions. Constants shadow
    /// variables during evaluation but are not part of the output.
    pub fn set_eval_constants<I, K>(mut self, constants: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.constants = constants.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    /// Replays the merges in call order and returns the resolved variables,
    /// or every failure seen along the way.
    ///
    /// Each expression sees the value every name held at the point it was
    /// merged, including its own name, plus the final literals of names not
    /// merged yet. Constants shadow all of them.
    ///
    /// The builder is consumed; clone it to build the same state twice.
    ///
    /// ```
    /// use serde_json::json;
    /// let b = varcontext::builder().merge_map([("a", json!(1))]);
    /// assert_eq!(b.clone().build().unwrap(), b.build().unwrap());
    /// ```
    ///
    /// ```compile_fail
    /// let b = varcontext::builder();
    /// let first = b.build();
    /// let second = b.build();
    /// ```
    #[tracing::instrument(
        level = "debug",
        skip(self),
        fields(entries = self.entries.len(), constants = self.constants.len())
    )]
    pub fn build(self) -> Result<VarContext, BuildError> {
        let ContextBuilder {
            entries,
            history,
            constants,
            mut errors,
            evaluator,
        } = self;

        let mut resolved: Map<String, Value> = entries
            .into_iter()
            .filter_map(|(name, entry)| match entry {
                Entry::Literal(value) => Some((name, value)),
                Entry::Expression(_) => None,
            })
            .collect();

        for (name, entry) in history {
            let template = match entry {
                Entry::Literal(value) => {
                    resolved.insert(name, value);
                    continue;
                }
                Entry::Expression(template) => template,
            };
            tracing::trace!(%name, %template, "evaluating variable");
            let outcome = evaluator.evaluate(&template, &Scope::new(&constants, &resolved));
            match outcome {
                Ok(value) => {
                    resolved.insert(name, value);
                }
                Err(source) => {
                    tracing::debug!(%name, error = %source, "couldn't compute variable");
                    resolved.remove(&name);
                    errors.push(VarError::Compute {
                        name,
                        template,
                        source,
                    });
                }
            }
        }

        if !errors.is_empty() {
            return Err(BuildError::new(errors));
        }
        Ok(VarContext::new(resolved))
    }

    /// Like [`build`](ContextBuilder::build) but returns the plain map.
    pub fn build_map(self) -> Result<Map<String, Value>, BuildError> {
        self.build().map(VarContext::into_map)
    }
}

/// Prefixes syntax errors with the character the decoder stopped at.
fn describe_decode_error(raw: &[u8], err: &serde_json::Error) -> String {
    if err.classify() != serde_json::error::Category::Syntax {
        return err.to_string();
    }
    let text = String::from_utf8_lossy(raw);
    let offending = text
        .lines()
        .nth(err.line().saturating_sub(1))
        .and_then(|line| line.chars().nth(err.column().saturating_sub(1)));
    match offending {
        Some(c) => format!("invalid character '{c}': {err}"),
        None => err.to_string(),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
