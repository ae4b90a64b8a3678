use serde::Deserialize;

use crate::functions::Registry;

/// Knobs for [`TemplateEvaluator`](crate::TemplateEvaluator).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Deepest nesting of parentheses, unary operators and conditionals a
    /// single expression may use.
    pub max_depth: usize,
    /// Functions callable from expressions.
    #[serde(skip, default = "Registry::with_builtins")]
    pub registry: Registry,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            registry: Registry::with_builtins(),
        }
    }
}

impl EvalOptions {
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let opts: EvalOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.max_depth, 64);
        assert!(opts.registry.get("assert").is_some());

        let opts: EvalOptions = serde_json::from_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(opts.max_depth, 8);
    }
}
