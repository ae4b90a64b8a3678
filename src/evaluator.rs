use serde_json::Value;

use crate::errors::Result;
use crate::options::EvalOptions;
use crate::scope::Scope;
use crate::template::Template;

/// Resolves one expression against a scope.
///
/// Implementations must be deterministic for identical inputs; their error
/// text is embedded verbatim in the builder's aggregated error.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expression: &str, scope: &Scope<'_>) -> Result<Value>;
}

impl<F> Evaluator for F
where
    F: Fn(&str, &Scope<'_>) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, expression: &str, scope: &Scope<'_>) -> Result<Value> {
        self(expression, scope)
    }
}

/// The default evaluator: renders `${...}` templates to a string.
#[derive(Clone, Debug, Default)]
pub struct TemplateEvaluator {
    options: EvalOptions,
}

impl TemplateEvaluator {
    pub fn new(options: EvalOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }
}

impl Evaluator for TemplateEvaluator {
    fn evaluate(&self, expression: &str, scope: &Scope<'_>) -> Result<Value> {
        let template = Template::parse(expression, self.options.max_depth)?;
        template
            .render(scope, &self.options.registry)
            .map(Value::String)
    }
}
