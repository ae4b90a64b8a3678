//! Builds a flat set of named variables from maps, structs, JSON payloads and
//! defaults, resolving the ones whose values are `${...}` templates.
//!
//! ```
//! use serde_json::json;
//! use varcontext::{builder, DefaultVariable};
//!
//! let ctx = builder()
//!     .merge_map([("region", json!("eu"))])
//!     .merge_defaults([DefaultVariable::new("bucket", "data-${region}")])
//!     .build()
//!     .unwrap();
//! assert_eq!(ctx.get_string("bucket").unwrap(), "data-eu");
//! ```

pub mod builder;
pub mod context;
pub mod errors;
pub mod evaluator;
pub mod functions;  // plugin model
pub mod options;
pub mod scope;
mod template;
mod comparison;
mod expression;
mod parser;

use serde_json::{Map, Value};

pub use builder::{builder, ContextBuilder, DefaultVariable, Entry};
pub use context::VarContext;
pub use errors::{BuildError, ContextError, EvalError, Result, VarError};
pub use evaluator::{Evaluator, TemplateEvaluator};
pub use functions::{Function, Registry};
pub use options::EvalOptions;
pub use scope::Scope;

/// Convenience: render one template against `variables` with the builtin
/// functions and no constants.
pub fn render(template: &str, variables: &Map<String, Value>) -> Result<Value> {
    let constants = Map::new();
    TemplateEvaluator::default().evaluate(template, &Scope::new(&constants, variables))
}
