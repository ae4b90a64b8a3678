use itertools::Itertools;
use thiserror::Error; // Import the `Error` derive macro from the `thiserror` crate

// Errors raised while parsing or evaluating a single expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    // The template or expression text is not well formed
    #[error("parse error: {0}")]
    Parse(String),

    // The expression parsed but could not be evaluated against the scope
    #[error("{0}")]
    Runtime(String),

    // A registered function rejected its arguments or failed
    #[error("{name}: {message}")]
    Function { name: String, message: String },
}

impl EvalError {
    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        EvalError::Runtime(msg.into())
    }

    pub(crate) fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Function {
            name: name.into(),
            message: message.into(),
        }
    }
}

// Type alias for results that use `EvalError` as the error type
pub type Result<T> = std::result::Result<T, EvalError>;

/// One failure recorded by a [`ContextBuilder`](crate::ContextBuilder).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VarError {
    #[error("couldn't decode JSON object: {0}")]
    Decode(String),

    #[error("couldn't merge struct: {0}")]
    Struct(String),

    #[error("couldn't compute the value for {name:?}, template: {template:?}, {source}")]
    Compute {
        name: String,
        template: String,
        source: EvalError,
    },
}

/// Every failure collected during a single `build`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} error(s) occurred: {}", .errors.len(), .errors.iter().join("; "))]
pub struct BuildError {
    errors: Vec<VarError>,
}

impl BuildError {
    pub(crate) fn new(errors: Vec<VarError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[VarError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<VarError> {
        self.errors
    }
}

/// Errors from reading a built [`VarContext`](crate::VarContext).
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("missing variable {0:?}")]
    Missing(String),

    #[error("variable {key:?} is not a valid {expected}: {value}")]
    Conversion {
        key: String,
        expected: &'static str,
        value: serde_json::Value,
    },

    #[error("couldn't decode variables: {0}")]
    Decode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compute_error_quotes_name_and_template() {
        let err = VarError::Compute {
            name: "a".into(),
            template: r#"${assert(false, "failure!")}"#.into(),
            source: EvalError::function("assert", "Assertion failed: failure!"),
        };
        assert_eq!(
            err.to_string(),
            r#"couldn't compute the value for "a", template: "${assert(false, \"failure!\")}", assert: Assertion failed: failure!"#
        );
    }

    #[test]
    fn build_error_enumerates_every_failure() {
        let err = BuildError::new(vec![
            VarError::Decode("oops".into()),
            VarError::Struct("not an object".into()),
        ]);
        assert_eq!(
            err.to_string(),
            "2 error(s) occurred: couldn't decode JSON object: oops; couldn't merge struct: not an object"
        );
        assert_eq!(err.errors().len(), 2);
    }
}
