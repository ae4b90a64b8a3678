// src/template.rs
use serde_json::Value;

use crate::errors::Result;
use crate::expression::{eval_ast, parse_expr, ENode};
use crate::functions::Registry;
use crate::parser::Parser;
use crate::scope::Scope;

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Interp(ENode),
}

/// Literal text interleaved with `${ expr }` interpolations.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    pub fn parse(src: &str, max_depth: usize) -> Result<Self> {
        let mut p = Parser::new(src);
        let mut parts = Vec::new();
        let mut text = String::new();
        while !p.eof() {
            if p.consume_str("$${") {
                text.push_str("${");
            } else if p.consume_str("${") {
                if !text.is_empty() {
                    parts.push(Part::Text(std::mem::take(&mut text)));
                }
                let node = parse_expr(&mut p, max_depth)?;
                p.skip_ws();
                p.expect('}')?;
                parts.push(Part::Interp(node));
            } else if let Some(c) = p.bump() {
                text.push(c);
            }
        }
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }
        Ok(Self { parts })
    }

    pub fn render(&self, scope: &Scope<'_>, registry: &Registry) -> Result<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::Interp(node) => out.push_str(&render_value(&eval_ast(node, scope, registry)?)),
            }
        }
        Ok(out)
    }
}

/// Text form of a value inside rendered output.
pub fn render_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EvalError;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};

    fn render(src: &str, vars: Value) -> Result<String> {
        let constants = Map::new();
        let variables = vars.as_object().cloned().unwrap_or_default();
        Template::parse(src, 64)?.render(&Scope::new(&constants, &variables), &Registry::with_builtins())
    }

    #[test]
    fn plain_text_has_one_part() {
        let t = Template::parse("no-template", 64).unwrap();
        assert_eq!(t.parts, vec![Part::Text("no-template".into())]);
    }

    #[test]
    fn interpolations_render_in_place() {
        assert_eq!(render("id-${a}-${1+1}", json!({"a": "x"})).unwrap(), "id-x-2");
        assert_eq!(render("${pi}", json!({"pi": 3.14})).unwrap(), "3.14");
    }

    #[test]
    fn closing_brace_inside_string_literal() {
        assert_eq!(render("${'}'}", json!({})).unwrap(), "}");
    }

    #[test]
    fn escaped_interpolation_is_literal() {
        assert_eq!(render("$${a}", json!({})).unwrap(), "${a}");
    }

    #[test]
    fn compound_values_render_as_json() {
        assert_eq!(render("${v}", json!({"v": {"k": [1, null]}})).unwrap(), r#"{"k":[1,null]}"#);
        assert_eq!(render("[${n}]", json!({"n": null})).unwrap(), "[]");
    }

    #[test]
    fn unclosed_interpolation_is_a_parse_error() {
        let err = render("${a b}", json!({"a": 1})).unwrap_err();
        assert_eq!(err, EvalError::Parse("expected '}' at offset 4".into()));
    }
}
