// src/expression.rs
use serde_json::{Number, Value};

use crate::comparison::{cmp_values, loose_eq};
use crate::errors::{EvalError, Result};
use crate::functions::Registry;
use crate::parser::Parser;
use crate::scope::Scope;

#[derive(Debug, Clone, PartialEq)]
pub enum ENode {
    Literal(Value),
    Var(String),
    Call { name: String, args: Vec<ENode> },
    Unary { op: UnaryOp, operand: Box<ENode> },
    Binary { op: BinaryOp, lhs: Box<ENode>, rhs: Box<ENode> },
    Conditional { cond: Box<ENode>, then: Box<ENode>, otherwise: Box<ENode> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Parses an expression from the cursor's position, stopping at the first
/// character that cannot continue it (for templates, the closing `}`).
pub fn parse_expr(parser: &mut Parser<'_>, max_depth: usize) -> Result<ENode> {
    let mut p = EParser { parser, depth: 0, max_depth };
    p.parse_conditional()
}

struct EParser<'p, 'a> {
    parser: &'p mut Parser<'a>,
    depth: usize,
    max_depth: usize,
}

impl<'p, 'a> EParser<'p, 'a> {
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.parser.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn parse_conditional(&mut self) -> Result<ENode> {
        self.descend()?;
        let cond = self.parse_binary(0)?;
        self.parser.skip_ws();
        let node = if self.parser.consume_char('?') {
            let then = self.parse_conditional()?;
            self.parser.skip_ws();
            self.parser.expect(':')?;
            let otherwise = self.parse_conditional()?;
            ENode::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            }
        } else {
            cond
        };
        self.depth -= 1;
        Ok(node)
    }

    /// Precedence climbing over the binary operator table. Every folded
    /// operator deepens the tree, so each one counts toward `max_depth`.
    fn parse_binary(&mut self, level: usize) -> Result<ENode> {
        if level == LEVELS.len() {
            return self.parse_unary();
        }
        let mut lhs = self.parse_binary(level + 1)?;
        let mut folded = 0;
        loop {
            self.parser.skip_ws();
            let Some(op) = self.match_operator(LEVELS[level]) else {
                break;
            };
            self.descend()?;
            folded += 1;
            let rhs = self.parse_binary(level + 1)?;
            lhs = ENode::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        self.depth -= folded;
        Ok(lhs)
    }

    fn match_operator(&mut self, ops: &[(&str, BinaryOp)]) -> Option<BinaryOp> {
        for (lit, op) in ops {
            if self.parser.peek_str(lit) {
                self.parser.consume_str(lit);
                return Some(*op);
            }
        }
        None
    }

    fn parse_unary(&mut self) -> Result<ENode> {
        self.parser.skip_ws();
        let op = if self.parser.peek_str("!=") {
            None
        } else if self.parser.consume_char('!') {
            Some(UnaryOp::Not)
        } else if self.parser.consume_char('-') {
            Some(UnaryOp::Neg)
        } else {
            None
        };
        match op {
            Some(op) => {
                self.descend()?;
                let operand = self.parse_unary()?;
                self.depth -= 1;
                Ok(ENode::Unary { op, operand: Box::new(operand) })
            }
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<ENode> {
        self.parser.skip_ws();
        match self.parser.peek_char() {
            Some('"') | Some('\'') => Ok(ENode::Literal(Value::String(
                self.parser.parse_quoted_string()?,
            ))),
            Some(c) if c.is_ascii_digit() || c == '.' => {
                Ok(ENode::Literal(self.parser.parse_number_literal()?))
            }
            Some('(') => {
                self.parser.consume_char('(');
                let inner = self.parse_conditional()?;
                self.parser.skip_ws();
                self.parser.expect(')')?;
                Ok(inner)
            }
            Some(c) if c == '_' || c.is_ascii_alphabetic() => {
                let name = self.parser.parse_identifier()?;
                match name.as_str() {
                    "true" => return Ok(ENode::Literal(Value::Bool(true))),
                    "false" => return Ok(ENode::Literal(Value::Bool(false))),
                    "null" => return Ok(ENode::Literal(Value::Null)),
                    _ => {}
                }
                self.parser.skip_ws();
                if self.parser.consume_char('(') {
                    let args = self.parse_args()?;
                    self.parser.expect(')')?;
                    Ok(ENode::Call { name, args })
                } else {
                    Ok(ENode::Var(name))
                }
            }
            Some(c) => Err(self.parser.error(format!("unexpected character '{c}'"))),
            None => Err(self.parser.error("unexpected end of expression")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<ENode>> {
        let mut out = Vec::new();
        self.parser.skip_ws();
        if self.parser.peek_char() == Some(')') {
            return Ok(out);
        }
        loop {
            out.push(self.parse_conditional()?);
            self.parser.skip_ws();
            if self.parser.consume_char(',') {
                continue;
            }
            break;
        }
        Ok(out)
    }
}

// Loosest binding first. Within a level, `<=` and `>=` precede `<` and `>`.
const LEVELS: &[&[(&str, BinaryOp)]] = &[
    &[("||", BinaryOp::Or)],
    &[("&&", BinaryOp::And)],
    &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
    &[
        ("<=", BinaryOp::Lte),
        (">=", BinaryOp::Gte),
        ("<", BinaryOp::Lt),
        (">", BinaryOp::Gt),
    ],
    &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
    &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
];

/// Evaluate AST node → Value
pub fn eval_ast(node: &ENode, scope: &Scope<'_>, registry: &Registry) -> Result<Value> {
    match node {
        ENode::Literal(v) => Ok(v.clone()),
        ENode::Var(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::runtime(format!("unknown variable accessed: {name}"))),
        ENode::Call { name, args } => {
            let args = args
                .iter()
                .map(|a| eval_ast(a, scope, registry))
                .collect::<Result<Vec<_>>>()?;
            registry.call(name, &args)
        }
        ENode::Unary { op: UnaryOp::Not, operand } => {
            Ok(Value::Bool(!as_bool(&eval_ast(operand, scope, registry)?)?))
        }
        ENode::Unary { op: UnaryOp::Neg, operand } => {
            match as_num(&eval_ast(operand, scope, registry)?)? {
                Num::Int(i) => i
                    .checked_neg()
                    .map(Value::from)
                    .ok_or_else(|| EvalError::runtime("integer overflow")),
                Num::Float(f) => float_value(-f),
            }
        }
        ENode::Binary { op: BinaryOp::And, lhs, rhs } => {
            if !as_bool(&eval_ast(lhs, scope, registry)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool(&eval_ast(rhs, scope, registry)?)?))
        }
        ENode::Binary { op: BinaryOp::Or, lhs, rhs } => {
            if as_bool(&eval_ast(lhs, scope, registry)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool(&eval_ast(rhs, scope, registry)?)?))
        }
        ENode::Binary { op, lhs, rhs } => {
            let l = eval_ast(lhs, scope, registry)?;
            let r = eval_ast(rhs, scope, registry)?;
            eval_binary(*op, &l, &r)
        }
        ENode::Conditional { cond, then, otherwise } => {
            if as_bool(&eval_ast(cond, scope, registry)?)? {
                eval_ast(then, scope, registry)
            } else {
                eval_ast(otherwise, scope, registry)
            }
        }
    }
}

fn eval_binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    use std::cmp::Ordering::*;
    let b = |v: bool| -> Result<Value> { Ok(Value::Bool(v)) };
    match op {
        BinaryOp::Eq => b(loose_eq(l, r)),
        BinaryOp::Ne => b(!loose_eq(l, r)),
        BinaryOp::Lt => b(cmp_values(l, r) == Less),
        BinaryOp::Lte => b(cmp_values(l, r) != Greater),
        BinaryOp::Gt => b(cmp_values(l, r) == Greater),
        BinaryOp::Gte => b(cmp_values(l, r) != Less),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, as_num(l)?, as_num(r)?)
        }
        BinaryOp::And => b(as_bool(l)? && as_bool(r)?),
        BinaryOp::Or => b(as_bool(l)? || as_bool(r)?),
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn arithmetic(op: BinaryOp, l: Num, r: Num) -> Result<Value> {
    if let (Num::Int(a), Num::Int(b)) = (l, r) {
        let out = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                return Err(EvalError::runtime("divide by zero"))
            }
            BinaryOp::Div => a.checked_div(b),
            BinaryOp::Rem => a.checked_rem(b),
            _ => None,
        };
        return out
            .map(Value::from)
            .ok_or_else(|| EvalError::runtime("integer overflow"));
    }
    let (a, b) = (l.as_f64(), r.as_f64());
    let out = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
            return Err(EvalError::runtime("divide by zero"))
        }
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => return Err(EvalError::runtime("not an arithmetic operator")),
    };
    float_value(out)
}

fn float_value(f: f64) -> Result<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| EvalError::runtime(format!("result is not a finite number: {f}")))
}

fn as_num(v: &Value) -> Result<Num> {
    let parsed = match v {
        Value::Number(n) => n
            .as_i64()
            .map(Num::Int)
            .or_else(|| n.as_f64().map(Num::Float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Num::Int)
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(Num::Float))
        }
        _ => None,
    };
    parsed.ok_or_else(|| EvalError::runtime(format!("expected a number, got {v}")))
}

fn as_bool(v: &Value) -> Result<bool> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => s
            .parse::<bool>()
            .map_err(|_| EvalError::runtime(format!("expected a boolean, got {v}"))),
        _ => Err(EvalError::runtime(format!("expected a boolean, got {v}"))),
    }
}
