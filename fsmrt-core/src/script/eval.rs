//! Evaluation of parsed guards and actions against a script environment.

use super::parse::{BinOp, Block, Builtin, Expr, Stmt, UnaryOp};
use crate::error::CoreError;
use crate::value::Value;
use std::collections::HashMap;

/// The context view a script runs against.
///
/// `vars` starts as a copy of the automaton's variable values and collects
/// assignments; `outputs` collects `output()` writes. The automaton pulls
/// both back after an action runs. Guards use the same view but nothing is
/// pulled back for them.
#[derive(Debug, Clone)]
pub struct ScriptEnv {
    pub(crate) vars: HashMap<String, Value>,
    pub(crate) inputs: HashMap<String, String>,
    pub(crate) outputs: HashMap<String, String>,
    /// When the current state was entered, in ms since the Unix epoch.
    pub(crate) since_ms: i64,
}

impl ScriptEnv {
    pub fn new(
        vars: HashMap<String, Value>,
        inputs: HashMap<String, String>,
        since_ms: i64,
    ) -> Self {
        Self {
            vars,
            inputs,
            outputs: HashMap::new(),
            since_ms,
        }
    }

    /// String view of an input, else of a variable, else "".
    pub fn valueof(&self, name: &str) -> String {
        if let Some(value) = self.inputs.get(name) {
            return value.clone();
        }
        if let Some(value) = self.vars.get(name) {
            return value.to_string();
        }
        String::new()
    }

    /// True iff the name is a known input or variable.
    pub fn defined(&self, name: &str) -> bool {
        self.inputs.contains_key(name) || self.vars.contains_key(name)
    }

    pub fn outputs(&self) -> &HashMap<String, String> {
        &self.outputs
    }

    pub fn vars(&self) -> &HashMap<String, Value> {
        &self.vars
    }
}

fn eval_error(reason: impl Into<String>) -> CoreError {
    CoreError::ScriptEval {
        reason: reason.into(),
    }
}

/// Runs an action block, mutating the environment.
pub(crate) fn run_block(block: &Block, env: &mut ScriptEnv) -> Result<(), CoreError> {
    for stmt in block {
        match stmt {
            Stmt::Assign(name, expr) => {
                let value = eval_expr(expr, env)?;
                env.vars.insert(name.clone(), value);
            }
            Stmt::Expr(expr) => {
                eval_expr(expr, env)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn eval_expr(expr: &Expr, env: &mut ScriptEnv) -> Result<Value, CoreError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),

        Expr::Ident(name) => {
            if let Some(value) = env.vars.get(name) {
                return Ok(value.clone());
            }
            if let Some(value) = env.inputs.get(name) {
                return Ok(Value::Str(value.clone()));
            }
            Err(eval_error(format!("undefined identifier `{name}`")))
        }

        Expr::Unary(op, inner) => {
            let value = eval_expr(inner, env)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => match value {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(x) => Ok(Value::Float(-x)),
                    other => Err(eval_error(format!("cannot negate {other:?}"))),
                },
            }
        }

        Expr::Binary(BinOp::And, left, right) => {
            if !eval_expr(left, env)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval_expr(right, env)?.is_truthy()))
        }

        Expr::Binary(BinOp::Or, left, right) => {
            if eval_expr(left, env)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval_expr(right, env)?.is_truthy()))
        }

        Expr::Binary(op, left, right) => {
            let a = eval_expr(left, env)?;
            let b = eval_expr(right, env)?;
            eval_binary(*op, a, b)
        }

        Expr::Call(builtin, args) => eval_call(*builtin, args, env),
    }
}

fn eval_binary(op: BinOp, a: Value, b: Value) -> Result<Value, CoreError> {
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(&a, &b))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&a, &b))),

        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare(&a, &b)?;
            let holds = match op {
                BinOp::Lt => ordering == std::cmp::Ordering::Less,
                BinOp::Le => ordering != std::cmp::Ordering::Greater,
                BinOp::Gt => ordering == std::cmp::Ordering::Greater,
                _ => ordering != std::cmp::Ordering::Less,
            };
            Ok(Value::Bool(holds))
        }

        BinOp::Add => {
            // String concatenation wins when either side is a string.
            if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
                return Ok(Value::Str(format!("{a}{b}")));
            }
            numeric_op(op, a, b)
        }

        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => numeric_op(op, a, b),

        BinOp::And | BinOp::Or => unreachable!("short-circuit ops handled in eval_expr"),
    }
}

fn numeric_op(op: BinOp, a: Value, b: Value) -> Result<Value, CoreError> {
    if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
        return match op {
            BinOp::Add => Ok(Value::Int(x.wrapping_add(*y))),
            BinOp::Sub => Ok(Value::Int(x.wrapping_sub(*y))),
            BinOp::Mul => Ok(Value::Int(x.wrapping_mul(*y))),
            BinOp::Div => x
                .checked_div(*y)
                .map(Value::Int)
                .ok_or_else(|| eval_error("integer division by zero")),
            BinOp::Rem => x
                .checked_rem(*y)
                .map(Value::Int)
                .ok_or_else(|| eval_error("integer remainder by zero")),
            _ => unreachable!(),
        };
    }

    let x = a
        .as_f64()
        .ok_or_else(|| eval_error(format!("expected a number, got {a:?}")))?;
    let y = b
        .as_f64()
        .ok_or_else(|| eval_error(format!("expected a number, got {b:?}")))?;
    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::Rem => x % y,
        _ => unreachable!(),
    };
    Ok(Value::Float(result))
}

/// Loose equality in the spirit of the guard language: numbers compare
/// numerically, anything else compares by string form.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    if let (Value::Bool(x), Value::Bool(y)) = (a, b) {
        return x == y;
    }
    a.to_string() == b.to_string()
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, CoreError> {
    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        return Ok(x.cmp(y));
    }
    let x = a
        .as_f64()
        .ok_or_else(|| eval_error(format!("cannot order {a:?}")))?;
    let y = b
        .as_f64()
        .ok_or_else(|| eval_error(format!("cannot order {b:?}")))?;
    x.partial_cmp(&y)
        .ok_or_else(|| eval_error("cannot order NaN"))
}

fn eval_call(builtin: Builtin, args: &[Expr], env: &mut ScriptEnv) -> Result<Value, CoreError> {
    match builtin {
        Builtin::ValueOf => {
            let name = eval_expr(&args[0], env)?.to_string();
            Ok(Value::Str(env.valueof(&name)))
        }
        Builtin::Defined => {
            let name = eval_expr(&args[0], env)?.to_string();
            Ok(Value::Bool(env.defined(&name)))
        }
        Builtin::Atoi => {
            let text = eval_expr(&args[0], env)?.to_string();
            Ok(Value::Int(parse_int_prefix(&text)))
        }
        Builtin::Elapsed => {
            let now = chrono::Utc::now().timestamp_millis();
            Ok(Value::Int(now - env.since_ms))
        }
        Builtin::Output => {
            let name = eval_expr(&args[0], env)?.to_string();
            let value = eval_expr(&args[1], env)?.to_string();
            env.outputs.insert(name, value.clone());
            Ok(Value::Str(value))
        }
    }
}

/// Decimal integer prefix parse; 0 when no digits are found.
fn parse_int_prefix(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: &str = rest
        .split_once(|c: char| !c.is_ascii_digit())
        .map(|(head, _)| head)
        .unwrap_or(rest);
    digits.parse::<i64>().map(|n| sign * n).unwrap_or(0)
}
