//! Tree-walking evaluator.
//!
//! Actions run with `&mut VariableScope`; conditions only ever receive
//! `&VariableScope`, so a condition cannot change a variable.

use std::cmp::Ordering;

use super::ast::{BinOp, CmpOp, Expr, Literal, Program, Stmt, UnaryOp};
use super::builtins::{self, MAX_SEQUENCE_LEN};
use super::error::{FaultKind, ScriptError, ScriptResult};
use crate::core::{Number, Value, VariableScope};

/// Iterations a single loop may run before it is treated as runaway.
const MAX_LOOP_ITERATIONS: usize = 1_000_000;

enum Flow {
    Normal,
    Break,
    Continue,
}

/// Runs parsed programs and collects what they `print`.
///
/// # Example
///
/// ```rust
/// use bsm_engine::core::{Value, VariableScope};
/// use bsm_engine::script::{parse, Interpreter};
///
/// let program = parse("x = x + 1\nprint('x is', x)").unwrap();
/// let mut scope = VariableScope::new();
/// scope.insert("x".into(), Value::Int(1));
///
/// let mut interp = Interpreter::new();
/// interp.exec(&program, &mut scope).unwrap();
/// assert_eq!(scope["x"], Value::Int(2));
/// assert_eq!(interp.take_output(), vec!["x is 2".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct Interpreter {
    output: Vec<String>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines printed so far, oldest first.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Execute a statement list against a mutable scope.
    pub fn exec(&mut self, program: &Program, scope: &mut VariableScope) -> ScriptResult<()> {
        match self.exec_block(&program.body, scope)? {
            Flow::Normal => Ok(()),
            Flow::Break | Flow::Continue => Err(ScriptError::new(
                FaultKind::Syntax,
                "'break' or 'continue' outside loop",
            )),
        }
    }

    /// Evaluate an expression against a read-only scope.
    pub fn eval(&mut self, expr: &Expr, scope: &VariableScope) -> ScriptResult<Value> {
        match expr {
            Expr::Literal(lit) => Ok(literal(lit)),
            Expr::Name(name) => match scope.get(name) {
                Some(value) => Ok(value.clone()),
                None if builtins::is_builtin(name) => Err(ScriptError::type_error(format!(
                    "built-in '{name}' can only be called"
                ))),
                None => Err(ScriptError::name(name)),
            },
            Expr::List(items) => items
                .iter()
                .map(|e| self.eval(e, scope))
                .collect::<ScriptResult<Vec<_>>>()
                .map(Value::List),
            Expr::Dict(pairs) => {
                let mut map = std::collections::BTreeMap::new();
                for (k, v) in pairs {
                    let key = match self.eval(k, scope)? {
                        Value::Str(s) => s,
                        other => {
                            return Err(ScriptError::type_error(format!(
                                "dict keys must be strings, not '{}'",
                                other.type_name()
                            )))
                        }
                    };
                    map.insert(key, self.eval(v, scope)?);
                }
                Ok(Value::Dict(map))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                unary_op(*op, &value)
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                binary_op(*op, &l, &r)
            }
            Expr::Logical { and, left, right } => {
                let l = self.eval(left, scope)?;
                if l.is_truthy() == *and {
                    self.eval(right, scope)
                } else {
                    Ok(l)
                }
            }
            Expr::Compare { left, rest } => {
                let mut current = self.eval(left, scope)?;
                for (op, e) in rest {
                    let next = self.eval(e, scope)?;
                    if !compare_op(*op, &current, &next)? {
                        return Ok(Value::Bool(false));
                    }
                    current = next;
                }
                Ok(Value::Bool(true))
            }
            Expr::IfElse { test, then, orelse } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(then, scope)
                } else {
                    self.eval(orelse, scope)
                }
            }
            Expr::Call { func, args } => self.call(func, args, scope),
            Expr::Attribute { value, attr } => {
                let target = self.eval(value, scope)?;
                Err(ScriptError::attribute(target.type_name(), attr))
            }
            Expr::Index { value, index } => {
                let container = self.eval(value, scope)?;
                let key = self.eval(index, scope)?;
                get_item(&container, &key)
            }
        }
    }

    fn exec_block(&mut self, body: &[Stmt], scope: &mut VariableScope) -> ScriptResult<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &mut VariableScope) -> ScriptResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                self.assign(target, value, scope)?;
            }
            Stmt::AugAssign { target, op, value } => {
                let current = self.eval(target, scope)?;
                let rhs = self.eval(value, scope)?;
                let updated = binary_op(*op, &current, &rhs)?;
                self.assign(target, updated, scope)?;
            }
            Stmt::If { branches, orelse } => {
                for (test, body) in branches {
                    if self.eval(test, scope)?.is_truthy() {
                        return self.exec_block(body, scope);
                    }
                }
                return self.exec_block(orelse, scope);
            }
            Stmt::While { test, body } => {
                let mut iterations = 0;
                while self.eval(test, scope)?.is_truthy() {
                    iterations += 1;
                    if iterations > MAX_LOOP_ITERATIONS {
                        return Err(runaway_loop());
                    }
                    if let Flow::Break = self.exec_block(body, scope)? {
                        break;
                    }
                }
            }
            Stmt::For { var, iter, body } => {
                let items = iterate(&self.eval(iter, scope)?)?;
                if items.len() > MAX_LOOP_ITERATIONS {
                    return Err(runaway_loop());
                }
                for item in items {
                    scope.insert(var.clone(), item);
                    if let Flow::Break = self.exec_block(body, scope)? {
                        break;
                    }
                }
            }
            Stmt::Import { modules } => {
                let module = modules.first().map(String::as_str).unwrap_or_default();
                return Err(ScriptError::new(
                    FaultKind::Name,
                    format!("import of '{module}' is not available"),
                ));
            }
            Stmt::ImportFrom { module, .. } => {
                return Err(ScriptError::new(
                    FaultKind::Name,
                    format!("import of '{module}' is not available"),
                ));
            }
            Stmt::Pass => {}
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Expr, value: Value, scope: &mut VariableScope) -> ScriptResult<()> {
        match target {
            Expr::Name(name) => {
                scope.insert(name.clone(), value);
                Ok(())
            }
            Expr::Index { .. } => {
                let (root, mut keys) = self.index_path(target, scope)?;
                let Some(last) = keys.pop() else {
                    return Err(ScriptError::type_error("invalid assignment target"));
                };
                let mut slot = scope.get_mut(&root).ok_or_else(|| ScriptError::name(&root))?;
                for key in &keys {
                    slot = item_mut(slot, key)?;
                }
                set_item(slot, last, value)
            }
            Expr::Attribute { value: owner, attr } => {
                let owner = self.eval(owner, scope)?;
                Err(ScriptError::attribute(owner.type_name(), attr))
            }
            _ => Err(ScriptError::new(FaultKind::Syntax, "cannot assign to expression")),
        }
    }

    /// Root variable plus evaluated subscripts of `a[i][j]`.
    fn index_path(&mut self, target: &Expr, scope: &VariableScope) -> ScriptResult<(String, Vec<Value>)> {
        match target {
            Expr::Name(name) => Ok((name.clone(), Vec::new())),
            Expr::Index { value, index } => {
                let (root, mut keys) = self.index_path(value, scope)?;
                keys.push(self.eval(index, scope)?);
                Ok((root, keys))
            }
            other => {
                let value = self.eval(other, scope)?;
                Err(ScriptError::type_error(format!(
                    "'{}' object does not support item assignment",
                    value.type_name()
                )))
            }
        }
    }

    fn call(&mut self, func: &Expr, args: &[Expr], scope: &VariableScope) -> ScriptResult<Value> {
        match func {
            Expr::Name(name) => {
                if let Some(value) = scope.get(name) {
                    return Err(not_callable(value));
                }
                let builtin = builtins::lookup(name).ok_or_else(|| ScriptError::name(name))?;
                let args = match (name.as_str(), args) {
                    ("isinstance", [value, classes]) => {
                        vec![self.eval(value, scope)?, class_arg(classes, scope)?]
                    }
                    _ => self.eval_args(args, scope)?,
                };
                builtin.call(&args, &mut self.output)
            }
            Expr::Attribute { value, attr } => {
                let receiver = self.eval(value, scope)?;
                let args = self.eval_args(args, scope)?;
                call_method(&receiver, attr, &args)
            }
            other => {
                let value = self.eval(other, scope)?;
                Err(not_callable(&value))
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &VariableScope) -> ScriptResult<Vec<Value>> {
        args.iter().map(|a| self.eval(a, scope)).collect()
    }
}

/// Resolve the class operand of `isinstance` to type names.
fn class_arg(expr: &Expr, scope: &VariableScope) -> ScriptResult<Value> {
    match expr {
        Expr::Name(name) if !scope.contains_key(name) && builtins::is_type_name(name) => {
            Ok(Value::Str(name.clone()))
        }
        Expr::List(items) => items
            .iter()
            .map(|item| class_arg(item, scope))
            .collect::<ScriptResult<Vec<_>>>()
            .map(Value::List),
        _ => Err(ScriptError::type_error(
            "isinstance() arg 2 must be a type or tuple of types",
        )),
    }
}

fn runaway_loop() -> ScriptError {
    ScriptError::new(FaultKind::Overflow, "loop iteration limit exceeded")
}

fn not_callable(value: &Value) -> ScriptError {
    ScriptError::type_error(format!("'{}' object is not callable", value.type_name()))
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(x) => Value::Float(*x),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

/// Expand an iterable value into its items.
pub(crate) fn iterate(value: &Value) -> ScriptResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(map) => Ok(map.keys().cloned().map(Value::Str).collect()),
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn unary_op(op: UnaryOp, value: &Value) -> ScriptResult<Value> {
    let symbol = match op {
        UnaryOp::Not => return Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg => "-",
        UnaryOp::Pos => "+",
    };
    match (op, value.as_number()) {
        (UnaryOp::Neg, Some(Number::Int(i))) => {
            i.checked_neg().map(Value::Int).ok_or_else(ScriptError::overflow)
        }
        (UnaryOp::Neg, Some(Number::Float(x))) => Ok(Value::Float(-x)),
        (_, Some(Number::Int(i))) => Ok(Value::Int(i)),
        (_, Some(Number::Float(x))) => Ok(Value::Float(x)),
        (_, None) => Err(ScriptError::type_error(format!(
            "bad operand type for unary {symbol}: '{}'",
            value.type_name()
        ))),
    }
}

fn repeat<T: Clone>(items: &[T], count: i64) -> ScriptResult<Vec<T>> {
    let count = usize::try_from(count.max(0)).map_err(|_| ScriptError::overflow())?;
    if items.len().saturating_mul(count) > MAX_SEQUENCE_LEN {
        return Err(ScriptError::new(FaultKind::Overflow, "repeated sequence is too long"));
    }
    Ok(std::iter::repeat(items)
        .take(count)
        .flat_map(|chunk| chunk.iter().cloned())
        .collect())
}

/// Arithmetic with the scripting language's coercion rules.
pub(crate) fn binary_op(op: BinOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            return Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) => {
            if let Some(Number::Int(count)) = n.as_number() {
                let chars: Vec<char> = s.chars().collect();
                return Ok(Value::Str(repeat(&chars, count)?.into_iter().collect()));
            }
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items)) => {
            if let Some(Number::Int(count)) = n.as_number() {
                return Ok(Value::List(repeat(items, count)?));
            }
        }
        _ => {}
    }

    match (left.as_number(), right.as_number()) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => int_op(op, a, b),
        (Some(a), Some(b)) => float_op(op, a.to_f64(), b.to_f64()),
        _ => Err(ScriptError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> ScriptResult<Value> {
    let checked = |r: Option<i64>| r.map(Value::Int).ok_or_else(ScriptError::overflow);
    match op {
        BinOp::Add => checked(a.checked_add(b)),
        BinOp::Sub => checked(a.checked_sub(b)),
        BinOp::Mul => checked(a.checked_mul(b)),
        BinOp::Div => {
            if b == 0 {
                return Err(ScriptError::zero_division());
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(ScriptError::zero_division());
            }
            let q = a.checked_div(b).ok_or_else(ScriptError::overflow)?;
            let adjust = a % b != 0 && ((a < 0) != (b < 0));
            Ok(Value::Int(if adjust { q - 1 } else { q }))
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(ScriptError::zero_division());
            }
            let r = a.checked_rem(b).ok_or_else(ScriptError::overflow)?;
            let adjust = r != 0 && ((r < 0) != (b < 0));
            Ok(Value::Int(if adjust { r + b } else { r }))
        }
        BinOp::Pow => {
            if b < 0 {
                return float_op(op, a as f64, b as f64);
            }
            match a {
                0 => return Ok(Value::Int(i64::from(b == 0))),
                1 => return Ok(Value::Int(1)),
                -1 => return Ok(Value::Int(if b % 2 == 0 { 1 } else { -1 })),
                _ => {}
            }
            let exp = u32::try_from(b).map_err(|_| ScriptError::overflow())?;
            checked(a.checked_pow(exp))
        }
    }
}

fn float_op(op: BinOp, a: f64, b: f64) -> ScriptResult<Value> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if b == 0.0 => {
            return Err(ScriptError::new(FaultKind::ZeroDivision, "float division by zero"))
        }
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(ScriptError::new(
                    FaultKind::ZeroDivision,
                    "0.0 cannot be raised to a negative power",
                ));
            }
            let r = a.powf(b);
            if r.is_nan() && !a.is_nan() && !b.is_nan() {
                return Err(ScriptError::value_error("math domain error"));
            }
            r
        }
    };
    if result.is_infinite() && a.is_finite() && b.is_finite() {
        return Err(ScriptError::new(FaultKind::Overflow, "numerical result out of range"));
    }
    Ok(Value::Float(result))
}

/// Ordering for `<`-family comparisons, `min`, `max` and `sorted`.
pub(crate) fn compare(left: &Value, right: &Value, symbol: &str) -> ScriptResult<Ordering> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return Ok(match (a, b) {
            (Number::Int(x), Number::Int(y)) => x.cmp(&y),
            _ => a
                .to_f64()
                .partial_cmp(&b.to_f64())
                .unwrap_or(Ordering::Equal),
        });
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                if x.loose_eq(y) {
                    continue;
                }
                return compare(x, y, symbol);
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(ScriptError::type_error(format!(
            "'{symbol}' not supported between instances of '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn compare_op(op: CmpOp, left: &Value, right: &Value) -> ScriptResult<bool> {
    Ok(match op {
        CmpOp::Eq => left.loose_eq(right),
        CmpOp::NotEq => !left.loose_eq(right),
        CmpOp::Lt => compare(left, right, "<")? == Ordering::Less,
        CmpOp::LtE => compare(left, right, "<=")? != Ordering::Greater,
        CmpOp::Gt => compare(left, right, ">")? == Ordering::Greater,
        CmpOp::GtE => compare(left, right, ">=")? != Ordering::Less,
        CmpOp::In => contains(right, left)?,
        CmpOp::NotIn => !contains(right, left)?,
        CmpOp::Is => identical(left, right),
        CmpOp::IsNot => !identical(left, right),
    })
}

/// `is` on value types: same variant and equal contents.
fn identical(left: &Value, right: &Value) -> bool {
    std::mem::discriminant(left) == std::mem::discriminant(right) && left == right
}

fn contains(container: &Value, item: &Value) -> ScriptResult<bool> {
    match (container, item) {
        (Value::Str(s), Value::Str(sub)) => Ok(s.contains(sub.as_str())),
        (Value::Str(_), other) => Err(ScriptError::type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::List(items), _) => Ok(items.iter().any(|v| v.loose_eq(item))),
        (Value::Dict(map), Value::Str(key)) => Ok(map.contains_key(key)),
        (Value::Dict(_), _) => Ok(false),
        (other, _) => Err(ScriptError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn normalize_index(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let i = if index < 0 { index + len } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn list_index(value: &Value, index: &Value, len: usize, kind: &str) -> ScriptResult<usize> {
    match index.as_number() {
        Some(Number::Int(i)) => normalize_index(len, i).ok_or_else(|| {
            ScriptError::new(FaultKind::Index, format!("{kind} index out of range"))
        }),
        _ => Err(ScriptError::type_error(format!(
            "{} indices must be integers, not '{}'",
            value.type_name(),
            index.type_name()
        ))),
    }
}

fn key_error(key: &Value) -> ScriptError {
    ScriptError::new(FaultKind::Key, key.repr())
}

fn get_item(container: &Value, index: &Value) -> ScriptResult<Value> {
    match container {
        Value::List(items) => {
            let i = list_index(container, index, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = list_index(container, index, chars.len(), "string")?;
            Ok(Value::Str(chars[i].to_string()))
        }
        Value::Dict(map) => match index {
            Value::Str(key) => map.get(key).cloned().ok_or_else(|| key_error(index)),
            _ => Err(key_error(index)),
        },
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn item_mut<'v>(container: &'v mut Value, index: &Value) -> ScriptResult<&'v mut Value> {
    let type_name = container.type_name();
    match container {
        Value::List(items) => {
            let i = match index.as_number() {
                Some(Number::Int(i)) => normalize_index(items.len(), i)
                    .ok_or_else(|| ScriptError::new(FaultKind::Index, "list index out of range"))?,
                _ => {
                    return Err(ScriptError::type_error(format!(
                        "list indices must be integers, not '{}'",
                        index.type_name()
                    )))
                }
            };
            Ok(&mut items[i])
        }
        Value::Dict(map) => match index {
            Value::Str(key) => map.get_mut(key).ok_or_else(|| key_error(index)),
            _ => Err(key_error(index)),
        },
        _ => Err(ScriptError::type_error(format!(
            "'{type_name}' object is not subscriptable"
        ))),
    }
}

fn set_item(container: &mut Value, index: Value, value: Value) -> ScriptResult<()> {
    match container {
        Value::List(items) => {
            let i = match index.as_number() {
                Some(Number::Int(i)) => normalize_index(items.len(), i).ok_or_else(|| {
                    ScriptError::new(FaultKind::Index, "list assignment index out of range")
                })?,
                _ => {
                    return Err(ScriptError::type_error(format!(
                        "list indices must be integers, not '{}'",
                        index.type_name()
                    )))
                }
            };
            items[i] = value;
            Ok(())
        }
        Value::Dict(map) => match index {
            Value::Str(key) => {
                map.insert(key, value);
                Ok(())
            }
            other => Err(ScriptError::type_error(format!(
                "dict keys must be strings, not '{}'",
                other.type_name()
            ))),
        },
        other => Err(ScriptError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn expect_args(method: &str, args: &[Value], min: usize, max: usize) -> ScriptResult<()> {
    if args.len() < min || args.len() > max {
        return Err(ScriptError::type_error(format!(
            "{method}() takes {min} to {max} argument(s) ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn str_arg<'a>(method: &str, value: &'a Value) -> ScriptResult<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(ScriptError::type_error(format!(
            "{method}() argument must be str, not '{}'",
            other.type_name()
        ))),
    }
}

const STR_METHODS: &[&str] = &["upper", "lower", "strip", "startswith", "endswith", "replace"];
const DICT_METHODS: &[&str] = &["get", "keys", "values"];
const LIST_METHODS: &[&str] = &["count", "index"];

/// Whether `call_method` knows `method` for this receiver.
pub(crate) fn has_method(receiver: &Value, method: &str) -> bool {
    let table = match receiver {
        Value::Str(_) => STR_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::List(_) => LIST_METHODS,
        _ => &[],
    };
    table.contains(&method)
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> ScriptResult<Value> {
    match (receiver, method) {
        (Value::Str(s), "upper") => {
            expect_args(method, args, 0, 0)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        (Value::Str(s), "lower") => {
            expect_args(method, args, 0, 0)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        (Value::Str(s), "strip") => {
            expect_args(method, args, 0, 1)?;
            match args.first() {
                Some(chars) => {
                    let chars = str_arg(method, chars)?;
                    Ok(Value::Str(s.trim_matches(|c: char| chars.contains(c)).to_string()))
                }
                None => Ok(Value::Str(s.trim().to_string())),
            }
        }
        (Value::Str(s), "startswith") => {
            expect_args(method, args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg(method, &args[0])?)))
        }
        (Value::Str(s), "endswith") => {
            expect_args(method, args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg(method, &args[0])?)))
        }
        (Value::Str(s), "replace") => {
            expect_args(method, args, 2, 2)?;
            let from = str_arg(method, &args[0])?;
            let to = str_arg(method, &args[1])?;
            Ok(Value::Str(s.replace(from, to)))
        }
        (Value::Dict(map), "get") => {
            expect_args(method, args, 1, 2)?;
            let found = match &args[0] {
                Value::Str(key) => map.get(key).cloned(),
                _ => None,
            };
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }
        (Value::Dict(map), "keys") => {
            expect_args(method, args, 0, 0)?;
            Ok(Value::List(map.keys().cloned().map(Value::Str).collect()))
        }
        (Value::Dict(map), "values") => {
            expect_args(method, args, 0, 0)?;
            Ok(Value::List(map.values().cloned().collect()))
        }
        (Value::List(items), "count") => {
            expect_args(method, args, 1, 1)?;
            let n = items.iter().filter(|v| v.loose_eq(&args[0])).count();
            i64::try_from(n).map(Value::Int).map_err(|_| ScriptError::overflow())
        }
        (Value::List(items), "index") => {
            expect_args(method, args, 1, 1)?;
            let position = items
                .iter()
                .position(|v| v.loose_eq(&args[0]))
                .ok_or_else(|| {
                    ScriptError::value_error(format!("{} is not in list", args[0].repr()))
                })?;
            i64::try_from(position)
                .map(Value::Int)
                .map_err(|_| ScriptError::overflow())
        }
        (other, _) => Err(ScriptError::attribute(other.type_name(), method)),
    }
}
