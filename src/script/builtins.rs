//! Built-in functions available to scripts.
//!
//! The table is a `const` and never changes at runtime, so no script can
//! add to or shadow what another script sees.

use std::cmp::Ordering;

use super::error::{FaultKind, ScriptError, ScriptResult};
use super::interpreter::{binary_op, compare, has_method, iterate};
use super::ast::BinOp;
use crate::core::{Number, Value};

type BuiltinFn = fn(&[Value], &mut Vec<String>) -> ScriptResult<Value>;

/// A named built-in callable.
pub struct Builtin {
    pub name: &'static str,
    call: BuiltinFn,
}

impl Builtin {
    pub(crate) fn call(&self, args: &[Value], output: &mut Vec<String>) -> ScriptResult<Value> {
        (self.call)(args, output)
    }
}

/// Upper bound on sequences built by `range` and repetition.
pub(crate) const MAX_SEQUENCE_LEN: usize = 10_000_000;

pub const BUILTINS: &[Builtin] = &[
    Builtin { name: "print", call: print },
    Builtin { name: "len", call: len },
    Builtin { name: "abs", call: abs },
    Builtin { name: "min", call: min },
    Builtin { name: "max", call: max },
    Builtin { name: "int", call: int },
    Builtin { name: "float", call: float },
    Builtin { name: "str", call: str_ },
    Builtin { name: "bool", call: bool_ },
    Builtin { name: "round", call: round },
    Builtin { name: "list", call: list },
    Builtin { name: "dict", call: dict },
    Builtin { name: "tuple", call: tuple },
    Builtin { name: "set", call: set },
    Builtin { name: "range", call: range },
    Builtin { name: "sorted", call: sorted },
    Builtin { name: "sum", call: sum },
    Builtin { name: "all", call: all },
    Builtin { name: "any", call: any },
    Builtin { name: "isinstance", call: isinstance },
    Builtin { name: "hasattr", call: hasattr },
];

/// Builtins that name a type and may appear as the class in `isinstance`.
const TYPE_NAMES: &[&str] = &["bool", "int", "float", "str", "list", "tuple", "set", "dict"];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

pub fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

pub fn is_type_name(name: &str) -> bool {
    TYPE_NAMES.contains(&name)
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> ScriptResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("exactly {min}")
        } else if args.len() < min {
            format!("at least {min}")
        } else {
            format!("at most {max}")
        };
        return Err(ScriptError::type_error(format!(
            "{name}() takes {expected} argument(s) ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn integer_arg(name: &str, value: &Value) -> ScriptResult<i64> {
    match value.as_number() {
        Some(Number::Int(i)) => Ok(i),
        _ => Err(ScriptError::type_error(format!(
            "{name}() expected an integer, got '{}'",
            value.type_name()
        ))),
    }
}

fn print(args: &[Value], output: &mut Vec<String>) -> ScriptResult<Value> {
    let line: Vec<String> = args.iter().map(Value::to_string).collect();
    output.push(line.join(" "));
    Ok(Value::None)
}

fn len(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("len", args, 1, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Dict(map) => map.len(),
        other => {
            return Err(ScriptError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| ScriptError::overflow())
}

fn abs(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("abs", args, 1, 1)?;
    match args[0].as_number() {
        Some(Number::Int(i)) => i.checked_abs().map(Value::Int).ok_or_else(ScriptError::overflow),
        Some(Number::Float(x)) => Ok(Value::Float(x.abs())),
        None => Err(ScriptError::type_error(format!(
            "bad operand type for abs(): '{}'",
            args[0].type_name()
        ))),
    }
}

fn extremum(name: &str, args: &[Value], wanted: Ordering) -> ScriptResult<Value> {
    let candidates = match args {
        [] => return Err(ScriptError::type_error(format!("{name} expected at least 1 argument, got 0"))),
        [single] => iterate(single)?,
        many => many.to_vec(),
    };
    let mut best: Option<Value> = None;
    for item in candidates {
        best = Some(match best {
            Some(current) if compare(&item, &current, "<")? != wanted => current,
            _ => item,
        });
    }
    best.ok_or_else(|| ScriptError::value_error(format!("{name}() arg is an empty sequence")))
}

fn min(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    extremum("min", args, Ordering::Less)
}

fn max(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    extremum("max", args, Ordering::Greater)
}

fn int(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("int", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::Int(0));
    };
    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(x) => {
            if !x.is_finite() {
                return Err(ScriptError::new(
                    FaultKind::Overflow,
                    "cannot convert non-finite float to integer",
                ));
            }
            let truncated = x.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(ScriptError::overflow());
            }
            Ok(Value::Int(truncated as i64))
        }
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                ScriptError::value_error(format!("invalid literal for int() with base 10: '{s}'"))
            }),
        other => Err(ScriptError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn float(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("float", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::Float(0.0));
    };
    if let Some(n) = value.as_number() {
        return Ok(Value::Float(n.to_f64()));
    }
    match value {
        Value::Str(s) => {
            let text = s.trim().to_ascii_lowercase();
            let parsed = match text.as_str() {
                "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                "nan" => Some(f64::NAN),
                other => other.parse::<f64>().ok(),
            };
            parsed.map(Value::Float).ok_or_else(|| {
                ScriptError::value_error(format!("could not convert string to float: '{s}'"))
            })
        }
        other => Err(ScriptError::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn str_(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("str", args, 0, 1)?;
    Ok(Value::Str(args.first().map(Value::to_string).unwrap_or_default()))
}

fn bool_(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

/// Round half to even, matching the scripting language's `round`.
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

fn round(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("round", args, 1, 2)?;
    let number = args[0].as_number().ok_or_else(|| {
        ScriptError::type_error(format!(
            "type {} doesn't define __round__ method",
            args[0].type_name()
        ))
    })?;
    match (number, args.get(1)) {
        (Number::Int(i), _) => Ok(Value::Int(i)),
        (Number::Float(x), None) => {
            let r = round_half_even(x);
            if !r.is_finite() || r < i64::MIN as f64 || r >= i64::MAX as f64 {
                return Err(ScriptError::overflow());
            }
            Ok(Value::Int(r as i64))
        }
        (Number::Float(x), Some(digits)) => {
            let digits = integer_arg("round", digits)?.clamp(-308, 308);
            let factor = 10f64.powi(digits as i32);
            Ok(Value::Float(round_half_even(x * factor) / factor))
        }
    }
}

fn list(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("list", args, 0, 1)?;
    match args.first() {
        Some(value) => Ok(Value::List(iterate(value)?)),
        None => Ok(Value::List(Vec::new())),
    }
}

fn dict(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("dict", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Dict(Default::default())),
        Some(Value::Dict(map)) => Ok(Value::Dict(map.clone())),
        Some(other) => Err(ScriptError::type_error(format!(
            "cannot convert '{}' object to dict",
            other.type_name()
        ))),
    }
}

/// Tuples are plain lists here.
fn tuple(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("tuple", args, 0, 1)?;
    match args.first() {
        Some(value) => Ok(Value::List(iterate(value)?)),
        None => Ok(Value::List(Vec::new())),
    }
}

/// A list without duplicates, in first-seen order.
fn set(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("set", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::List(Vec::new()));
    };
    let mut unique: Vec<Value> = Vec::new();
    for item in iterate(value)? {
        if matches!(item, Value::List(_) | Value::Dict(_)) {
            return Err(ScriptError::type_error(format!(
                "unhashable type: '{}'",
                item.type_name()
            )));
        }
        if !unique.iter().any(|seen| seen.loose_eq(&item)) {
            unique.push(item);
        }
    }
    Ok(Value::List(unique))
}

fn instance_of(value: &Value, class: &str) -> bool {
    match (value, class) {
        (Value::Bool(_), "int") => true,
        (Value::List(_), "tuple" | "set") => true,
        _ => value.type_name() == class,
    }
}

/// The interpreter passes classes as type names, or a list of them.
fn isinstance(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("isinstance", args, 2, 2)?;
    let classes = match &args[1] {
        Value::List(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };
    let mut matched = false;
    for class in classes {
        match class {
            Value::Str(name) if is_type_name(name) => matched |= instance_of(&args[0], name),
            _ => {
                return Err(ScriptError::type_error(
                    "isinstance() arg 2 must be a type or tuple of types",
                ))
            }
        }
    }
    Ok(Value::Bool(matched))
}

fn hasattr(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("hasattr", args, 2, 2)?;
    match &args[1] {
        Value::Str(name) => Ok(Value::Bool(has_method(&args[0], name))),
        _ => Err(ScriptError::type_error(
            "hasattr(): attribute name must be string",
        )),
    }
}

fn range(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("range", args, 1, 3)?;
    let ints: Vec<i64> = args
        .iter()
        .map(|a| integer_arg("range", a))
        .collect::<ScriptResult<_>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(ScriptError::type_error("range expected 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(ScriptError::value_error("range() arg 3 must not be zero"));
    }
    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let count = if span <= 0 {
        0
    } else {
        (span + i128::from(step.unsigned_abs()) - 1) / i128::from(step.unsigned_abs())
    };
    if count > MAX_SEQUENCE_LEN as i128 {
        return Err(ScriptError::new(FaultKind::Overflow, "range() result is too large"));
    }
    let items = (0..count as i64)
        .map(|k| Value::Int(start + k * step))
        .collect();
    Ok(Value::List(items))
}

fn sorted(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("sorted", args, 1, 1)?;
    let mut items = iterate(&args[0])?;
    let mut failure = None;
    items.sort_by(|a, b| {
        compare(a, b, "<").unwrap_or_else(|err| {
            failure.get_or_insert(err);
            Ordering::Equal
        })
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Value::List(items)),
    }
}

fn sum(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("sum", args, 1, 2)?;
    let start = args.get(1).cloned().unwrap_or(Value::Int(0));
    if matches!(start, Value::Str(_)) {
        return Err(ScriptError::type_error(
            "sum() can't sum strings [use ''.join(seq) instead]",
        ));
    }
    iterate(&args[0])?
        .iter()
        .try_fold(start, |acc, item| binary_op(BinOp::Add, &acc, item))
}

fn all(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("all", args, 1, 1)?;
    Ok(Value::Bool(iterate(&args[0])?.iter().all(Value::is_truthy)))
}

fn any(args: &[Value], _: &mut Vec<String>) -> ScriptResult<Value> {
    arity("any", args, 1, 1)?;
    Ok(Value::Bool(iterate(&args[0])?.iter().any(Value::is_truthy)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> ScriptResult<Value> {
        let mut out = Vec::new();
        lookup(name).expect("builtin exists").call(args, &mut out)
    }

    fn ints(values: &[i64]) -> Value {
        Value::List(values.iter().map(|i| Value::Int(*i)).collect())
    }

    #[test]
    fn table_is_static_and_complete() {
        for name in [
            "print", "len", "range", "sorted", "any", "set", "tuple", "isinstance", "hasattr",
        ] {
            assert!(is_builtin(name), "{name}");
        }
        assert!(!is_builtin("eval"));
        assert!(!is_builtin("open"));
    }

    #[test]
    fn print_writes_to_output() {
        let mut out = Vec::new();
        lookup("print")
            .unwrap()
            .call(&[Value::from("x is"), Value::Int(3)], &mut out)
            .unwrap();
        assert_eq!(out, vec!["x is 3".to_string()]);
    }

    #[test]
    fn range_forms() {
        assert_eq!(call("range", &[Value::Int(3)]).unwrap(), ints(&[0, 1, 2]));
        assert_eq!(
            call("range", &[Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            ints(&[5, 3, 1])
        );
        assert_eq!(
            call("range", &[Value::Int(0), Value::Int(1), Value::Int(0)])
                .unwrap_err()
                .kind,
            FaultKind::Value
        );
    }

    #[test]
    fn min_max_over_args_and_iterables() {
        assert_eq!(
            call("max", &[Value::Int(1), Value::Float(2.5)]).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(call("min", &[ints(&[4, -1, 7])]).unwrap(), Value::Int(-1));
        assert_eq!(
            call("min", &[ints(&[])]).unwrap_err().kind,
            FaultKind::Value
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(call("int", &[Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(call("int", &[Value::from(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(
            call("int", &[Value::from("abc")]).unwrap_err().kind,
            FaultKind::Value
        );
        assert_eq!(call("float", &[Value::Int(2)]).unwrap(), Value::Float(2.0));
        assert_eq!(call("str", &[Value::Bool(true)]).unwrap(), Value::from("True"));
        assert_eq!(call("bool", &[Value::from("")]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn round_uses_bankers_rounding() {
        assert_eq!(call("round", &[Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(call("round", &[Value::Float(3.5)]).unwrap(), Value::Int(4));
        assert_eq!(
            call("round", &[Value::Float(1.234), Value::Int(2)]).unwrap(),
            Value::Float(1.23)
        );
    }

    #[test]
    fn sorted_rejects_mixed_types() {
        assert_eq!(call("sorted", &[ints(&[3, 1, 2])]).unwrap(), ints(&[1, 2, 3]));
        let mixed = Value::List(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(call("sorted", &[mixed]).unwrap_err().kind, FaultKind::Type);
    }

    #[test]
    fn tuple_and_set_build_lists() {
        assert_eq!(
            call("tuple", &[Value::from("ab")]).unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(call("tuple", &[]).unwrap(), ints(&[]));
        assert_eq!(call("set", &[ints(&[3, 1, 3, 2, 1])]).unwrap(), ints(&[3, 1, 2]));
        let mixed = Value::List(vec![Value::Int(1), Value::Float(1.0), Value::Bool(true)]);
        assert_eq!(call("set", &[mixed]).unwrap(), ints(&[1]));
        let nested = Value::List(vec![ints(&[1])]);
        assert_eq!(call("set", &[nested]).unwrap_err().kind, FaultKind::Type);
    }

    #[test]
    fn isinstance_matches_type_names() {
        let check = |value: Value, class: Value| call("isinstance", &[value, class]);
        assert_eq!(check(Value::Int(1), Value::from("int")).unwrap(), Value::Bool(true));
        assert_eq!(check(Value::Bool(true), Value::from("int")).unwrap(), Value::Bool(true));
        assert_eq!(check(Value::Int(1), Value::from("bool")).unwrap(), Value::Bool(false));
        assert_eq!(check(ints(&[]), Value::from("tuple")).unwrap(), Value::Bool(true));
        let either = Value::List(vec![Value::from("str"), Value::from("float")]);
        assert_eq!(check(Value::Float(0.5), either).unwrap(), Value::Bool(true));
        assert_eq!(
            check(Value::Int(1), Value::from("widget")).unwrap_err().kind,
            FaultKind::Type
        );
    }

    #[test]
    fn hasattr_consults_the_method_table() {
        let has = |value: Value, name: &str| call("hasattr", &[value, Value::from(name)]);
        assert_eq!(has(Value::from("x"), "upper").unwrap(), Value::Bool(true));
        assert_eq!(has(ints(&[]), "upper").unwrap(), Value::Bool(false));
        assert_eq!(has(Value::Dict(Default::default()), "keys").unwrap(), Value::Bool(true));
        assert_eq!(has(Value::Int(3), "count").unwrap(), Value::Bool(false));
        assert_eq!(
            call("hasattr", &[Value::Int(3), Value::Int(1)]).unwrap_err().kind,
            FaultKind::Type
        );
    }

    #[test]
    fn aggregates() {
        assert_eq!(call("sum", &[ints(&[1, 2, 3])]).unwrap(), Value::Int(6));
        assert_eq!(call("all", &[ints(&[1, 0])]).unwrap(), Value::Bool(false));
        assert_eq!(call("any", &[ints(&[0, 5])]).unwrap(), Value::Bool(true));
        assert_eq!(call("len", &[Value::from("héllo")]).unwrap(), Value::Int(5));
        assert_eq!(
            call("len", &[Value::Int(5)]).unwrap_err().kind,
            FaultKind::Type
        );
    }
}
