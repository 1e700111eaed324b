//! Built-in operators available to YAML graph definitions.

use serde_json::{json, Number, Value};
use std::sync::Arc;
use xgraph::{OperatorError, OperatorFunc};

/// Names accepted in a node's `op` field.
pub const BUILTIN: [&str; 5] = ["concat", "format", "identity", "product", "sum"];

/// Operator named `name` for the node `key`.
pub fn builtin(name: &str, key: &str) -> Option<OperatorFunc> {
    let op: OperatorFunc = match name {
        "concat" => Arc::new(|args: Vec<Value>| -> Result<Value, OperatorError> {
            Ok(Value::String(args.iter().map(render).collect()))
        }),
        "format" => {
            let key = key.to_string();
            Arc::new(move |args: Vec<Value>| -> Result<Value, OperatorError> {
                let rendered: Vec<String> = args.iter().map(render).collect();
                Ok(json!(format!("{}([{}])", key, rendered.join(" "))))
            })
        }
        "identity" => Arc::new(|args: Vec<Value>| -> Result<Value, OperatorError> {
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        }),
        "product" => Arc::new(|args: Vec<Value>| fold(&args, 1, 1.0, |a, b| a.checked_mul(b), |a, b| a * b)),
        "sum" => Arc::new(|args: Vec<Value>| fold(&args, 0, 0.0, |a, b| a.checked_add(b), |a, b| a + b)),
        _ => return None,
    };
    Some(op)
}

/// Strings verbatim, everything else as JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integer arithmetic while every argument is an integer and nothing
/// overflows, floating point otherwise.
fn fold(
    args: &[Value],
    int_unit: i64,
    float_unit: f64,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, OperatorError> {
    let mut int_acc = Some(int_unit);
    let mut float_acc = float_unit;
    for (index, arg) in args.iter().enumerate() {
        let float = arg
            .as_f64()
            .ok_or_else(|| format!("argument {} is not a number: {}", index, arg))?;
        float_acc = float_op(float_acc, float);
        int_acc = match (int_acc, arg.as_i64()) {
            (Some(acc), Some(i)) => int_op(acc, i),
            _ => None,
        };
    }
    match int_acc {
        Some(i) => Ok(json!(i)),
        None => Number::from_f64(float_acc)
            .map(Value::Number)
            .ok_or_else(|| "result is not a finite number".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, OperatorError> {
        builtin(name, "node").unwrap()(args)
    }

    #[test]
    fn test_every_builtin_resolves() {
        for name in BUILTIN {
            assert!(builtin(name, "n").is_some(), "{}", name);
        }
        assert!(builtin("divide", "n").is_none());
    }

    #[test]
    fn test_sum_and_product() {
        assert_eq!(call("sum", vec![json!(1), json!(2), json!(3)]).unwrap(), json!(6));
        assert_eq!(call("sum", vec![json!(1), json!(0.5)]).unwrap(), json!(1.5));
        assert_eq!(call("product", vec![json!(2), json!(3)]).unwrap(), json!(6));
        assert_eq!(call("sum", vec![]).unwrap(), json!(0));
    }

    #[test]
    fn test_sum_overflow_falls_back_to_float() {
        let out = call("sum", vec![json!(i64::MAX), json!(1)]).unwrap();
        assert!(out.is_f64());
    }

    #[test]
    fn test_non_numeric_argument_fails() {
        let err = call("sum", vec![json!(1), json!("two")]).unwrap_err();
        assert_eq!(err.to_string(), "argument 1 is not a number: \"two\"");
    }

    #[test]
    fn test_format_and_concat() {
        assert_eq!(
            builtin("format", "sumX").unwrap()(vec![json!("X1"), json!(2)]).unwrap(),
            json!("sumX([X1 2])")
        );
        assert_eq!(call("concat", vec![json!("a"), json!(1), json!("b")]).unwrap(), json!("a1b"));
    }

    #[test]
    fn test_identity() {
        assert_eq!(call("identity", vec![json!("first"), json!("second")]).unwrap(), json!("first"));
        assert_eq!(call("identity", vec![]).unwrap(), Value::Null);
    }
}
