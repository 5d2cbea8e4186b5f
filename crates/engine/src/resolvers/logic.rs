use serde_json::Value;

use crate::{
    mapper::format_value,
    resolver::{EvalContext, Outcome, ValueResolver},
};

/// Comparison and fallback helpers available on any value.
///
/// Consulted after the type-specific resolvers.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogicResolver;

impl ValueResolver for LogicResolver {
    fn priority(&self) -> i32 {
        0
    }

    fn applies_to(&self, context: &EvalContext<'_>) -> bool {
        !context.is_top_level()
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        let base = context.base();
        match (context.name(), context.arguments()) {
            ("or", [fallback]) if is_blank(base) => Outcome::value(fallback.clone()),
            ("or", [_]) => Outcome::value(base.clone()),
            ("eq", [other]) => Outcome::value(loosely_equal(base, other)),
            ("ne", [other]) => Outcome::value(!loosely_equal(base, other)),
            ("isTruthy", []) => Outcome::value(is_truthy(base)),
            _ => Outcome::Declined,
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    left == right || format_value(left) == format_value(right)
}

/// Truthy unless null, `false`, zero, or empty.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => !text.is_empty() && text != "false" && text != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
