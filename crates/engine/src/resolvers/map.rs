use serde_json::Value;

use crate::resolver::{EvalContext, Outcome, ValueResolver};

/// Resolves object keys and a few virtual methods on JSON objects.
///
/// Keys take precedence over the `size`/`isEmpty`/`keys` properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapResolver;

impl ValueResolver for MapResolver {
    fn applies_to(&self, context: &EvalContext<'_>) -> bool {
        !context.is_top_level() && context.base().is_object()
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        let Value::Object(map) = context.base() else {
            return Outcome::Declined;
        };
        if !context.is_virtual_method()
            && let Some(value) = map.get(context.name())
        {
            return Outcome::value(value.clone());
        }
        match (context.name(), context.arguments()) {
            ("size", []) => Outcome::value(map.len()),
            ("isEmpty", []) => Outcome::value(map.is_empty()),
            ("keys", []) => Outcome::value(map.keys().cloned().collect::<Vec<_>>()),
            ("get", [key]) => Outcome::value(key.as_str().and_then(|key| map.get(key)).cloned().unwrap_or(Value::Null)),
            ("containsKey", [key]) => Outcome::value(key.as_str().is_some_and(|key| map.contains_key(key))),
            _ => Outcome::Declined,
        }
    }
}
