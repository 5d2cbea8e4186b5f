use serde_json::Value;

use crate::{
    mapper::format_value,
    resolver::{EvalContext, Outcome, ValueResolver},
};

/// Resolves numeric indexes and list virtual methods on JSON arrays.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListResolver;

impl ValueResolver for ListResolver {
    fn applies_to(&self, context: &EvalContext<'_>) -> bool {
        !context.is_top_level() && context.base().is_array()
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        let Value::Array(items) = context.base() else {
            return Outcome::Declined;
        };
        if !context.is_virtual_method()
            && let Ok(index) = context.name().parse::<usize>()
        {
            return element(items, index);
        }
        match (context.name(), context.arguments()) {
            ("size", []) => Outcome::value(items.len()),
            ("isEmpty", []) => Outcome::value(items.is_empty()),
            ("first", []) => items.first().map_or(Outcome::Declined, |item| Outcome::value(item.clone())),
            ("last", []) => items.last().map_or(Outcome::Declined, |item| Outcome::value(item.clone())),
            ("get", [index]) => match index.as_u64().and_then(|index| usize::try_from(index).ok()) {
                Some(index) => element(items, index),
                None => Outcome::Declined,
            },
            ("contains", [needle]) => {
                let needle = format_value(needle);
                Outcome::value(items.iter().any(|item| format_value(item) == needle))
            }
            _ => Outcome::Declined,
        }
    }
}

fn element(items: &[Value], index: usize) -> Outcome {
    items.get(index).map_or(Outcome::Declined, |item| Outcome::value(item.clone()))
}
