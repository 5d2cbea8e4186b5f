use serde_json::Value;

use crate::{
    mapper::format_value,
    resolver::{EvalContext, Outcome, ValueResolver},
};

/// String virtual methods.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringResolver;

impl ValueResolver for StringResolver {
    fn applies_to(&self, context: &EvalContext<'_>) -> bool {
        !context.is_top_level() && context.base().is_string()
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        let Value::String(text) = context.base() else {
            return Outcome::Declined;
        };
        match (context.name(), context.arguments()) {
            ("length", []) => Outcome::value(text.chars().count()),
            ("isEmpty", []) => Outcome::value(text.is_empty()),
            ("toUpperCase", []) => Outcome::value(text.to_uppercase()),
            ("toLowerCase", []) => Outcome::value(text.to_lowercase()),
            ("contains", [needle]) => Outcome::value(text.contains(&format_value(needle))),
            _ => Outcome::Declined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::test_support::member;
    use serde_json::json;

    #[test]
    fn string_methods() {
        assert_eq!(member(&StringResolver, json!("héllo"), "length", &[]), Some(json!(5)));
        assert_eq!(member(&StringResolver, json!("Foo"), "toUpperCase", &[]), Some(json!("FOO")));
        assert_eq!(member(&StringResolver, json!("Foo"), "toLowerCase", &[]), Some(json!("foo")));
        assert_eq!(member(&StringResolver, json!("v12"), "contains", &[json!(12)]), Some(json!(true)));
        assert_eq!(member(&StringResolver, json!(""), "isEmpty", &[]), Some(json!(true)));
        assert_eq!(member(&StringResolver, json!("x"), "reverse", &[]), None);
        assert_eq!(member(&StringResolver, json!(1), "length", &[]), None);
    }
}
