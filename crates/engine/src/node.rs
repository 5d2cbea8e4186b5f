//! Parsed template nodes and the result nodes they resolve to.

use std::{fmt, sync::Arc};

use serde_json::Value;
use stencil_types::Expression;
use tracing::{Level, trace};

use crate::{
    Completion, EngineConfig, ResolutionError,
    compose::Settled,
    context::ResolutionContext,
    mapper::MapperChain,
};

const NODE_RESOLVE_TARGET: &str = "stencil::node_resolve";

/// One element of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Text(Arc<str>),
    Expression(Arc<ExpressionNode>),
}

/// Placeholder node wrapping one expression.
pub struct ExpressionNode {
    expression: Arc<Expression>,
    trace_enabled: bool,
}

impl ExpressionNode {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression: Arc::new(expression),
            trace_enabled: tracing::enabled!(target: NODE_RESOLVE_TARGET, Level::TRACE),
        }
    }

    pub fn expression(&self) -> &Arc<Expression> {
        &self.expression
    }

    /// Evaluates the expression and wraps the outcome in a [`ResultNode`].
    pub(crate) fn resolve(self: &Arc<Self>, context: &ResolutionContext) -> Completion<ResultNode> {
        if self.trace_enabled {
            trace!(target: NODE_RESOLVE_TARGET, expression = %self.expression, origin = %self.expression.origin(), "resolve started");
        }
        let node = Arc::clone(self);
        context.evaluate(&self.expression).map(move |settled| {
            if node.trace_enabled {
                trace!(target: NODE_RESOLVE_TARGET, expression = %node.expression, found = !settled.is_not_found(), "resolve completed");
            }
            let value = match settled {
                Settled::Node(result) => return result,
                Settled::Value(value) => ResultValue::Value(value),
                Settled::NotFound => ResultValue::NotFound,
            };
            ResultNode::Single { value, node }
        })
    }
}

impl fmt::Debug for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExpressionNode").field(&self.expression.to_original_string()).finish()
    }
}

impl PartialEq for ExpressionNode {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

/// Final value carried by a computed result node.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Value(Value),
    NotFound,
}

/// Terminal, resolved representation of one node before stringification.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultNode {
    /// Text that needs no mapping.
    Constant(Arc<str>),
    /// Resolved value plus the node it came from, consulted by result mappers.
    Single { value: ResultValue, node: Arc<ExpressionNode> },
}

impl ResultNode {
    pub fn constant(text: impl Into<Arc<str>>) -> Self {
        Self::Constant(text.into())
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Single {
                value: ResultValue::Value(value),
                ..
            } => Some(value),
            _ => None,
        }
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            Self::Constant(text) => Value::String(text.to_string()),
            Self::Single {
                value: ResultValue::Value(value),
                ..
            } => value,
            Self::Single {
                value: ResultValue::NotFound, ..
            } => Value::Null,
        }
    }

    /// Appends this node's text to `out`.
    pub fn write_to(&self, out: &mut String, mappers: &MapperChain, config: &EngineConfig) -> Result<(), ResolutionError> {
        match self {
            Self::Constant(text) => out.push_str(text),
            Self::Single { value, node } => out.push_str(&mappers.map(value, node.expression(), config)?),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stencil_types::Origin;

    #[test]
    fn write_to_uses_fallback_formatting() {
        let node = Arc::new(ExpressionNode::new(Expression::from_path("count", Origin::new("t", 1))));
        let mut out = String::from("n=");
        ResultNode::Single {
            value: ResultValue::Value(json!(3)),
            node: Arc::clone(&node),
        }
        .write_to(&mut out, &MapperChain::default(), &EngineConfig::default())
        .unwrap();
        ResultNode::Single {
            value: ResultValue::NotFound,
            node,
        }
        .write_to(&mut out, &MapperChain::default(), &EngineConfig::default())
        .unwrap();
        ResultNode::constant("!")
            .write_to(&mut out, &MapperChain::default(), &EngineConfig::default())
            .unwrap();
        assert_eq!(out, "n=3!");
    }

    #[test]
    fn literal_resolution_is_ready_and_idempotent() {
        let engine = crate::Engine::builder().config(EngineConfig::default()).build();
        let context = ResolutionContext::root(&engine, Arc::default());
        let node = Arc::new(ExpressionNode::new(Expression::literal(json!("hi"), Origin::new("t", 1))));
        let (Completion::Ready(Ok(first)), Completion::Ready(Ok(second))) = (node.resolve(&context), node.resolve(&context)) else {
            panic!("literal resolution must be ready");
        };
        assert_eq!(first, second);
        assert_eq!(first.value(), Some(&json!("hi")));
    }

    #[test]
    fn expression_nodes_compare_by_expression() {
        let first = ExpressionNode::new(Expression::from_path("a.b", Origin::new("t", 1)));
        let second = ExpressionNode::new(Expression::from_path("a.b", Origin::new("t", 1)));
        assert_eq!(first, second);
        assert_eq!(format!("{first:?}"), "ExpressionNode(\"a.b\")");
    }
}
