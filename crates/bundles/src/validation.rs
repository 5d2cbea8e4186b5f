//! Static checks of message templates and bundle namespace usage.
//!
//! Nothing is evaluated: expressions are inspected as parsed, including the
//! argument expressions of virtual method calls.

use std::{collections::HashSet, fmt, sync::Arc};

use stencil_engine::{Engine, Expression, Origin};
use tracing::warn;

use crate::bundles::{BundleInfo, MessageBody};

/// Diagnostic for an expression that cannot work at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncorrectExpression {
    pub template_id: String,
    pub expression: String,
    pub origin: Origin,
    pub reason: String,
}

impl IncorrectExpression {
    fn new(expression: &Expression, reason: impl Into<String>) -> Self {
        Self {
            template_id: expression.origin().template_id.clone(),
            expression: expression.to_original_string(),
            origin: expression.origin().clone(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for IncorrectExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}} in {}: {}", self.expression, self.origin, self.reason)
    }
}

pub(crate) fn validate<'a>(engine: &Engine, bundles: impl Iterator<Item = &'a BundleInfo> + Clone) -> Vec<IncorrectExpression> {
    let mut incorrect = Vec::new();

    for bundle in bundles.clone() {
        for message in bundle.messages.values() {
            let bodies = std::iter::once(&message.default).chain(message.localized.values());
            for body in bodies {
                let MessageBody::Template { id } = body else {
                    continue;
                };
                let Ok(template) = engine.get_template(id) else {
                    continue;
                };
                let mut used = HashSet::new();
                for expression in template.expressions() {
                    walk(expression, &mut |expression| {
                        let Some(name) = expression.top_level_name() else {
                            return;
                        };
                        if message.params.iter().any(|param| param == name) {
                            used.insert(name.to_string());
                        } else {
                            incorrect.push(IncorrectExpression::new(
                                expression,
                                format!("'{name}' is not a parameter of message {}:{}", bundle.name, message.method),
                            ));
                        }
                    });
                }
                for unused in message.params.iter().filter(|param| !used.contains(param.as_str())) {
                    warn!(template = %id, parameter = %unused, "message parameter is never used");
                }
            }
        }
    }

    for id in engine.template_ids() {
        let Ok(template) = engine.get_template(&id) else {
            continue;
        };
        for expression in template.expressions() {
            walk(expression, &mut |expression| {
                if let Some(reason) = namespace_usage_error(expression, bundles.clone()) {
                    incorrect.push(IncorrectExpression::new(expression, reason));
                }
            });
        }
    }

    incorrect
}

/// Visits `expression` and every argument expression nested inside it.
fn walk(expression: &Arc<Expression>, visit: &mut impl FnMut(&Expression)) {
    visit(expression);
    for part in expression.parts() {
        for parameter in part.parameters() {
            walk(parameter, visit);
        }
    }
}

fn namespace_usage_error<'a>(expression: &Expression, mut bundles: impl Iterator<Item = &'a BundleInfo>) -> Option<String> {
    let namespace = expression.namespace()?;
    let bundle = bundles.find(|bundle| bundle.name == namespace)?;
    let part = expression.parts().first()?;
    let Some(message) = bundle.by_method(part.name()) else {
        return Some(format!("bundle '{namespace}' has no message '{}'", part.name()));
    };
    let actual = part.parameters().len();
    if actual != message.params.len() {
        return Some(format!(
            "message {namespace}:{} expects {} argument(s), got {actual}",
            message.method,
            message.params.len()
        ));
    }
    None
}
