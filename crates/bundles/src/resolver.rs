//! Namespace resolver rendering bundle messages from templates.

use std::sync::Arc;

use anyhow::anyhow;
use stencil_engine::{EvalContext, NamespaceResolver, Outcome, Resolved};

use crate::bundles::{BundleInfo, MessageBody};

/// Instance data key carrying the locale a message is rendered in.
///
/// Nested messages (`{msg:other}` inside a message template) inherit it.
pub const LOCALE_KEY: &str = "_locale";

/// Resolves `{bundle:method(args...)}` to the rendered message.
#[derive(Debug, Clone)]
pub struct MessageResolver {
    bundle: Arc<BundleInfo>,
}

impl MessageResolver {
    pub fn new(bundle: Arc<BundleInfo>) -> Self {
        Self { bundle }
    }
}

impl NamespaceResolver for MessageResolver {
    fn namespace(&self) -> &str {
        &self.bundle.name
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        let Some(message) = self.bundle.by_method(context.name()) else {
            return Outcome::Declined;
        };
        let arguments = context.arguments();
        if arguments.len() != message.params.len() {
            return Outcome::Resolved(Resolved::failed(anyhow!(
                "message {}:{} expects {} argument(s), got {}",
                self.bundle.name,
                message.method,
                message.params.len(),
                arguments.len()
            )));
        }
        let locale = context.data().get(LOCALE_KEY).and_then(|locale| locale.as_str().map(str::to_string));
        let id = match message.body(locale.as_deref()) {
            MessageBody::Constant(text) => return Outcome::value(text.to_string()),
            MessageBody::Template { id } => id,
        };
        let template = match context.engine().get_template(id) {
            Ok(template) => template,
            Err(error) => return Outcome::Resolved(Resolved::failed(error)),
        };
        let instance = template.instance();
        for (param, argument) in message.params.iter().zip(arguments) {
            instance.set(param.as_str(), argument.clone());
        }
        if let Some(locale) = locale {
            instance.set(LOCALE_KEY, locale);
        }
        Outcome::Resolved(Resolved::pending(async move {
            let rendered = instance.render_async().await?;
            Ok(Resolved::value(rendered))
        }))
    }
}
