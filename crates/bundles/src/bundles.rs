//! Assembly of bundle definitions into engine templates and namespaces.

use std::{
    collections::HashMap,
    path::Path,
    sync::Arc,
};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use stencil_engine::{Engine, EngineBuilder, Template};
use tracing::debug;

use crate::{
    BundleError,
    io::load_bundle_file,
    model::BundleDefinition,
    resolver::{LOCALE_KEY, MessageResolver},
    validation::{IncorrectExpression, validate},
};

static BUNDLE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-zA-Z0-9_]*$").expect("bundle name regex should compile"));

/// Content of one message in one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Text without any placeholder; rendered as-is.
    Constant(Arc<str>),
    /// Registered engine template.
    Template { id: String },
}

/// One message of a bundle with all of its localized bodies.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub method: String,
    pub key: String,
    pub params: Vec<String>,
    pub default: MessageBody,
    pub localized: HashMap<String, MessageBody>,
}

impl MessageInfo {
    /// Body for `locale`, falling back to the default bundle.
    pub fn body(&self, locale: Option<&str>) -> &MessageBody {
        locale.and_then(|locale| self.localized.get(locale)).unwrap_or(&self.default)
    }
}

/// A default bundle merged with its localized overrides.
#[derive(Debug, Clone)]
pub struct BundleInfo {
    pub name: String,
    pub default_locale: Option<String>,
    pub locales: Vec<String>,
    /// Messages keyed by method name.
    pub messages: IndexMap<String, MessageInfo>,
}

impl BundleInfo {
    pub fn by_method(&self, method: &str) -> Option<&MessageInfo> {
        self.messages.get(method)
    }

    pub fn by_key(&self, key: &str) -> Option<&MessageInfo> {
        self.messages.values().find(|message| message.key == key)
    }
}

/// Template id of a message: `<bundle>_<key>` or `<bundle>_<locale>_<key>`.
pub fn template_id(bundle: &str, locale: Option<&str>, key: &str) -> String {
    match locale {
        Some(locale) => format!("{bundle}_{locale}_{key}"),
        None => format!("{bundle}_{key}"),
    }
}

/// Registered message bundles together with the engine rendering them.
#[derive(Debug, Clone)]
pub struct MessageBundles {
    engine: Engine,
    bundles: IndexMap<String, Arc<BundleInfo>>,
}

impl MessageBundles {
    pub fn builder() -> MessageBundlesBuilder {
        MessageBundlesBuilder::default()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn bundle(&self, name: &str) -> Option<&BundleInfo> {
        self.bundles.get(name).map(Arc::as_ref)
    }

    pub fn bundles(&self) -> impl Iterator<Item = &BundleInfo> {
        self.bundles.values().map(Arc::as_ref)
    }

    /// Looks up the template registered under a message template id.
    pub fn get_template(&self, id: &str) -> Result<Template, BundleError> {
        Ok(self.engine.get_template(id)?)
    }

    /// Renders message `key` of `bundle` with positional `args`.
    ///
    /// `locale` selects a localized body when one exists for the message.
    pub fn message(&self, bundle: &str, locale: Option<&str>, key: &str, args: &[Value]) -> Result<String, BundleError> {
        let info = self.bundles.get(bundle).ok_or_else(|| BundleError::UnknownBundle { bundle: bundle.to_string() })?;
        let message = info.by_key(key).ok_or_else(|| BundleError::MissingTemplate {
            bundle: bundle.to_string(),
            key: key.to_string(),
        })?;
        if message.params.len() != args.len() {
            return Err(BundleError::ArgumentCount {
                bundle: bundle.to_string(),
                key: key.to_string(),
                expected: message.params.len(),
                actual: args.len(),
            });
        }
        match message.body(locale) {
            MessageBody::Constant(text) => Ok(text.to_string()),
            MessageBody::Template { id } => {
                let instance = self.get_template(id)?.instance();
                for (param, arg) in message.params.iter().zip(args) {
                    instance.set(param.as_str(), arg.clone());
                }
                if let Some(locale) = locale {
                    instance.set(LOCALE_KEY, locale);
                }
                Ok(instance.render()?)
            }
        }
    }

    /// Checks every message template and every use of a bundle namespace.
    pub fn validate(&self) -> Vec<IncorrectExpression> {
        validate(&self.engine, self.bundles.values().map(Arc::as_ref))
    }
}

/// Collects bundle definitions before the engine is built.
#[derive(Debug, Default)]
pub struct MessageBundlesBuilder {
    definitions: Vec<BundleDefinition>,
    templates: Vec<(String, String)>,
}

impl MessageBundlesBuilder {
    pub fn add_bundle(mut self, definition: BundleDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn load_file(self, path: &Path) -> Result<Self, BundleError> {
        Ok(self.add_bundle(load_bundle_file(path)?))
    }

    /// Registers an ordinary template alongside the bundles, e.g. one that
    /// uses a bundle namespace.
    pub fn add_template(mut self, id: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.push((id.into(), source.into()));
        self
    }

    /// Registers one namespace resolver per bundle on `engine`, builds it, and
    /// registers every message template.
    pub fn build(self, engine: EngineBuilder) -> Result<MessageBundles, BundleError> {
        let (bundles, sources) = assemble(self.definitions)?;
        let engine = bundles
            .values()
            .fold(engine, |builder, bundle| builder.add_namespace_resolver(MessageResolver::new(Arc::clone(bundle))))
            .build();
        for (id, source) in sources.iter().chain(&self.templates) {
            engine.register(id.as_str(), source)?;
        }
        debug!(bundles = bundles.len(), templates = sources.len(), "built message bundles");
        Ok(MessageBundles { engine, bundles })
    }
}

type Assembled = (IndexMap<String, Arc<BundleInfo>>, Vec<(String, String)>);

fn assemble(definitions: Vec<BundleDefinition>) -> Result<Assembled, BundleError> {
    let (defaults, localized): (Vec<_>, Vec<_>) = definitions.into_iter().partition(|definition| !definition.localized);
    let mut bundles: IndexMap<String, BundleInfo> = IndexMap::new();
    let mut sources = Vec::new();

    for definition in defaults {
        validate_name(&definition.bundle)?;
        if bundles.contains_key(&definition.bundle) {
            return Err(BundleError::DuplicateBundle {
                bundle: definition.bundle,
                locale: definition.locale.unwrap_or_else(|| "default".into()),
            });
        }
        let mut messages: IndexMap<String, MessageInfo> = IndexMap::new();
        for (method, message) in &definition.messages {
            let key = definition.key_for(method);
            if messages.values().any(|existing| existing.key == key) {
                return Err(BundleError::DuplicateKey {
                    bundle: definition.bundle.clone(),
                    key,
                });
            }
            let default = body(&definition.bundle, None, &key, &message.template, &mut sources);
            messages.insert(
                method.clone(),
                MessageInfo {
                    method: method.clone(),
                    key,
                    params: message.params.clone(),
                    default,
                    localized: HashMap::new(),
                },
            );
        }
        bundles.insert(
            definition.bundle.clone(),
            BundleInfo {
                name: definition.bundle,
                default_locale: definition.locale,
                locales: Vec::new(),
                messages,
            },
        );
    }

    for definition in localized {
        let Some(locale) = definition.locale.clone() else {
            return Err(BundleError::MissingLocale { bundle: definition.bundle });
        };
        let Some(bundle) = bundles.get_mut(&definition.bundle) else {
            return Err(BundleError::MissingDefaultBundle {
                bundle: definition.bundle,
                locale,
            });
        };
        if bundle.default_locale.as_deref() == Some(locale.as_str()) || bundle.locales.contains(&locale) {
            return Err(BundleError::DuplicateBundle {
                bundle: definition.bundle,
                locale,
            });
        }
        for (method, message) in &definition.messages {
            let Some(info) = bundle.messages.get_mut(method) else {
                return Err(BundleError::UnknownLocalizedMessage {
                    bundle: definition.bundle.clone(),
                    locale,
                    method: method.clone(),
                });
            };
            let localized_body = body(&definition.bundle, Some(&locale), &info.key, &message.template, &mut sources);
            info.localized.insert(locale.clone(), localized_body);
        }
        bundle.locales.push(locale);
    }

    let bundles = bundles.into_iter().map(|(name, bundle)| (name, Arc::new(bundle))).collect();
    Ok((bundles, sources))
}

fn body(bundle: &str, locale: Option<&str>, key: &str, template: &str, sources: &mut Vec<(String, String)>) -> MessageBody {
    if !template.contains('}') {
        return MessageBody::Constant(Arc::from(template));
    }
    let id = template_id(bundle, locale, key);
    sources.push((id.clone(), template.to_string()));
    MessageBody::Template { id }
}

fn validate_name(name: &str) -> Result<(), BundleError> {
    if BUNDLE_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(BundleError::InvalidName { name: name.to_string() })
    }
}
