//! Serializable bundle definitions as written in bundle files.

use heck::{ToKebabCase, ToSnakeCase};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One bundle file: a default bundle or a localized override of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDefinition {
    /// Bundle name, also the namespace used in templates (`{msg:hello}`).
    pub bundle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Marks this file as a localized override of the default bundle of the same name.
    #[serde(default)]
    pub localized: bool,
    #[serde(default)]
    pub default_key: KeyStrategy,
    /// Messages keyed by method name, in declaration order.
    #[serde(default)]
    pub messages: IndexMap<String, MessageDefinition>,
}

impl BundleDefinition {
    pub fn new(bundle: impl Into<String>) -> Self {
        Self {
            bundle: bundle.into(),
            locale: None,
            localized: false,
            default_key: KeyStrategy::default(),
            messages: IndexMap::new(),
        }
    }

    /// Localized override of the default bundle `bundle`.
    pub fn localized(bundle: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            locale: Some(locale.into()),
            localized: true,
            ..Self::new(bundle)
        }
    }

    /// Adds a message; builder-style for in-memory definitions.
    pub fn message(mut self, method: impl Into<String>, template: impl Into<String>, params: &[&str]) -> Self {
        self.messages.insert(
            method.into(),
            MessageDefinition {
                template: template.into(),
                params: params.iter().map(|param| param.to_string()).collect(),
                key: None,
            },
        );
        self
    }

    /// Message key for `method`: the explicit key, else the default strategy.
    pub fn key_for(&self, method: &str) -> String {
        match self.messages.get(method).and_then(|message| message.key.clone()) {
            Some(key) => key,
            None => self.default_key.apply(method),
        }
    }
}

/// One message of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDefinition {
    pub template: String,
    /// Parameter names in call order.
    #[serde(default)]
    pub params: Vec<String>,
    /// Explicit key overriding the bundle's default key strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// How message keys are derived from method names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// The method name unchanged.
    #[default]
    ElementName,
    /// `helloName` becomes `hello-name`.
    HyphenatedElementName,
    /// `helloName` becomes `hello_name`.
    UnderscoredElementName,
}

impl KeyStrategy {
    pub fn apply(self, method: &str) -> String {
        match self {
            Self::ElementName => method.to_string(),
            Self::HyphenatedElementName => method.to_kebab_case(),
            Self::UnderscoredElementName => method.to_snake_case(),
        }
    }
}
