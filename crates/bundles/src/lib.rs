//! Message bundles for the Stencil engine.
//!
//! A bundle is a named set of messages, each a small template with declared
//! parameters. Building [`MessageBundles`] registers every message template on
//! an engine under `<bundle>_<key>` (or `<bundle>_<locale>_<key>` for
//! localized overrides) and installs a namespace resolver per bundle so other
//! templates can call messages as `{msg:hello(user.name)}`.

pub mod bundles;
pub mod error;
pub mod io;
pub mod model;
pub mod resolver;
pub mod validation;

pub use bundles::{BundleInfo, MessageBody, MessageBundles, MessageBundlesBuilder, MessageInfo, template_id};
pub use error::BundleError;
pub use io::load_bundle_file;
pub use model::{BundleDefinition, KeyStrategy, MessageDefinition};
pub use resolver::{LOCALE_KEY, MessageResolver};
pub use validation::IncorrectExpression;
