use std::path::PathBuf;

use stencil_engine::EngineError;
use thiserror::Error;

/// Errors raised while loading, assembling or rendering message bundles.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Failed to read bundle file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid bundle file {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("Invalid bundle name '{name}': must start with a lowercase letter followed by letters, digits or underscores")]
    InvalidName { name: String },

    #[error("Duplicate message key '{key}' in bundle '{bundle}'")]
    DuplicateKey { bundle: String, key: String },

    #[error("Bundle '{bundle}' is defined more than once for locale '{locale}'")]
    DuplicateBundle { bundle: String, locale: String },

    #[error("Localized bundle '{bundle}' ({locale}) has no default bundle")]
    MissingDefaultBundle { bundle: String, locale: String },

    #[error("Localized bundle '{bundle}' declares no locale")]
    MissingLocale { bundle: String },

    #[error("Localized bundle '{bundle}' ({locale}) overrides unknown message '{method}'")]
    UnknownLocalizedMessage { bundle: String, locale: String, method: String },

    #[error("Unknown bundle '{bundle}'")]
    UnknownBundle { bundle: String },

    #[error("Message '{key}' not found in bundle '{bundle}'")]
    MissingTemplate { bundle: String, key: String },

    #[error("Message '{bundle}:{key}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        bundle: String,
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
