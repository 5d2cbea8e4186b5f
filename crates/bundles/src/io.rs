//! Bundle file loading.

use std::{fs, path::Path};

use crate::{
    BundleError,
    model::{BundleDefinition, MessageDefinition},
};

/// Loads a bundle definition from a file.
///
/// `.json` files are parsed as JSON and `.yaml`/`.yml` files as YAML. Any
/// other file is a localized messages file, see [`parse_messages_file`].
pub fn load_bundle_file(path: &Path) -> Result<BundleDefinition, BundleError> {
    let content = fs::read_to_string(path).map_err(|source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    let parsed = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content).map_err(|error| error.to_string()),
        Some("yaml" | "yml") => serde_yaml::from_str(&content).map_err(|error| error.to_string()),
        _ => parse_messages_file(path, &content),
    };
    parsed.map_err(|message| BundleError::Format {
        path: path.to_path_buf(),
        message,
    })
}

/// Parses a localized override written as `method=template` lines.
///
/// The file name is `<bundle>_<locale>.<ext>`; the bundle name ends at the
/// first underscore. Lines starting with `#` and blank lines are skipped.
fn parse_messages_file(path: &Path, content: &str) -> Result<BundleDefinition, String> {
    let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    let Some((bundle, locale)) = stem.split_once('_').filter(|(bundle, locale)| !bundle.is_empty() && !locale.is_empty()) else {
        return Err(format!("messages file name '{file_name}' must look like <bundle>_<locale>.<ext>"));
    };

    let mut definition = BundleDefinition::localized(bundle, locale);
    for (index, line) in content.lines().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let Some((method, template)) = line.split_once('=') else {
            return Err(format!("missing key/value separator on line {}", index + 1));
        };
        definition.messages.insert(
            method.trim().to_string(),
            MessageDefinition {
                template: template.trim().to_string(),
                params: Vec::new(),
                key: None,
            },
        );
    }
    Ok(definition)
}
