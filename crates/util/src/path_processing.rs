use std::path::PathBuf;

use dirs_next::home_dir;

/// Resolves a configuration path given by the user.
///
/// Surrounding whitespace is ignored and a leading `~` (alone, or followed by
/// `/` or `\`) is replaced by the home directory when one is known.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let Some(rest) = trimmed.strip_prefix('~') else {
        return PathBuf::from(trimmed);
    };
    let relative = match rest.chars().next() {
        None => "",
        Some('/' | '\\') => &rest[1..],
        Some(_) => return PathBuf::from(trimmed),
    };
    match home_dir() {
        Some(home) if relative.is_empty() => home,
        Some(home) => home.join(relative),
        None => PathBuf::from(trimmed),
    }
}
