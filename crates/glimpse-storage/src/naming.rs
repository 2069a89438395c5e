//! File naming for transient storage.
//!
//! Stored names have the form `{token}_{sanitized name}` where the token is a
//! random UUID in simple (32 hex character) form.

use uuid::Uuid;

const MAX_FILENAME_LENGTH: usize = 200;
/// Longer suffixes are not treated as extensions
const MAX_EXTENSION_LENGTH: usize = 16;
const FALLBACK_NAME: &str = "file";

/// Reduce a caller-supplied name to a single safe path component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become `_`
/// and leading dots are stripped so the result is never hidden or relative.
/// The extension always survives: long names lose characters from the stem,
/// and a name that is only an extension (`.jpg`) gets the stem `file`.
pub fn sanitize_filename(name: &str) -> String {
    let last_component = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();

    let sanitized: String = last_component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let (stem, extension) = match sanitized.rsplit_once('.') {
        Some((stem, extension))
            if !extension.is_empty() && extension.len() <= MAX_EXTENSION_LENGTH =>
        {
            (stem, Some(extension))
        }
        _ => (sanitized.as_str(), None),
    };

    let stem = stem.trim_start_matches('.');

    match extension {
        Some(extension) => {
            let budget = MAX_FILENAME_LENGTH - extension.len() - 1;
            let stem: String = stem.chars().take(budget).collect();
            let stem = if stem.is_empty() { FALLBACK_NAME } else { stem.as_str() };
            format!("{}.{}", stem, extension)
        }
        None => {
            let name: String = stem.chars().take(MAX_FILENAME_LENGTH).collect();
            if name.len() < 3 {
                FALLBACK_NAME.to_string()
            } else {
                name
            }
        }
    }
}

/// Build a collision-free stored name for `name`
pub fn unique_file_name(name: &str) -> String {
    format!("{}_{}", Uuid::new_v4().simple(), sanitize_filename(name))
}
