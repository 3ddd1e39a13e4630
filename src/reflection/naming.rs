//! File naming rules
//!
//! Names are NFC-normalized. The last `.` splits a name from its extension unless it is the
//! first character, so `.env` is a name without an extension.

use unicode_normalization::UnicodeNormalization;

/// Normalize a user-supplied name segment
pub fn normalize(name: &str) -> String {
    name.nfc().collect()
}

/// Split a name into stem and extension
pub fn split(name: &str) -> (String, Option<String>) {
    let name = normalize(name);
    match name.rfind('.') {
        Some(index) if index > 0 && index + 1 < name.len() => {
            let extension = name[index + 1..].to_string();
            (name[..index].to_string(), Some(extension))
        }
        _ => (name, None),
    }
}

/// Join a stem and an optional extension
pub fn file_name(stem: &str, extension: Option<&str>) -> String {
    match extension.map(|ext| ext.trim_start_matches('.')) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
        _ => stem.to_string(),
    }
}

/// Replace any extension on `name` with `extension`
pub fn with_extension(name: &str, extension: Option<&str>) -> String {
    match extension {
        Some(_) => {
            let (stem, _) = split(name);
            file_name(&stem, extension)
        }
        None => normalize(name),
    }
}

/// Whether `name` can be used as a single path segment
pub fn is_valid_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
