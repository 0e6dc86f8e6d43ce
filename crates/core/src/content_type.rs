//! Content-Type inference for uploaded keys

/// Type used when the extension is missing or unknown
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Guess the MIME type of an object from its key's extension
///
/// Molecule formats (`chemical/*`, e.g. `.xyz`) count as unrecognised.
pub fn content_type_for(key: &str) -> &'static str {
    match mime_guess::from_path(key).first_raw() {
        Some(mime) if !mime.starts_with("chemical/") => mime,
        _ => DEFAULT_CONTENT_TYPE,
    }
}
