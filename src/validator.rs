use crate::errors::ValidationError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref REFERENCE_PATTERNS: [Regex; 3] = [
        // bare domain path
        Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.?be)/.+").unwrap(),
        // watch?v= query form
        Regex::new(r"^https?://(www\.)?youtube\.com/watch\?v=[\w-]+").unwrap(),
        // short link
        Regex::new(r"^https?://youtu\.be/[\w-]+").unwrap(),
    ];
}

/// Returns true if `reference` looks like a link to a YouTube video.
pub fn validate(reference: &str) -> bool {
    check(reference).is_ok()
}

/// Like [`validate`], but says why a reference was rejected and hands back the trimmed form.
pub fn check(reference: &str) -> Result<&str, ValidationError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ValidationError::Empty);
    }

    if REFERENCE_PATTERNS.iter().any(|p| p.is_match(reference)) {
        Ok(reference)
    } else {
        Err(ValidationError::Unrecognized(reference.to_string()))
    }
}
