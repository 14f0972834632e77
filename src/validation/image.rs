use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use super::form::{Upload, IMAGE_FIELD};
use crate::error::FieldError;

const ALLOWED_EXTENSIONS: [&str; 2] = ["png", "jpg"];

/// Whether `filename` names a png or jpg image.
pub fn is_allowed(filename: &str) -> bool {
    Path::new(&filename.to_lowercase())
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext))
}

/// Error entry for an uploaded file with a disallowed extension.
pub fn check_image(image: Option<&Upload>) -> Option<FieldError> {
    let image = image?;
    if is_allowed(&image.filename) {
        return None;
    }
    Some(FieldError::new(
        IMAGE_FIELD,
        "type_error.image",
        "extension is not allowed. Please upload only .png or .jpg files.",
    ))
}

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_.-]").unwrap();
}

/// Reduces a client-supplied file name to a flat ASCII name safe to store.
pub fn secure_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_CHARS.replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn mime_from_name(filename: &str) -> &'static str {
    match Path::new(&filename.to_lowercase())
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
