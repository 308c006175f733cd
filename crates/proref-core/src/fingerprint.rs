//! Content fingerprint used to detect ticket text changes.

/// MD5 hex digest of `title|description`, absent parts treated as empty.
///
/// Only used for change detection, never for integrity.
pub fn compute_content_hash(title: Option<&str>, description: Option<&str>) -> String {
    let content = format!("{}|{}", title.unwrap_or(""), description.unwrap_or(""));
    format!("{:x}", md5::compute(content.as_bytes()))
}
