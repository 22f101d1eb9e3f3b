//! Node identifiers
//!
//! Node IDs double as file names (`{type_dir}/{id}.md`), so they must be
//! non-blank and free of whitespace and path separators.
//!
//! Generated IDs have the form `{title-slug}-{7-char-hash}`
//! (e.g., `power-supply-7f2b4c1`). The hash is derived from title + creation
//! timestamp, so the same title created twice still gets distinct IDs.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Longest slug prefix kept from a title
const MAX_SLUG_LEN: usize = 40;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("ID must not be blank")]
    Blank,

    #[error("ID must not contain whitespace: '{0}'")]
    Whitespace(String),

    #[error("ID must not contain path separators: '{0}'")]
    PathSeparator(String),
}

/// Generates a 7-character hash from title and timestamp
fn generate_hash(title: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", title, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

/// Lowercases a title and collapses every run of non-alphanumerics into `-`
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }

        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    slug
}

/// Generates a fresh node ID from a title and creation time
pub fn generate_id(title: &str, timestamp: DateTime<Utc>) -> String {
    let slug = slugify(title);
    let hash = generate_hash(title, timestamp);

    if slug.is_empty() {
        format!("n-{}", hash)
    } else {
        format!("{}-{}", slug, hash)
    }
}

/// Checks that an ID can be used as a file name
pub fn check_id(id: &str) -> Result<(), IdError> {
    if id.trim().is_empty() {
        return Err(IdError::Blank);
    }
    if id.chars().any(char::is_whitespace) {
        return Err(IdError::Whitespace(id.to_string()));
    }
    if id.contains('/') || id.contains('\\') {
        return Err(IdError::PathSeparator(id.to_string()));
    }
    Ok(())
}
