//! Input validation for new and edited links.

use linktrack_core::{FieldUpdate, ShortCode, ShortenerError};
use url::Url;

type Result<T> = std::result::Result<T, ShortenerError>;

pub const MAX_URL_CHARS: usize = 2048;
pub const MAX_LABEL_CHARS: usize = 50;
pub const MAX_CAMPAIGN_CHARS: usize = 100;

/// Path segments served by the gateway itself. A code equal to one of these
/// would be shadowed by the route.
pub const RESERVED_CODES: &[&str] = &["links", "health", "stats", "qr", "bulk"];

/// Returns `true` if `code` collides with a gateway route, ignoring case.
pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(code))
}

/// Trims and validates a target URL.
///
/// Only surrounding whitespace is removed; the URL is otherwise stored
/// exactly as given.
pub fn target_url(raw: &str) -> Result<String> {
    let url = raw.trim();

    if url.is_empty() {
        return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
    }

    // stored URLs are sent back verbatim in the Location header
    if url.chars().any(char::is_control) {
        return Err(ShortenerError::InvalidUrl(
            "URL must not contain control characters".to_string(),
        ));
    }

    if url.chars().count() > MAX_URL_CHARS {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL must be at most {MAX_URL_CHARS} characters"
        )));
    }

    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(ShortenerError::InvalidUrl(
            "URL must start with http:// or https://".to_string(),
        ));
    }

    let parsed = Url::parse(url)
        .map_err(|e| ShortenerError::InvalidUrl(format!("URL could not be parsed: {e}")))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ShortenerError::InvalidUrl("URL must have a host".to_string()));
    }

    Ok(url.to_string())
}

/// Trims an optional free-text field; blank values become `None`.
pub fn optional_text(value: Option<String>, field: &str, max_chars: usize) -> Result<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };

    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    if value.chars().count() > max_chars {
        return Err(ShortenerError::InvalidInput(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }

    Ok(Some(value.to_string()))
}

/// Applies [`optional_text`] to an edit. Setting a blank value clears the field.
pub fn text_update(
    update: FieldUpdate<String>,
    field: &str,
    max_chars: usize,
) -> Result<FieldUpdate<String>> {
    match update {
        FieldUpdate::Set(value) => Ok(match optional_text(Some(value), field, max_chars)? {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Clear,
        }),
        other => Ok(other),
    }
}

/// Parses a caller-chosen code.
pub fn custom_code(raw: &str) -> Result<ShortCode> {
    let code = ShortCode::new(raw.trim())?;

    if is_reserved(code.as_str()) {
        return Err(ShortenerError::InvalidShortCode(format!(
            "'{code}' is reserved"
        )));
    }

    Ok(code)
}
