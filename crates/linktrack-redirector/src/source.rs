//! Best-effort classification of where a click came from.

use linktrack_core::click::{DEFAULT_SOURCE, QR_SOURCE};
use std::collections::HashMap;
use url::Url;

/// Query parameters that carry an explicit source tag, in priority order.
pub const SOURCE_PARAMS: &[&str] = &["utm_source", "source", "src"];
/// Query parameter marking a visit that arrived through a QR code.
pub const QR_PARAM: &str = "qr";

const MAX_EXPLICIT_SOURCE_CHARS: usize = 32;

const SOCIAL_DOMAINS: &[(&str, &str)] = &[
    ("twitter.com", "twitter"),
    ("x.com", "twitter"),
    ("t.co", "twitter"),
    ("facebook.com", "facebook"),
    ("fb.com", "facebook"),
    ("instagram.com", "instagram"),
    ("linkedin.com", "linkedin"),
    ("lnkd.in", "linkedin"),
    ("youtube.com", "youtube"),
    ("youtu.be", "youtube"),
    ("tiktok.com", "tiktok"),
    ("line.me", "line"),
    ("reddit.com", "reddit"),
];

const SEARCH_ENGINES: &[&str] = &["google", "bing", "yahoo", "duckduckgo"];

const MAIL_DOMAINS: &[&str] = &["gmail.com", "outlook.com", "outlook.live.com"];
const MAIL_SUBDOMAINS: &[&str] = &["mail", "webmail", "outlook"];

/// Assigns a source tag to a visit.
///
/// An explicit tag in the query wins, then the QR marker, then the referrer
/// host. Without any signal the result is `"direct"`.
pub fn classify_source(referrer: Option<&str>, query: &HashMap<String, String>) -> String {
    if let Some(explicit) = SOURCE_PARAMS
        .iter()
        .filter_map(|param| query.get(*param))
        .find_map(|value| sanitize(value))
    {
        return explicit;
    }

    if query.contains_key(QR_PARAM) {
        return QR_SOURCE.to_string();
    }

    match referrer.map(str::trim).filter(|r| !r.is_empty()) {
        Some(referrer) => classify_referrer(referrer),
        None => DEFAULT_SOURCE.to_string(),
    }
}

fn classify_referrer(referrer: &str) -> String {
    let Some(host) = Url::parse(referrer)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
    else {
        return DEFAULT_SOURCE.to_string();
    };
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if let Some((_, platform)) = SOCIAL_DOMAINS
        .iter()
        .find(|(domain, _)| matches_domain(host, domain))
    {
        return (*platform).to_string();
    }

    let first_label = host.split('.').next().unwrap_or_default();
    if MAIL_SUBDOMAINS.contains(&first_label)
        || MAIL_DOMAINS.iter().any(|domain| matches_domain(host, domain))
    {
        return "email".to_string();
    }

    if let Some(engine) = SEARCH_ENGINES
        .iter()
        .find(|engine| host.split('.').any(|label| label == **engine))
    {
        return format!("search_{engine}");
    }

    format!("referral_{host}")
}

/// `true` if `host` is `domain` or one of its subdomains.
fn matches_domain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn sanitize(value: &str) -> Option<String> {
    let tag: String = value
        .trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_EXPLICIT_SOURCE_CHARS)
        .collect();

    (!tag.is_empty()).then_some(tag)
}
