use url::Url;

use super::tabular::IndexRecord;
use crate::error::{PassportError, Result};

const PATH_MARKER: &str = "/p/";
const QUERY_PARAM: &str = "uid";
const UID_COLUMN: &str = "uid";

/// Trim whitespace and surrounding slashes. Identifiers compare equal iff their
/// normalized forms do.
pub fn normalize_uid(uid: &str) -> String {
    uid.trim().trim_matches('/').to_string()
}

/// Pull the unit identifier out of a page location. Returns `""` when none is present.
///
/// A non-empty `uid` query parameter wins over the `/p/<uid>` path form.
pub fn extract_uid(location: &Url) -> String {
    if let Some(raw) = location
        .query_pairs()
        .find(|(k, _)| k == QUERY_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
    {
        return normalize_uid(&decode_lossy(&raw));
    }

    let path = location.path();
    let Some(idx) = path.find(PATH_MARKER) else {
        return String::new();
    };

    let rest = &path[idx + PATH_MARKER.len()..];
    let rest = rest
        .strip_prefix("index.html")
        .map(|r| r.strip_prefix('/').unwrap_or(r))
        .unwrap_or(rest);
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return String::new();
    }

    normalize_uid(&decode_lossy(rest))
}

/// Percent-decode, falling back to the raw text when the result is not valid UTF-8.
fn decode_lossy(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// First record whose `uid` column matches `uid` after normalization.
pub fn match_record<'a>(records: &'a [IndexRecord], uid: &str) -> Option<&'a IndexRecord> {
    let target = normalize_uid(uid);
    records
        .iter()
        .find(|r| normalize_uid(r.text(UID_COLUMN)) == target)
}

/// Turn user input into a page location under `base`.
///
/// Absolute `http`, `https` and `file` URLs pass through. `/p/...`, `p/...` and
/// `?uid=...` are joined onto the site root. Anything else is taken as a bare UID.
pub fn target_location(base: &Url, input: &str) -> Result<Url> {
    let input = input.trim();
    if let Ok(url) = Url::parse(input) {
        if matches!(url.scheme(), "http" | "https" | "file") {
            return Ok(url);
        }
    }

    let relative = input.trim_start_matches('/');
    if input.starts_with('?') || relative == "p" || relative.starts_with("p/") || relative.starts_with("p?") {
        return base
            .join(relative)
            .map_err(|e| PassportError::InvalidLocation(format!("{input}: {e}")));
    }

    absolute_passport_url(base, input)
}

/// Site root for a location: everything before the `/p/` marker, or the location's
/// directory when there is no marker.
pub fn site_base(location: &Url) -> Url {
    let mut base = location.clone();
    base.set_query(None);
    base.set_fragment(None);

    let path = location.path();
    let root = match path.find(PATH_MARKER) {
        Some(idx) => format!("{}/", &path[..idx]),
        None => match path.rfind('/') {
            Some(idx) => path[..=idx].to_string(),
            None => "/".to_string(),
        },
    };
    base.set_path(&root);
    base
}

fn encode_uid_path(uid: &str) -> String {
    uid.split('/')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Directory of the passport page. Document references are resolved against it.
pub fn passport_page(site_base: &Url) -> Result<Url> {
    site_base
        .join("p/")
        .map_err(|e| PassportError::InvalidLocation(format!("{site_base}: {e}")))
}

/// Relative link from the site root to a unit's passport page.
pub fn passport_link(uid: &str) -> String {
    format!("./p/{}", encode_uid_path(uid))
}

/// Absolute passport page URL under `base`.
pub fn absolute_passport_url(base: &Url, uid: &str) -> Result<Url> {
    base.join(&format!("p/{}", encode_uid_path(uid)))
        .map_err(|e| PassportError::InvalidLocation(format!("{uid}: {e}")))
}

/// Resolve a document reference against the page it was found on. Absolute
/// `http(s)://` references are used as-is.
pub fn resolve_reference(page: &Url, reference: &str) -> Result<Url> {
    page.join(reference.trim())
        .map_err(|e| PassportError::InvalidLocation(format!("{reference}: {e}")))
}
