use axum::extract::{Query, State};
use axum::http::Uri;
use axum::Json;
use url::Url;

use crate::error::{AppError, AppResult};
use crate::models::{Envelope, PreviewDto};
use crate::state::AppState;

pub const MISSING_URL_MESSAGE: &str = "You missed to set url query param.";
pub const BAD_SCHEME_MESSAGE: &str = "URL schema must be http or https.";

// ── URL normalization ──────────────────────────────────────────────────────

/// Validates the `url` query value and returns the string used both to fetch
/// the page and as the cache key.
///
/// A value without a scheme gets `http://` prepended. A scheme that does not
/// start with `http` is rejected. Otherwise the input is returned unchanged,
/// not re-serialized, so equal inputs always share one cache entry.
pub fn normalize_url(raw: &str) -> AppResult<String> {
    if raw.is_empty() {
        return Err(AppError::Validation(MISSING_URL_MESSAGE.into()));
    }

    let candidate = match Url::parse(raw) {
        Ok(parsed) if parsed.scheme().starts_with("http") => raw.to_string(),
        Ok(_) => return Err(AppError::Validation(BAD_SCHEME_MESSAGE.into())),
        Err(url::ParseError::RelativeUrlWithoutBase) => format!("http://{raw}"),
        Err(e) => return Err(AppError::Validation(e.to_string())),
    };

    Url::parse(&candidate).map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(candidate)
}

// ── Query params ───────────────────────────────────────────────────────────

/// Raw query pairs, kept in order so a repeated `url` resolves to its first
/// occurrence.
pub type QueryPairs = Vec<(String, String)>;

/// The first `url` value, or empty when the parameter is absent.
pub fn first_url(pairs: QueryPairs) -> String {
    pairs
        .into_iter()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value)
        .unwrap_or_default()
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /?url=<url>
///
/// Returns the page's Open Graph metadata wrapped in the response envelope.
pub async fn get_preview(
    State(state): State<AppState>,
    query: Option<Query<QueryPairs>>,
) -> AppResult<Json<Envelope<PreviewDto>>> {
    let raw = query.map(|Query(pairs)| first_url(pairs)).unwrap_or_default();
    let url = normalize_url(&raw)?;

    let data = state.previewer.preview(&url).await?;

    Ok(Json(Envelope::ok(PreviewDto { url, data })))
}

/// Fallback for every unmatched route.
pub async fn not_supported(uri: Uri) -> AppError {
    AppError::NotSupported(uri.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_message(raw: &str) -> String {
        match normalize_url(raw) {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error for {raw:?}, got {other:?}"),
        }
    }

    #[test]
    fn bare_host_gets_http_scheme() {
        assert_eq!(normalize_url("example.com").unwrap(), "http://example.com");
        assert_eq!(
            normalize_url("example.com/path?q=1").unwrap(),
            "http://example.com/path?q=1"
        );
    }

    #[test]
    fn http_and_https_pass_through_unchanged() {
        assert_eq!(
            normalize_url("https://example.com/a").unwrap(),
            "https://example.com/a"
        );
        assert_eq!(normalize_url("HTTP://Example.com").unwrap(), "HTTP://Example.com");
    }

    #[test]
    fn empty_value_is_rejected() {
        assert_eq!(validation_message(""), MISSING_URL_MESSAGE);
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        assert_eq!(validation_message("ftp://example.com"), BAD_SCHEME_MESSAGE);
        assert_eq!(validation_message("mailto:someone@example.com"), BAD_SCHEME_MESSAGE);
    }

    #[test]
    fn first_url_param_wins() {
        let pairs = vec![
            ("lang".to_string(), "en".to_string()),
            ("url".to_string(), "a.example".to_string()),
            ("url".to_string(), "b.example".to_string()),
        ];
        assert_eq!(first_url(pairs), "a.example");
        assert_eq!(first_url(vec![("q".into(), "x".into())]), "");
    }

    #[test]
    fn unparsable_url_reports_parser_error() {
        assert_eq!(validation_message("http://"), "empty host");
        assert!(!validation_message("exa mple.com").is_empty());
    }
}
