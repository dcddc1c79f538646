use url::Url;
use validator::ValidationError;

fn parse_base_url(s: &str) -> Result<String, &'static str> {
    let parsed = Url::parse(s.trim()).map_err(|_| "Invalid URL")?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err("URL must use http or https");
    }

    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err("Base URL can not have a query or fragment");
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// An http(s) URL that request paths can be appended to.
pub fn validate_http_base_url(url: &str) -> Result<(), ValidationError> {
    parse_base_url(url).map(|_| ()).map_err(ValidationError::new)
}

/// Parse an http(s) base URL, dropping any trailing slash.
#[must_use]
pub fn value_parser_http_base_url() -> impl clap::builder::TypedValueParser {
    move |s: &str| parse_base_url(s)
}
