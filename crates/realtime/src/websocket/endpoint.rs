//! Realtime endpoint derivation

use url::Url;

use crate::error::{RelayError, RelayResult};

/// Derive the realtime endpoint from the API base URL.
///
/// `http` becomes `ws` and `https` becomes `wss`; a trailing `/api` segment
/// is replaced by `/ws`, any other path gets `/ws` appended.
pub fn derive(api_url: &str) -> RelayResult<Url> {
    let mut url = Url::parse(api_url).map_err(|source| RelayError::InvalidApiUrl {
        url: api_url.to_string(),
        source,
    })?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(RelayError::UnsupportedScheme(other.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|_| RelayError::UnsupportedScheme(url.scheme().to_string()))?;

    let path = url.path().trim_end_matches('/');
    let path = match path.strip_suffix("/api") {
        Some(prefix) => format!("{prefix}/ws"),
        None => format!("{path}/ws"),
    };
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Attach the session credential as the `token` query parameter
pub fn with_token(endpoint: &Url, token: &str) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut().append_pair("token", token);
    url
}

/// Endpoint without its query string, safe to log
pub fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_suffix_replaced() {
        let url = derive("http://localhost:8000/api").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws");

        let url = derive("https://lotline.example/v1/api/").unwrap();
        assert_eq!(url.as_str(), "wss://lotline.example/v1/ws");
    }

    #[test]
    fn test_ws_appended_without_api_suffix() {
        let url = derive("https://lotline.example").unwrap();
        assert_eq!(url.as_str(), "wss://lotline.example/ws");

        let url = derive("http://localhost:8000/backend/apix").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/backend/apix/ws");
    }

    #[test]
    fn test_query_and_fragment_dropped() {
        let url = derive("http://localhost:8000/api?debug=1#top").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws");
    }

    #[test]
    fn test_invalid_urls_rejected() {
        assert!(matches!(
            derive("not a url"),
            Err(RelayError::InvalidApiUrl { .. })
        ));
        assert!(matches!(
            derive("ftp://files.example/api"),
            Err(RelayError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
    }

    #[test]
    fn test_token_is_encoded() {
        let endpoint = derive("http://localhost:8000/api").unwrap();
        let url = with_token(&endpoint, "a b&c");
        assert_eq!(url.as_str(), "ws://localhost:8000/ws?token=a+b%26c");
        assert_eq!(redacted(&url), "ws://localhost:8000/ws");
    }
}
