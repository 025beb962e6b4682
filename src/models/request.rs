use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Method, Url};

/// A fully formed request, independent of any client.
///
/// The same shape serves route matching (host-relative `url`) and dispatch
/// (absolute `url`).
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

// Stands in for the origin of host-relative URLs so they parse.
const RELATIVE_BASE: &str = "http://relative.invalid";

impl ProbeRequest {
    /// The URL parsed, with host-relative forms resolved against a
    /// placeholder origin.
    pub fn parsed_url(&self) -> Option<Url> {
        Url::parse(&self.url)
            .or_else(|_| Url::parse(RELATIVE_BASE).and_then(|base| base.join(&self.url)))
            .ok()
    }

    /// Path component without scheme, authority or query, still encoded.
    pub fn path(&self) -> String {
        self.parsed_url()
            .map(|url| url.path().to_string())
            .unwrap_or_else(|| "/".to_string())
    }

    /// Percent- and `+`-decoded `key=value` pairs of the query string.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.parsed_url()
            .map(|url| url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect())
            .unwrap_or_default()
    }

    pub fn has_authorization(&self) -> bool {
        self.headers.contains_key(AUTHORIZATION)
    }
}
