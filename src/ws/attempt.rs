//! Single-attempt sequencing: params resolution, URL composition, and
//! transport open, per the five-step sequence this crate's Socket Core
//! drives on every (re)connection attempt. Grounded on the per-attempt
//! bookkeeping in the teacher's `ws::connection::connection_loop`, split out
//! into its own unit since the teacher's loop folds attempt sequencing and
//! the outer retry loop together, while this crate's spec treats them as
//! distinct concerns (attempt sequencing is five explicit steps; retry is a
//! separate delay policy in [`crate::retry`]).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::Error;

/// Resolved key/value connection parameters, percent-encoded and appended
/// to the connection URL's query string.
pub type Params = BTreeMap<String, String>;

/// Terminal sentinel a [`ParamsProvider`] returns to stop the socket from
/// retrying entirely, as opposed to an ordinary error which only fails the
/// current attempt. Kept as a distinct type rather than folded into
/// `WsError` so a params provider can't accidentally produce a
/// non-terminal-looking terminal condition.
#[derive(Debug)]
pub struct StopRetry(pub Option<Error>);

/// Supplies connection parameters (credentials, tokens, anything resolved
/// asynchronously) for each connection attempt.
#[async_trait]
pub trait ParamsProvider: Send + Sync + 'static {
    async fn resolve(&self) -> Result<Params, StopRetry>;
}

/// A [`ParamsProvider`] that always resolves to an empty parameter set,
/// for sockets that need no per-attempt params.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParams;

#[async_trait]
impl ParamsProvider for NoParams {
    async fn resolve(&self) -> Result<Params, StopRetry> {
        Ok(Params::new())
    }
}

/// Server close codes treated as fatal: a code in this set moves the socket
/// straight to `Disconnected` instead of scheduling a reconnect attempt.
/// Any code not in this set reconnects. Normalizes a single code or a list
/// into one shape so callers never have to match on which form was
/// configured.
#[derive(Debug, Clone, Default)]
pub struct CloseCodes(Vec<u16>);

impl CloseCodes {
    #[must_use]
    pub fn contains(&self, code: u16) -> bool {
        self.0.contains(&code)
    }
}

impl From<u16> for CloseCodes {
    fn from(code: u16) -> Self {
        Self(vec![code])
    }
}

impl From<Vec<u16>> for CloseCodes {
    fn from(codes: Vec<u16>) -> Self {
        Self(codes)
    }
}

/// Merge `params` onto `base`'s query string using `&`, percent-encoding
/// each key/value pair, the default query-merge resolution.
pub fn compose_url(base: &Url, params: &Params) -> Url {
    if params.is_empty() {
        return base.clone();
    }

    let mut url = base.clone();
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    url
}

/// User override for building the final attempt URL, taking precedence
/// over the default query-merge in [`compose_url`]. Mirrors
/// [`crate::retry::GetDelay`]'s shape: the zero-based retry count plus the
/// error that triggered the retry, alongside the configured base URL and
/// the resolved params for this attempt.
pub type UrlBuilder = Arc<dyn Fn(&Url, &Params, u32, Option<&Error>) -> Url + Send + Sync>;

/// Build the URL for one connection attempt: `url_builder` if configured,
/// otherwise the default query-merge.
#[must_use]
pub fn build_attempt_url(
    base: &Url,
    params: &Params,
    retry_count: u32,
    last_error: Option<&Error>,
    url_builder: Option<&UrlBuilder>,
) -> Url {
    match url_builder {
        Some(builder) => builder(base, params, retry_count, last_error),
        None => compose_url(base, params),
    }
}

/// How long to wait on each step of a connection attempt before treating it
/// as failed.
#[derive(Debug, Clone, Copy)]
pub struct AttemptTimeouts {
    pub params_timeout: Duration,
    pub connection_timeout: Duration,
}

impl Default for AttemptTimeouts {
    fn default() -> Self {
        Self {
            params_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_url_merges_with_ampersand() {
        let base = Url::parse("wss://example.com/socket?existing=1").unwrap();
        let mut params = Params::new();
        params.insert("token".to_owned(), "abc".to_owned());

        let composed = compose_url(&base, &params);

        assert_eq!(composed.as_str(), "wss://example.com/socket?existing=1&token=abc");
    }

    #[test]
    fn compose_url_with_no_params_is_unchanged() {
        let base = Url::parse("wss://example.com/socket").unwrap();
        let composed = compose_url(&base, &Params::new());
        assert_eq!(composed.as_str(), base.as_str());
    }

    #[test]
    fn url_builder_overrides_the_default_query_merge() {
        let base = Url::parse("wss://example.com/socket").unwrap();
        let mut params = Params::new();
        params.insert("token".to_owned(), "abc".to_owned());

        let builder: UrlBuilder = Arc::new(|base, _params, retry_count, _last_error| {
            let mut url = base.clone();
            url.set_path(&format!("/attempt-{retry_count}"));
            url
        });

        let composed = build_attempt_url(&base, &params, 2, None, Some(&builder));
        assert_eq!(composed.as_str(), "wss://example.com/attempt-2");
    }

    #[test]
    fn no_url_builder_falls_back_to_compose_url() {
        let base = Url::parse("wss://example.com/socket").unwrap();
        let mut params = Params::new();
        params.insert("token".to_owned(), "abc".to_owned());

        let composed = build_attempt_url(&base, &params, 0, None, None);
        assert_eq!(composed.as_str(), "wss://example.com/socket?token=abc");
    }

    #[test]
    fn close_codes_from_single_and_list() {
        let single: CloseCodes = 1008.into();
        assert!(single.contains(1008));
        assert!(!single.contains(1000));

        let list: CloseCodes = vec![1000, 1008].into();
        assert!(list.contains(1000));
        assert!(list.contains(1008));
        assert!(!list.contains(1011));
    }

    #[tokio::test]
    async fn no_params_resolves_empty() {
        let provider = NoParams;
        let params = provider.resolve().await.unwrap();
        assert!(params.is_empty());
    }
}
