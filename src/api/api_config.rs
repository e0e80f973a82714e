use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use url::Url;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl ApiConfig {
    const DEFAULT_BASE_URL: &'static str = "http://localhost:8000/api";
    const DEFAULT_TIMEOUT_MS: u64 = 10_000;

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let base_url = present("FLOORWATCH_API_URL").unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string());

        let request_timeout = match present("FLOORWATCH_REQUEST_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("FLOORWATCH_REQUEST_TIMEOUT_MS is not a number: {raw}"))?,
            None => Self::DEFAULT_TIMEOUT_MS,
        };

        Self::new(
            &base_url,
            present("FLOORWATCH_API_TOKEN"),
            Duration::from_millis(request_timeout),
        )
    }

    pub fn new(base_url: &str, token: Option<String>, request_timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .with_context(|| format!("invalid API base url: {base_url}"))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("API base url must be http or https: {base_url}");
        }
        if request_timeout.is_zero() {
            bail!("request timeout must be > 0");
        }

        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            token,
            request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        move |key| vars.get(key).cloned()
    }

    #[test]
    fn falls_back_to_local_backend() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.base_url, "http://localhost:8000/api");
        assert_eq!(config.token, None);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_overrides_and_strips_trailing_slash() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("FLOORWATCH_API_URL", "https://pos.example.com/api/"),
            ("FLOORWATCH_API_TOKEN", "secret"),
            ("FLOORWATCH_REQUEST_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://pos.example.com/api");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.request_timeout, Duration::from_millis(2_500));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("FLOORWATCH_API_URL", "  "),
            ("FLOORWATCH_API_TOKEN", ""),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8000/api");
        assert_eq!(config.token, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ApiConfig::from_lookup(lookup(&[("FLOORWATCH_API_URL", "not a url")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("FLOORWATCH_API_URL", "ftp://host/api")])).is_err());
        assert!(
            ApiConfig::from_lookup(lookup(&[("FLOORWATCH_REQUEST_TIMEOUT_MS", "soon")])).is_err()
        );
        assert!(ApiConfig::from_lookup(lookup(&[("FLOORWATCH_REQUEST_TIMEOUT_MS", "0")])).is_err());
    }
}
