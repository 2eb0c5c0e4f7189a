use anyhow::{Context, anyhow};
use serde_json::Value;
use tracing::debug;

use super::retry::{RetryPolicy, is_rate_limited, retry_after};
use super::{TranslateFuture, TranslationProvider};

pub const GOOGLE_TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Keyless Google Translate (`client=gtx`) endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    client: reqwest::Client,
    endpoint: String,
    source_lang: String,
    retry: RetryPolicy,
}

impl GoogleTranslate {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: GOOGLE_TRANSLATE_ENDPOINT.to_string(),
            source_lang: "auto".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if !endpoint.trim().is_empty() {
            self.endpoint = endpoint;
        }
        self
    }

    pub fn with_source_lang(mut self, source_lang: impl Into<String>) -> Self {
        let source_lang = source_lang.into();
        if !source_lang.trim().is_empty() {
            self.source_lang = source_lang;
        }
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for GoogleTranslate {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationProvider for GoogleTranslate {
    fn name(&self) -> &str {
        "google"
    }

    fn translate<'a>(&'a self, text: &'a str, target_lang: &'a str) -> TranslateFuture<'a> {
        Box::pin(async move {
            if text.trim().is_empty() {
                return Ok(String::new());
            }
            let mut attempt = 0usize;
            let mut delay = self.retry.base_delay;
            loop {
                attempt += 1;
                let response = self
                    .client
                    .get(&self.endpoint)
                    .query(&[
                        ("client", "gtx"),
                        ("sl", self.source_lang.as_str()),
                        ("tl", target_lang),
                        ("dt", "t"),
                        ("q", text),
                    ])
                    .send()
                    .await
                    .with_context(|| "failed to reach Google Translate")?;

                let status = response.status();
                let retry_after = retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                if status.is_success() {
                    let translated = parse_translation(&body)?;
                    debug!("google: {:?} -> {:?}", text, translated);
                    return Ok(translated);
                }
                if is_rate_limited(status, &body) && self.retry.should_retry(attempt) {
                    delay = self.retry.wait("Google Translate", attempt, delay, retry_after).await;
                    continue;
                }
                return Err(anyhow!(
                    "Google Translate error ({}): {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ));
            }
        })
    }
}

/// The response is `[[["segment", "source", ...], ...], ...]`; the translated
/// segments are the first element of each inner array.
fn parse_translation(body: &str) -> anyhow::Result<String> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|err| anyhow!("failed to parse Google Translate response JSON: {}", err))?;
    let segments = payload
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("no translation segments returned from Google Translate"))?;
    let parts = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    if parts.is_empty() {
        return Err(anyhow!("empty translation returned from Google Translate"));
    }
    Ok(parts.join(" "))
}
