use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

mod google;
mod retry;

pub use google::{GOOGLE_TRANSLATE_ENDPOINT, GoogleTranslate};
pub use retry::RetryPolicy;

pub type TranslateFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Translation collaborator. Failures are handled by the caller, which keeps
/// the source text.
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// False for providers that hand the input back untouched.
    fn translates(&self) -> bool {
        true
    }

    fn translate<'a>(&'a self, text: &'a str, target_lang: &'a str) -> TranslateFuture<'a>;
}

/// Returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

impl TranslationProvider for PassthroughTranslator {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn translates(&self) -> bool {
        false
    }

    fn translate<'a>(&'a self, text: &'a str, _target_lang: &'a str) -> TranslateFuture<'a> {
        Box::pin(async move { Ok(text.to_string()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_keeps_text() {
        let out = PassthroughTranslator.translate("สวัสดี", "en").await.unwrap();
        assert_eq!(out, "สวัสดี");
        assert!(!PassthroughTranslator.translates());
    }
}
