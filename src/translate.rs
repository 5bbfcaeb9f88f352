//! Translation collaborators.
//!
//! The pipeline only ever sees the [`Translate`] trait through
//! [`translate_or_original`], which is fail-open: a vendor that errors,
//! rate-limits or answers with nothing leaves the original text in place and
//! ingestion continues.
//!
//! # Backends
//!
//! - [`GoogleTranslate`]: the keyless `translate_a/single` endpoint (`client=gtx`)
//! - [`DeepLTranslate`]: DeepL's `/v2/translate` API (free or pro endpoint)
//! - [`Translator::Disabled`]: returns the input unchanged

use crate::utils::truncate_for_log;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Longest text sent to a vendor in one request, in characters.
pub const MAX_TRANSLATE_CHARS: usize = 4000;

/// The backend refused the request for quota reasons (HTTP 429, or DeepL's
/// 456 "quota exceeded"). Further requests in the same session will fail too.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("translation backend rate-limited the client (HTTP {status})")]
pub struct RateLimited {
    pub status: u16,
}

fn check_rate_limit(response: &Response) -> Result<(), RateLimited> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 456 {
        return Err(RateLimited {
            status: status.as_u16(),
        });
    }
    Ok(())
}

/// A translation backend.
pub trait Translate {
    /// Translate `text` into `target_lang` (ISO 639-1 code such as `"es"`).
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, Box<dyn Error>>;
}

/// Google's keyless web endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    client: Client,
    endpoint: String,
}

impl GoogleTranslate {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
        }
    }
}

impl Translate for GoogleTranslate {
    #[instrument(level = "debug", skip_all, fields(%target_lang))]
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, Box<dyn Error>> {
        let url = format!(
            "{}?client=gtx&sl=auto&tl={}&dt=t&q={}",
            self.endpoint,
            urlencoding::encode(target_lang),
            urlencoding::encode(text)
        );
        let response = self.client.get(&url).send().await?;
        check_rate_limit(&response)?;
        let body = response
            .error_for_status()?
            .text()
            .await?;
        parse_google_response(&body)
    }
}

/// Join the translated segments of a `translate_a/single` response.
///
/// The payload is a nested array: `[[["segment", "original", ...], ...], ...]`.
fn parse_google_response(body: &str) -> Result<String, Box<dyn Error>> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let segments = value
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or("unexpected Google translate payload")?;
    let translated: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(|s| s.as_str()))
        .collect();
    Ok(translated)
}

/// DeepL REST API.
#[derive(Debug, Clone)]
pub struct DeepLTranslate {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

impl DeepLTranslate {
    /// `endpoint` is the API root, e.g. `https://api-free.deepl.com`.
    pub fn new(client: Client, endpoint: &str, api_key: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

impl Translate for DeepLTranslate {
    #[instrument(level = "debug", skip_all, fields(%target_lang))]
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, Box<dyn Error>> {
        let target = target_lang.to_uppercase();
        let params = [("text", text), ("target_lang", target.as_str())];
        let response = self
            .client
            .post(format!("{}/v2/translate", self.endpoint))
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&params)
            .send()
            .await?;
        check_rate_limit(&response)?;
        let body = response
            .error_for_status()?
            .text()
            .await?;
        let parsed: DeepLResponse = serde_json::from_str(&body)?;
        Ok(parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .unwrap_or_default())
    }
}

/// Backend selected at startup.
#[derive(Debug, Clone)]
pub enum Translator {
    Google(GoogleTranslate),
    DeepL(DeepLTranslate),
    Disabled,
}

impl Translate for Translator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, Box<dyn Error>> {
        match self {
            Translator::Google(t) => t.translate(text, target_lang).await,
            Translator::DeepL(t) => t.translate(text, target_lang).await,
            Translator::Disabled => Ok(text.to_string()),
        }
    }
}

/// Translate `text`, falling back to `text` itself on any failure.
///
/// Empty input short-circuits without calling the backend. Input longer than
/// [`MAX_TRANSLATE_CHARS`] is cut before sending. An empty translation is
/// treated like a failure.
pub async fn translate_or_original<T: Translate>(
    translator: &T,
    text: &str,
    target_lang: &str,
) -> String {
    translate_unless_throttled(translator, text, target_lang)
        .await
        .unwrap_or_else(|_| text.to_string())
}

/// Like [`translate_or_original`], except that a [`RateLimited`] backend is
/// reported to the caller instead of being swallowed.
pub async fn translate_unless_throttled<T: Translate>(
    translator: &T,
    text: &str,
    target_lang: &str,
) -> Result<String, RateLimited> {
    if text.trim().is_empty() {
        return Ok(String::new());
    }

    let request: String = text.chars().take(MAX_TRANSLATE_CHARS).collect();
    let t0 = Instant::now();
    match translator.translate(&request, target_lang).await {
        Ok(translated) if !translated.trim().is_empty() => {
            debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "Translated text");
            Ok(translated.trim().to_string())
        }
        Ok(_) => {
            info!(text = %truncate_for_log(text, 80), "Empty translation; keeping original text");
            Ok(text.to_string())
        }
        Err(e) => {
            if let Some(limited) = e.downcast_ref::<RateLimited>() {
                warn!(status = limited.status, "Translation backend is rate-limiting; keeping original text");
                return Err(*limited);
            }
            info!(
                error = %e,
                text = %truncate_for_log(text, 80),
                "Translation failed; keeping original text"
            );
            Ok(text.to_string())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Backend that always errors.
    pub(crate) struct FailingTranslator;

    impl Translate for FailingTranslator {
        async fn translate(&self, _text: &str, _target_lang: &str) -> Result<String, Box<dyn Error>> {
            Err("vendor unavailable".into())
        }
    }

    /// Backend that prefixes the target language and records every call.
    #[derive(Default)]
    pub(crate) struct PrefixTranslator {
        pub calls: RefCell<Vec<String>>,
    }

    impl Translate for PrefixTranslator {
        async fn translate(&self, text: &str, target_lang: &str) -> Result<String, Box<dyn Error>> {
            self.calls.borrow_mut().push(text.to_string());
            Ok(format!("[{target_lang}] {text}"))
        }
    }

    /// Backend that succeeds `allowed` times, then answers HTTP 429.
    #[derive(Default)]
    pub(crate) struct ThrottledTranslator {
        pub allowed: Cell<usize>,
        pub calls: Cell<usize>,
    }

    impl Translate for ThrottledTranslator {
        async fn translate(&self, text: &str, target_lang: &str) -> Result<String, Box<dyn Error>> {
            self.calls.set(self.calls.get() + 1);
            if self.allowed.get() == 0 {
                return Err(Box::new(RateLimited { status: 429 }));
            }
            self.allowed.set(self.allowed.get() - 1);
            Ok(format!("[{target_lang}] {text}"))
        }
    }

    struct BlankTranslator;

    impl Translate for BlankTranslator {
        async fn translate(&self, _text: &str, _target_lang: &str) -> Result<String, Box<dyn Error>> {
            Ok("   ".to_string())
        }
    }

    #[tokio::test]
    async fn test_failure_keeps_original() {
        let out = translate_or_original(&FailingTranslator, "Dark matter map", "es").await;
        assert_eq!(out, "Dark matter map");
    }

    #[tokio::test]
    async fn test_blank_result_keeps_original() {
        let out = translate_or_original(&BlankTranslator, "Dark matter map", "es").await;
        assert_eq!(out, "Dark matter map");
    }

    #[tokio::test]
    async fn test_empty_input_skips_backend() {
        let translator = PrefixTranslator::default();
        let out = translate_or_original(&translator, "  ", "es").await;
        assert_eq!(out, "");
        assert!(translator.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_long_input_is_cut() {
        let translator = PrefixTranslator::default();
        let long = "é".repeat(MAX_TRANSLATE_CHARS + 10);
        translate_or_original(&translator, &long, "es").await;
        assert_eq!(translator.calls.borrow()[0].chars().count(), MAX_TRANSLATE_CHARS);
    }

    #[tokio::test]
    async fn test_rate_limit_is_reported_but_not_by_fail_open_wrapper() {
        let translator = ThrottledTranslator::default();
        let out = translate_unless_throttled(&translator, "Dark matter map", "es").await;
        assert_eq!(out, Err(RateLimited { status: 429 }));

        let out = translate_or_original(&translator, "Dark matter map", "es").await;
        assert_eq!(out, "Dark matter map");
    }

    #[tokio::test]
    async fn test_other_failures_stay_fail_open() {
        let out = translate_unless_throttled(&FailingTranslator, "Dark matter map", "es").await;
        assert_eq!(out, Ok("Dark matter map".to_string()));
    }

    #[tokio::test]
    async fn test_disabled_is_identity() {
        let out = translate_or_original(&Translator::Disabled, "Hola", "es").await;
        assert_eq!(out, "Hola");
    }

    #[test]
    fn test_parse_google_response() {
        let body = r#"[[["Hola ","Hello ",null,null,10],["mundo","world",null,null,10]],null,"en"]"#;
        assert_eq!(parse_google_response(body).unwrap(), "Hola mundo");
    }

    #[test]
    fn test_parse_google_response_rejects_garbage() {
        assert!(parse_google_response(r#"{"error": "quota"}"#).is_err());
    }
}
