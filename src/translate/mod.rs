//! Translation provider abstraction: wire types, failure taxonomy, and
//! startup-time provider selection. Adapters are single-attempt and
//! fail-fast; retry policy, if any, belongs to the caller.

pub mod cache;
pub mod libretranslate;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use libretranslate::LibreTranslateClient;

/// One translation request as handed to an adapter.
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    pub text: String,
    /// "auto" or a supported language code.
    pub source_lang: String,
    pub target_lang: String,
}

/// Adapter output. `detected_source_lang` is only meaningful when the
/// request asked for "auto"; otherwise it echoes the requested source.
#[derive(Debug, Clone)]
pub struct TranslateResult {
    pub translated_text: String,
    pub detected_source_lang: Option<String>,
    pub latency_ms: Option<i64>,
    pub provider: String,
}

/// Failure taxonomy for a single provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The call did not complete within the configured timeout.
    Timeout,
    /// Transport-level failure distinct from timeout.
    Network(String),
    /// The engine answered with a non-success status.
    HttpStatus(u16),
    /// The engine answered 2xx but without the translated-text field.
    BadResponse,
}

impl TranslateError {
    /// Stable diagnostic code, recorded in history rows and returned to the
    /// client as `errorCode`.
    pub fn code(&self) -> String {
        match self {
            TranslateError::Timeout => "TIMEOUT".to_string(),
            TranslateError::Network(_) => "NETWORK_ERROR".to_string(),
            TranslateError::HttpStatus(status) => format!("HTTP_{status}"),
            TranslateError::BadResponse => "BAD_RESPONSE".to_string(),
        }
    }
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::Timeout => write!(f, "provider timeout"),
            TranslateError::Network(detail) => write!(f, "network error: {detail}"),
            TranslateError::HttpStatus(status) => write!(f, "provider returned HTTP {status}"),
            TranslateError::BadResponse => write!(f, "provider response missing translated text"),
        }
    }
}

/// Translation engine capability. Engines are substituted behind this trait
/// by configuration, never by branching in the handler.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: TranslateRequest) -> Result<TranslateResult, TranslateError>;
}

/// Build the configured engine.
pub fn from_config(config: &Config) -> Result<Arc<dyn Translator>, String> {
    match config.translation_provider.as_str() {
        "libretranslate" => {
            let client = LibreTranslateClient::new(
                &config.libretranslate_url,
                Duration::from_millis(config.provider_timeout_ms),
            )
            .map_err(|e| format!("libretranslate client init failed: {e}"))?;
            Ok(Arc::new(client))
        }
        other => Err(format!("unsupported translation provider: {other}")),
    }
}
