//! Pluggable translation engine interface.
//! The scheduler only ever sees this trait; the wire protocol behind it is
//! the engine's own concern.

pub mod cache;
pub mod http;

use futures_util::future::BoxFuture;

pub use cache::TranslationCache;
pub use http::HttpEngine;

/// An external translation backend. One combined text in, one combined
/// translated text out; delimiter preservation is best-effort and the
/// pipeline tolerates mismatches.
pub trait TranslationEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Translate `text` into `target_lang`. `source_lang` is a hint; engines
    /// may ignore it and autodetect.
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source_lang: Option<&'a str>,
        target_lang: &'a str,
    ) -> BoxFuture<'a, Result<String, EngineError>>;
}

#[derive(Debug, Clone)]
pub enum EngineError {
    Api(String),
    RateLimited { retry_after_ms: u64 },
    Timeout,
    InvalidInput(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Api(msg) => write!(f, "API error: {msg}"),
            EngineError::RateLimited { retry_after_ms } => {
                write!(f, "rate limited, retry after {retry_after_ms}ms")
            }
            EngineError::Timeout => write!(f, "translation timeout"),
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
