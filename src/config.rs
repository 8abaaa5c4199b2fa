//! Environment-driven configuration.
//! Every policy knob has a default except the fingerprint secret, which has
//! none on purpose: the handler refuses to fingerprint without it. Unset or
//! unparsable numeric knobs fall back to their defaults.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::ratelimit::RateLimitConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: Ipv4Addr,
    pub port: u16,

    /// Per-user limiter policy.
    pub rate_limit_window_ms: u64,
    pub rate_limit_requests: u32,
    /// Per-IP limiter policy (looser: several users can share an address).
    pub rate_limit_ip_window_ms: u64,
    pub rate_limit_ip_requests: u32,

    pub cache_ttl_ms: u64,
    pub cache_max_entries: usize,

    pub provider_timeout_ms: u64,
    pub max_translation_chars: usize,

    /// Secret salting the content fingerprint. No default.
    pub text_hash_secret: Option<String>,

    pub translation_provider: String,
    pub libretranslate_url: String,

    pub history_db_path: PathBuf,
    /// Comma-separated `token:user-id` pairs for the static identity table.
    pub auth_tokens: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_parse("HOST").unwrap_or(Ipv4Addr::LOCALHOST),
            port: env_parse("PORT").unwrap_or(4000),
            rate_limit_window_ms: env_positive("RATE_LIMIT_WINDOW_MS").unwrap_or(60_000),
            rate_limit_requests: env_positive("RATE_LIMIT_REQUESTS").unwrap_or(20),
            rate_limit_ip_window_ms: env_positive("RATE_LIMIT_IP_WINDOW_MS").unwrap_or(60_000),
            rate_limit_ip_requests: env_positive("RATE_LIMIT_IP_REQUESTS").unwrap_or(60),
            cache_ttl_ms: env_positive("TRANSLATION_CACHE_TTL_MS").unwrap_or(300_000),
            cache_max_entries: env_positive("TRANSLATION_CACHE_MAX_ENTRIES").unwrap_or(500),
            provider_timeout_ms: env_positive("PROVIDER_TIMEOUT_MS").unwrap_or(10_000),
            max_translation_chars: env_positive("MAX_TRANSLATION_CHARS").unwrap_or(2_000),
            text_hash_secret: std::env::var("TEXT_HASH_SALT").ok().filter(|s| !s.is_empty()),
            translation_provider: std::env::var("TRANSLATION_PROVIDER")
                .unwrap_or_else(|_| "libretranslate".to_string()),
            libretranslate_url: std::env::var("LIBRETRANSLATE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            history_db_path: std::env::var("HISTORY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("babelgate.db")),
            auth_tokens: std::env::var("AUTH_TOKENS").unwrap_or_default(),
        }
    }

    pub fn user_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            window_ms: self.rate_limit_window_ms,
            max_requests: self.rate_limit_requests,
        }
    }

    pub fn ip_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            window_ms: self.rate_limit_ip_window_ms,
            max_requests: self.rate_limit_ip_requests,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// Numeric knobs must be strictly positive; zero or garbage means default.
fn env_positive<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    env_parse::<T>(name).filter(|v| *v > T::default())
}
