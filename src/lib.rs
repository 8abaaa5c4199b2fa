//! babelgate: authenticated translation gateway.
//! Request path: identity check → per-user/per-IP rate limits → validation →
//! cache lookup → provider call → metadata-only history write. Text content
//! is never logged or persisted; only lengths, fingerprints and outcomes.

pub mod api;
pub mod auth;
pub mod config;
pub mod history;
pub mod languages;
pub mod metrics;
pub mod ratelimit;
pub mod translate;

use std::sync::Arc;

use auth::IdentityProvider;
use config::Config;
use history::HistoryStore;
use metrics::MetricsRegistry;
use ratelimit::FixedWindowLimiter;
use translate::cache::TranslationCache;
use translate::Translator;

/// Shared application state handed to every request handler. Constructed
/// once at startup; the stores are owned here, never ambient globals, so
/// tests can wire their own.
pub struct AppContext {
    pub config: Config,
    pub user_limiter: FixedWindowLimiter,
    pub ip_limiter: FixedWindowLimiter,
    pub cache: TranslationCache,
    pub translator: Arc<dyn Translator>,
    pub identity: Arc<dyn IdentityProvider>,
    pub history: HistoryStore,
    pub metrics: Arc<MetricsRegistry>,
}

impl AppContext {
    /// Wire the owned stores from configuration around the two injected
    /// collaborators (translation engine, identity provider).
    pub fn new(
        config: Config,
        translator: Arc<dyn Translator>,
        identity: Arc<dyn IdentityProvider>,
        history: HistoryStore,
    ) -> Self {
        let user_limiter = FixedWindowLimiter::new(config.user_rate_limit());
        let ip_limiter = FixedWindowLimiter::new(config.ip_rate_limit());
        let cache = TranslationCache::new(config.cache_max_entries, config.cache_ttl());

        Self {
            config,
            user_limiter,
            ip_limiter,
            cache,
            translator,
            identity,
            history,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }
}
