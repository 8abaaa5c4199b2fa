//! HTTP surface: route wiring and the translate request path.
//! The translate handler walks auth → rate limits → validation →
//! fingerprint → cache → provider → metadata write, rejecting as early and
//! as cheaply as possible. Rate-limit headers ride on every outcome once
//! the limiter has been consulted.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::history::{NewTranslation, RecordStatus, TranslationRow};
use crate::languages;
use crate::metrics::metric_names;
use crate::ratelimit::RateLimitDecision;
use crate::translate::cache::{content_fingerprint, CachedTranslation, TranslationCache};
use crate::translate::TranslateRequest;
use crate::AppContext;

pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/languages", get(list_languages))
        .route("/metrics", get(metrics_summary))
        .route("/translate", post(translate))
        .route("/translations", get(list_translations))
        .route("/translations/export", get(export_translations))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateBody {
    text: String,
    #[serde(default = "default_source_lang")]
    source_lang: String,
    target_lang: String,
}

fn default_source_lang() -> String {
    "auto".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
    detected_source_lang: Option<String>,
    meta: TranslateMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateMeta {
    chars_in: i64,
    latency_ms: Option<i64>,
    provider: String,
    cached: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
}

/// History listing item: the metadata columns a user may see about their own
/// requests (hash and error detail stay in the export).
#[derive(Debug, Serialize)]
struct HistoryItem {
    id: i64,
    created_at: i64,
    source_lang: String,
    detected_source_lang: Option<String>,
    target_lang: String,
    chars_in: i64,
    provider: String,
    latency_ms: Option<i64>,
    status: String,
}

impl From<TranslationRow> for HistoryItem {
    fn from(row: TranslationRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            source_lang: row.source_lang,
            detected_source_lang: row.detected_source_lang,
            target_lang: row.target_lang,
            chars_in: row.chars_in,
            provider: row.provider,
            latency_ms: row.latency_ms,
            status: row.status,
        }
    }
}

// --- Rate-limit plumbing ---

struct LimitChecks {
    user: RateLimitDecision,
    ip: Option<RateLimitDecision>,
}

impl LimitChecks {
    fn allowed(&self) -> bool {
        self.user.allowed && self.ip.map_or(true, |d| d.allowed)
    }

    /// Attach `X-RateLimit-*` headers; the IP pair only when an address was
    /// resolved.
    fn attach(&self, mut response: Response) -> Response {
        let headers = response.headers_mut();
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(self.user.remaining),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from(self.user.reset_at_secs()),
        );
        if let Some(ip) = &self.ip {
            headers.insert(
                HeaderName::from_static("x-ratelimit-ip-remaining"),
                HeaderValue::from(ip.remaining),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-ip-reset"),
                HeaderValue::from(ip.reset_at_secs()),
            );
        }
        response
    }
}

/// Best-effort client address from proxy headers, in trust order.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first = forwarded.split(',').next().map(str::trim).unwrap_or("");
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }
    for name in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(ip) = headers.get(name).and_then(|v| v.to_str().ok()) {
            let ip = ip.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }
    None
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
            error_code: None,
        }),
    )
        .into_response()
}

// --- Handlers ---

async fn health() -> &'static str {
    "OK"
}

async fn list_languages() -> Response {
    let languages: Vec<_> = languages::SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, label)| json!({ "code": code, "label": label }))
        .collect();
    Json(json!({ "languages": languages })).into_response()
}

async fn metrics_summary(State(ctx): State<Arc<AppContext>>) -> Response {
    Json(ctx.metrics.snapshot()).into_response()
}

async fn translate(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(user) = ctx.identity.authenticate(&headers).await else {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let request_id = Uuid::new_v4();
    let started = Instant::now();

    // Both limits are consulted before the body is parsed; rejected callers
    // must stay cheap.
    let checks = LimitChecks {
        user: ctx.user_limiter.check(&format!("translate:{}", user.id)),
        ip: client_ip(&headers).map(|ip| ctx.ip_limiter.check(&format!("translate-ip:{ip}"))),
    };
    if !checks.allowed() {
        ctx.metrics.incr(metric_names::RATE_LIMITED);
        warn!(%request_id, user = %user.id, "translate_rate_limited");
        return checks.attach(error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Try again shortly.",
        ));
    }

    let Some(req) = serde_json::from_slice::<TranslateBody>(&body)
        .ok()
        .filter(|b| !b.text.is_empty())
    else {
        return checks.attach(error_response(StatusCode::BAD_REQUEST, "Invalid request"));
    };

    let chars_in = req.text.chars().count();
    if chars_in > ctx.config.max_translation_chars {
        return checks.attach(error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            &format!("Limit is {} characters.", ctx.config.max_translation_chars),
        ));
    }
    if req.source_lang != "auto" && !languages::is_supported(&req.source_lang) {
        return checks.attach(error_response(StatusCode::BAD_REQUEST, "Invalid source language."));
    }
    if !languages::is_supported(&req.target_lang) {
        return checks.attach(error_response(StatusCode::BAD_REQUEST, "Invalid target language."));
    }
    let Some(secret) = ctx.config.text_hash_secret.as_deref() else {
        error!(%request_id, "fingerprint secret missing, refusing request");
        return checks.attach(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server not configured",
        ));
    };

    let chars_in = chars_in as i64;
    ctx.metrics.incr(metric_names::REQUESTS);
    let text_hash = content_fingerprint(secret, &req.text);
    let cache_key =
        TranslationCache::compute_key(&user.id, &req.source_lang, &req.target_lang, &text_hash);

    if let Some(hit) = ctx.cache.get(&cache_key) {
        persist(
            &ctx,
            &request_id,
            NewTranslation {
                user_id: user.id.clone(),
                source_lang: req.source_lang.clone(),
                detected_source_lang: hit.detected_source_lang.clone(),
                target_lang: req.target_lang.clone(),
                chars_in,
                provider: "cache".to_string(),
                latency_ms: Some(0),
                status: RecordStatus::Success,
                error_code: None,
                text_hash,
            },
        );
        ctx.metrics.incr(metric_names::CACHE_HITS);
        ctx.metrics
            .observe(metric_names::REQUEST_US, started.elapsed().as_micros() as f64);
        info!(%request_id, user = %user.id, chars_in, "translate_cache_hit");

        let response = (
            StatusCode::OK,
            Json(TranslateResponse {
                translated_text: hit.translated_text,
                detected_source_lang: hit.detected_source_lang,
                meta: TranslateMeta {
                    chars_in,
                    latency_ms: Some(0),
                    provider: hit.provider,
                    cached: true,
                },
            }),
        )
            .into_response();
        return checks.attach(response);
    }

    let provider_timer = ctx.metrics.timer(metric_names::PROVIDER_US);
    let outcome = ctx
        .translator
        .translate(TranslateRequest {
            text: req.text.clone(),
            source_lang: req.source_lang.clone(),
            target_lang: req.target_lang.clone(),
        })
        .await;
    provider_timer.stop();

    match outcome {
        Ok(result) => {
            ctx.cache.insert(
                cache_key,
                CachedTranslation {
                    translated_text: result.translated_text.clone(),
                    provider: result.provider.clone(),
                    detected_source_lang: result.detected_source_lang.clone(),
                },
            );
            persist(
                &ctx,
                &request_id,
                NewTranslation {
                    user_id: user.id.clone(),
                    source_lang: req.source_lang.clone(),
                    detected_source_lang: result.detected_source_lang.clone(),
                    target_lang: req.target_lang.clone(),
                    chars_in,
                    provider: result.provider.clone(),
                    latency_ms: result.latency_ms,
                    status: RecordStatus::Success,
                    error_code: None,
                    text_hash,
                },
            );
            ctx.metrics
                .observe(metric_names::REQUEST_US, started.elapsed().as_micros() as f64);
            info!(
                %request_id,
                user = %user.id,
                chars_in,
                latency_ms = ?result.latency_ms,
                provider = %result.provider,
                "translate_ok"
            );

            let response = (
                StatusCode::OK,
                Json(TranslateResponse {
                    translated_text: result.translated_text,
                    detected_source_lang: result.detected_source_lang,
                    meta: TranslateMeta {
                        chars_in,
                        latency_ms: result.latency_ms,
                        provider: result.provider,
                        cached: false,
                    },
                }),
            )
                .into_response();
            checks.attach(response)
        }
        Err(err) => {
            let error_code = err.code();
            persist(
                &ctx,
                &request_id,
                NewTranslation {
                    user_id: user.id.clone(),
                    source_lang: req.source_lang.clone(),
                    detected_source_lang: None,
                    target_lang: req.target_lang.clone(),
                    chars_in,
                    provider: ctx.config.translation_provider.clone(),
                    latency_ms: None,
                    status: RecordStatus::Error,
                    error_code: Some(error_code.clone()),
                    text_hash,
                },
            );
            ctx.metrics.incr(metric_names::PROVIDER_ERRORS);
            ctx.metrics
                .observe(metric_names::REQUEST_US, started.elapsed().as_micros() as f64);
            warn!(
                %request_id,
                user = %user.id,
                code = %error_code,
                error = %err,
                "translate_provider_failed"
            );

            let response = (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody {
                    error: "Translation failed. Check that the provider is online.".to_string(),
                    error_code: Some(error_code),
                }),
            )
                .into_response();
            checks.attach(response)
        }
    }
}

/// Write the metadata row. A failure is logged and swallowed: the caller
/// still gets their translation even if the audit write is lost.
fn persist(ctx: &AppContext, request_id: &Uuid, row: NewTranslation) {
    let timer = ctx.metrics.timer(metric_names::HISTORY_WRITE_US);
    if let Err(e) = ctx.history.record(&row) {
        warn!(%request_id, error = %e, "history write failed");
    }
    timer.stop();
}

async fn list_translations(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    let Some(user) = ctx.identity.authenticate(&headers).await else {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    match ctx.history.recent_for_user(&user.id, 50) {
        Ok(rows) => {
            let items: Vec<HistoryItem> = rows.into_iter().map(HistoryItem::from).collect();
            Json(json!({ "items": items })).into_response()
        }
        Err(e) => {
            warn!(user = %user.id, error = %e, "history listing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load history.")
        }
    }
}

async fn export_translations(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    let Some(user) = ctx.identity.authenticate(&headers).await else {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    match ctx.history.recent_for_user(&user.id, 2_000) {
        Ok(rows) => {
            let csv = rows_to_csv(&rows);
            let filename = format!("translations-{}.csv", chrono::Utc::now().format("%Y%m%d"));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename={filename}"),
                    ),
                    (header::CACHE_CONTROL, "no-store".to_string()),
                ],
                csv,
            )
                .into_response()
        }
        Err(e) => {
            warn!(user = %user.id, error = %e, "history export failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to export history.")
        }
    }
}

// --- CSV assembly ---

const EXPORT_COLUMNS: &[&str] = &[
    "id",
    "created_at",
    "source_lang",
    "detected_source_lang",
    "target_lang",
    "chars_in",
    "provider",
    "latency_ms",
    "status",
    "error_code",
    "text_hash",
];

/// Quote every cell; doubled quotes inside.
fn csv_escape(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn rows_to_csv(rows: &[TranslationRow]) -> String {
    let mut out = String::new();
    out.push_str(
        &EXPORT_COLUMNS
            .iter()
            .map(|c| csv_escape(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');

    for row in rows {
        let cells = [
            row.id.to_string(),
            row.created_at.to_string(),
            row.source_lang.clone(),
            row.detected_source_lang.clone().unwrap_or_default(),
            row.target_lang.clone(),
            row.chars_in.to_string(),
            row.provider.clone(),
            row.latency_ms.map(|v| v.to_string()).unwrap_or_default(),
            row.status.clone(),
            row.error_code.clone().unwrap_or_default(),
            row.text_hash.clone(),
        ];
        out.push_str(
            &cells
                .iter()
                .map(|c| csv_escape(c))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}
