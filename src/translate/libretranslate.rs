//! LibreTranslate HTTP client.
//! Connection pooling via reqwest, one attempt per call, bounded total
//! timeout. No retries here: the adapter is a fail-fast boundary.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use super::{TranslateError, TranslateRequest, TranslateResult, Translator};

pub const PROVIDER_NAME: &str = "libretranslate";

pub struct LibreTranslateClient {
    http: reqwest::Client,
    base_url: String,
}

impl LibreTranslateClient {
    /// Create a client against the given base URL with a total per-request
    /// timeout (connect through body read).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .build()
            .map_err(|e| TranslateError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct LibreTranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

#[async_trait]
impl Translator for LibreTranslateClient {
    async fn translate(&self, request: TranslateRequest) -> Result<TranslateResult, TranslateError> {
        let started = Instant::now();

        let body = serde_json::json!({
            "q": request.text,
            "source": request.source_lang,
            "target": request.target_lang,
            "format": "text",
        });

        let response = self
            .http
            .post(format!("{}/translate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranslateError::Timeout
                } else {
                    TranslateError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::HttpStatus(status.as_u16()));
        }

        let parsed: LibreTranslateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                TranslateError::Timeout
            } else {
                TranslateError::BadResponse
            }
        })?;

        let latency_ms = started.elapsed().as_millis() as i64;

        let translated_text = parsed
            .translated_text
            .filter(|t| !t.is_empty())
            .ok_or(TranslateError::BadResponse)?;

        Ok(TranslateResult {
            translated_text,
            detected_source_lang: if request.source_lang == "auto" {
                None
            } else {
                Some(request.source_lang.clone())
            },
            latency_ms: Some(latency_ms),
            provider: PROVIDER_NAME.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request() -> TranslateRequest {
        TranslateRequest {
            text: "hello".to_string(),
            source_lang: "en".to_string(),
            target_lang: "pt".to_string(),
        }
    }

    /// Accept one connection, read the request, answer with `response`.
    async fn one_shot_server(listener: TcpListener, response: &'static str) {
        let (mut sock, _) = listener.accept().await.expect("accept");
        let mut buf = vec![0u8; 4096];
        let _ = sock.read(&mut buf).await;
        sock.write_all(response.as_bytes()).await.expect("write");
        let _ = sock.shutdown().await;
    }

    #[tokio::test]
    async fn times_out_no_later_than_configured() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            // Accept and hold the connection open without ever responding.
            let (mut sock, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 4096];
            let _ = sock.read(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let client = LibreTranslateClient::new(
            &format!("http://{addr}"),
            Duration::from_millis(200),
        )
        .expect("client");

        let started = Instant::now();
        let err = client.translate(request()).await.expect_err("must time out");
        assert_eq!(err, TranslateError::Timeout);
        // Fires at the deadline: not before, and only scheduling slack after.
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let client = LibreTranslateClient::new(
            &format!("http://{addr}"),
            Duration::from_secs(2),
        )
        .expect("client");

        match client.translate(request()).await {
            Err(TranslateError::Network(_)) => {}
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_success_status_is_surfaced() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(one_shot_server(
            listener,
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        ));

        let client = LibreTranslateClient::new(
            &format!("http://{addr}"),
            Duration::from_secs(2),
        )
        .expect("client");

        assert_eq!(
            client.translate(request()).await.expect_err("must fail"),
            TranslateError::HttpStatus(503)
        );
    }

    #[tokio::test]
    async fn missing_translated_text_is_a_bad_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(one_shot_server(
            listener,
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
        ));

        let client = LibreTranslateClient::new(
            &format!("http://{addr}"),
            Duration::from_secs(2),
        )
        .expect("client");

        assert_eq!(
            client.translate(request()).await.expect_err("must fail"),
            TranslateError::BadResponse
        );
    }

    #[tokio::test]
    async fn echoes_requested_source_unless_auto() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(one_shot_server(
            listener,
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 29\r\nconnection: close\r\n\r\n{\"translatedText\":\"ol\\u00e1\"}",
        ));

        let client = LibreTranslateClient::new(
            &format!("http://{addr}"),
            Duration::from_secs(2),
        )
        .expect("client");

        let result = client.translate(request()).await.expect("translation");
        assert_eq!(result.translated_text, "olá");
        assert_eq!(result.detected_source_lang.as_deref(), Some("en"));
        assert_eq!(result.provider, PROVIDER_NAME);
        assert!(result.latency_ms.is_some());
    }
}
