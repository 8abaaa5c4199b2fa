//! Identity resolution for incoming requests.
//! The gateway does not own accounts: it resolves credentials issued by the
//! surrounding identity provider, via a capability trait so deployments can
//! substitute their own verification.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};

/// A verified requester.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
}

/// Identity collaborator. Returns None when the request carries no valid
/// credentials.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<User>;
}

/// Token table sourced from configuration: comma-separated
/// `token:user-id` pairs. Tokens are read from the `Authorization: Bearer`
/// header or, failing that, a `session` cookie.
pub struct StaticTokenProvider {
    tokens: HashMap<String, String>,
}

impl StaticTokenProvider {
    pub fn from_token_list(list: &str) -> Self {
        let tokens = list
            .split(',')
            .filter_map(|pair| {
                let (token, user_id) = pair.trim().split_once(':')?;
                if token.is_empty() || user_id.is_empty() {
                    return None;
                }
                Some((token.to_string(), user_id.to_string()))
            })
            .collect();
        Self { tokens }
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<User> {
        let token = bearer_token(headers).or_else(|| session_cookie(headers))?;
        self.tokens.get(token).map(|id| User { id: id.clone() })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .find_map(|cookie| cookie.trim().strip_prefix("session="))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn provider() -> StaticTokenProvider {
        StaticTokenProvider::from_token_list("tok-a:alice, tok-b:bob,broken,:noid,notoken:")
    }

    #[tokio::test]
    async fn bearer_token_resolves_user() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-a"));

        let user = provider().authenticate(&headers).await.expect("user");
        assert_eq!(user.id, "alice");
    }

    #[tokio::test]
    async fn session_cookie_resolves_user() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=tok-b"),
        );

        let user = provider().authenticate(&headers).await.expect("user");
        assert_eq!(user.id, "bob");
    }

    #[tokio::test]
    async fn unknown_or_missing_credentials_resolve_nothing() {
        let provider = provider();
        assert!(provider.authenticate(&HeaderMap::new()).await.is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        assert!(provider.authenticate(&headers).await.is_none());
    }

    #[test]
    fn malformed_token_entries_are_skipped() {
        let provider = provider();
        assert_eq!(provider.tokens.len(), 2);
    }
}
