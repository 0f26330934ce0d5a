// ABOUTME: Request identity resolution from bearer credentials
// ABOUTME: Validates HS256 JWTs and yields the owner id side-effect writes are keyed by
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Identity Resolution
//!
//! Every chat request resolves to an owning identity before any provider
//! call is made. Resolution is fallible but not descriptive: the route layer
//! collapses every failure (missing header, malformed token, bad signature,
//! expired claims) into one unauthorized response, so this module never
//! leaks why a credential was rejected.

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The authenticated caller of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier, owner of persisted conversations
    pub user_id: String,
}

/// JWT claims carried by a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the user id
    pub sub: String,
    /// Expiry, epoch seconds
    pub exp: i64,
}

/// Resolves request headers to an identity
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the caller, or `None` when the request is anonymous or the
    /// credential is invalid
    async fn resolve(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// HS256 JWT resolver reading `Authorization: Bearer <token>`
pub struct JwtIdentityResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    /// Create a resolver over a shared HMAC secret
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn bearer_token(headers: &HeaderMap) -> Option<&str> {
        headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = Self::bearer_token(headers)?;

        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(Identity {
                user_id: data.claims.sub,
            }),
            Err(e) => {
                debug!("Rejected bearer token: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";

    fn mint(sub: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &Claims {
                sub: sub.to_owned(),
                exp,
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[tokio::test]
    async fn test_valid_token_resolves_subject() {
        let resolver = JwtIdentityResolver::new(SECRET);
        let token = mint("user-42", future_exp());

        let identity = resolver.resolve(&headers_with(&token)).await.unwrap();
        assert_eq!(identity.user_id, "user-42");
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        let resolver = JwtIdentityResolver::new(SECRET);
        assert!(resolver.resolve(&HeaderMap::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_scheme_is_anonymous() {
        let resolver = JwtIdentityResolver::new(SECRET);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(resolver.resolve(&headers).await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let resolver = JwtIdentityResolver::new(b"other-secret");
        let token = mint("user-42", future_exp());
        assert!(resolver.resolve(&headers_with(&token)).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let resolver = JwtIdentityResolver::new(SECRET);
        let token = mint("user-42", chrono::Utc::now().timestamp() - 3600);
        assert!(resolver.resolve(&headers_with(&token)).await.is_none());
    }
}
