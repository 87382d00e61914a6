//! Credential policies.
//!
//! The credential policy sits after body/header finalization (some schemes
//! sign over the final bytes) and before redirect handling. Exactly one of
//! these is present in a chain, or none for anonymous access.

use crate::credentials::{AccessToken, SasCredential, TokenCredential};
use crate::http::StorageRequest;
use crate::pipeline::Policy;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Refresh the cached token this long before it actually expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 120;

/// Attaches `Authorization: Bearer <token>`, fetching and caching tokens from
/// the caller's [`TokenCredential`].
pub struct BearerTokenPolicy {
    credential: Arc<dyn TokenCredential>,
    scopes: Vec<String>,
    cached: Mutex<Option<AccessToken>>,
}

impl BearerTokenPolicy {
    pub fn new(credential: Arc<dyn TokenCredential>, scopes: &[&str]) -> Self {
        Self {
            credential,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            cached: Mutex::new(None),
        }
    }

    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let fresh = cached.as_ref().is_some_and(|t| {
            (t.expires_on - Utc::now()).num_seconds() > TOKEN_REFRESH_MARGIN_SECS
        });
        if !fresh {
            let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
            *cached = Some(self.credential.get_token(&scopes).await?);
        }
        Ok(cached.as_ref().map(|t| t.token.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl Policy for BearerTokenPolicy {
    fn name(&self) -> &'static str {
        "bearer_token"
    }

    async fn prepare(&self, request: &mut StorageRequest) -> Result<()> {
        let token = self.token().await?;
        request
            .headers
            .insert("Authorization", format!("Bearer {}", token));
        Ok(())
    }
}

/// Appends a pre-signed SAS token to the request query string.
pub struct SasCredentialPolicy {
    credential: SasCredential,
}

impl SasCredentialPolicy {
    pub fn new(credential: SasCredential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl Policy for SasCredentialPolicy {
    fn name(&self) -> &'static str {
        "sas_credential"
    }

    async fn prepare(&self, request: &mut StorageRequest) -> Result<()> {
        let signature = self.credential.signature();
        match request.url.query() {
            // The caller may have embedded the token in the URL already.
            Some(q) if q.contains(signature) => {}
            Some(q) => {
                let merged = format!("{}&{}", q, signature);
                request.url.set_query(Some(&merged));
            }
            None => request.url.set_query(Some(signature)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct CountingCredential {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenCredential for CountingCredential {
        async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(AccessToken {
                token: format!("token-{}", n),
                expires_on: Utc::now() + Duration::hours(1),
            })
        }
    }

    fn request(url: &str) -> StorageRequest {
        StorageRequest::new(Method::GET, Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn bearer_policy_caches_tokens_until_expiry() {
        let cred = Arc::new(CountingCredential {
            calls: AtomicUsize::new(0),
        });
        let policy = BearerTokenPolicy::new(cred.clone(), &["scope/.default"]);

        let mut req = request("https://account.dfs.example.net/fs");
        policy.prepare(&mut req).await.unwrap();
        policy.prepare(&mut req).await.unwrap();

        assert_eq!(req.headers.get("Authorization"), Some("Bearer token-0"));
        assert_eq!(cred.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn sas_policy_appends_and_merges_query() {
        let policy = SasCredentialPolicy::new(SasCredential::new("?sv=2025&sig=abc"));

        let mut bare = request("https://account.dfs.example.net/fs");
        policy.prepare(&mut bare).await.unwrap();
        assert_eq!(bare.url.query(), Some("sv=2025&sig=abc"));

        let mut with_query = request("https://account.dfs.example.net/fs?comp=batch");
        policy.prepare(&mut with_query).await.unwrap();
        assert_eq!(with_query.url.query(), Some("comp=batch&sv=2025&sig=abc"));

        // Applying twice never duplicates the signature.
        policy.prepare(&mut with_query).await.unwrap();
        assert_eq!(with_query.url.query(), Some("comp=batch&sv=2025&sig=abc"));
    }
}
