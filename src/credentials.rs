//! Credential classification and resolution.
//!
//! The credential is a tagged variant decided by the caller's chosen
//! constructor and resolved exactly once, at client construction, into the
//! single credential policy of the pipeline. An unsupported value fails
//! resolution before any pipeline is assembled, so no request is ever sent
//! with misconfigured auth.

use crate::constants::STORAGE_OAUTH_SCOPE;
use crate::pipeline::auth::{BearerTokenPolicy, SasCredentialPolicy};
use crate::pipeline::Policy;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A token obtained from a [`TokenCredential`].
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

/// Token-acquisition capability for bearer authentication.
///
/// Token material generation (AAD flows, managed identity, ...) is an
/// external collaborator; this crate only defines the seam.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken>;
}

/// A pre-signed, time-limited SAS token, applied via the URL query string.
#[derive(Debug, Clone)]
pub struct SasCredential {
    signature: String,
}

impl SasCredential {
    pub fn new(signature: impl Into<String>) -> Self {
        let signature = signature.into();
        let signature = signature
            .strip_prefix('?')
            .map(str::to_string)
            .unwrap_or(signature);
        Self { signature }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// The credential supplied to a client, resolved once at construction.
#[derive(Clone)]
pub enum StorageCredential {
    /// No credential policy in the chain; anonymous access.
    Anonymous,
    /// An already prepared shared-key signing policy, used as-is.
    SharedKey(Arc<dyn Policy>),
    /// Bearer-token authentication via a token provider, bound to the
    /// storage OAuth scope.
    BearerToken(Arc<dyn TokenCredential>),
    /// A pre-signed SAS token.
    Sas(SasCredential),
    /// A value that matched no known variant; resolution always fails.
    Unsupported(String),
}

impl StorageCredential {
    /// Classify an opaque credential string.
    ///
    /// SAS tokens are recognized by their signature parameters; anything else
    /// is unsupported (shared-key and bearer credentials are capabilities,
    /// not strings, and use their explicit constructors).
    pub fn parse(value: &str) -> StorageCredential {
        let trimmed = value.trim_start_matches('?');
        let looks_like_sas = trimmed
            .split('&')
            .any(|pair| pair.starts_with("sig=") || pair.starts_with("sv="));
        if looks_like_sas {
            StorageCredential::Sas(SasCredential::new(trimmed))
        } else {
            StorageCredential::Unsupported(value.to_string())
        }
    }

    /// Total, deterministic mapping from credential variant to pipeline
    /// policy. `None` means an anonymous chain.
    pub fn resolve(&self) -> Result<Option<Arc<dyn Policy>>> {
        match self {
            StorageCredential::Anonymous => Ok(None),
            StorageCredential::SharedKey(policy) => Ok(Some(policy.clone())),
            StorageCredential::BearerToken(credential) => Ok(Some(Arc::new(
                BearerTokenPolicy::new(credential.clone(), &[STORAGE_OAUTH_SCOPE]),
            ))),
            StorageCredential::Sas(sas) => {
                Ok(Some(Arc::new(SasCredentialPolicy::new(sas.clone()))))
            }
            StorageCredential::Unsupported(value) => Err(Error::configuration_with_context(
                format!("unsupported credential: {}", value),
                ErrorContext::new()
                    .with_field_path("credential")
                    .with_source("credential_resolver"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StorageRequest;

    struct StaticToken;

    #[async_trait]
    impl TokenCredential for StaticToken {
        async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken> {
            Ok(AccessToken {
                token: "t".into(),
                expires_on: Utc::now(),
            })
        }
    }

    struct NamedPolicy;

    #[async_trait]
    impl Policy for NamedPolicy {
        fn name(&self) -> &'static str {
            "shared_key"
        }
        async fn prepare(&self, _request: &mut StorageRequest) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn resolution_is_total_and_deterministic() {
        // Same input class always yields the same strategy.
        for _ in 0..2 {
            assert!(StorageCredential::Anonymous.resolve().unwrap().is_none());
            assert_eq!(
                StorageCredential::BearerToken(Arc::new(StaticToken))
                    .resolve()
                    .unwrap()
                    .unwrap()
                    .name(),
                "bearer_token"
            );
            assert_eq!(
                StorageCredential::Sas(SasCredential::new("sig=abc"))
                    .resolve()
                    .unwrap()
                    .unwrap()
                    .name(),
                "sas_credential"
            );
        }
    }

    #[test]
    fn prepared_shared_key_policy_passes_through() {
        let policy: Arc<dyn Policy> = Arc::new(NamedPolicy);
        let resolved = StorageCredential::SharedKey(policy.clone())
            .resolve()
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&policy, &resolved));
    }

    #[test]
    fn unsupported_credential_fails_resolution() {
        let err = StorageCredential::Unsupported("AccountKey=...".into())
            .resolve()
            .unwrap_err();
        match err {
            Error::Configuration { message, context } => {
                assert!(message.contains("unsupported credential"));
                assert_eq!(context.field_path.as_deref(), Some("credential"));
            }
            other => panic!("expected configuration error, got {other}"),
        }
    }

    #[test]
    fn parse_classifies_sas_tokens() {
        assert!(matches!(
            StorageCredential::parse("?sv=2025-01-05&sig=abc"),
            StorageCredential::Sas(_)
        ));
        assert!(matches!(
            StorageCredential::parse("not-a-credential"),
            StorageCredential::Unsupported(_)
        ));
    }
}
