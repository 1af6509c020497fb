//! Bearer token verification.
//!
//! # Responsibilities
//! - Enable verification for an audience (key setup runs once per process)
//! - Verify the token signature against the cached key named by `kid`
//! - Compare the `aud` claim with the configured audience

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::auth::error::{AuthError, KeyFetchError};
use crate::auth::keys::KeyCache;
use crate::auth::refresh::KeyRefresher;

// Re-export AuthConfig from config module to avoid duplication
pub use crate::config::schema::AuthConfig as AuthSettings;

/// Claims of a verified token.
pub type Claims = Value;

/// Verifies inbound signature tokens for the router.
pub struct Authenticator {
    cache: Arc<KeyCache>,
    audience: ArcSwap<String>,
    refresher: OnceCell<Arc<KeyRefresher>>,
}

impl Authenticator {
    /// Create a disabled authenticator reading keys from `cache`.
    pub fn new(cache: Arc<KeyCache>) -> Self {
        Self {
            cache,
            audience: ArcSwap::from_pointee(String::new()),
            refresher: OnceCell::new(),
        }
    }

    /// Enable verification for `settings.audience`.
    ///
    /// The key fetch and renewal chain are set up on the first successful
    /// call only; later calls just update the audience. A failed first
    /// fetch is logged and the renewal chain retries it on its own.
    pub async fn enable(&self, settings: &AuthSettings) -> Result<(), KeyFetchError> {
        self.set_audience(settings.audience.clone());

        self.refresher
            .get_or_try_init(|| async {
                let refresher = Arc::new(KeyRefresher::new(self.cache.clone(), settings)?);
                if let Err(e) = refresher.start().await {
                    tracing::warn!(
                        endpoint = %refresher.endpoint(),
                        error = %e,
                        "Initial key fetch failed, token verification will fail until keys arrive"
                    );
                }
                Ok::<_, KeyFetchError>(refresher)
            })
            .await?;
        Ok(())
    }

    /// Replace the expected audience. An empty audience disables verification.
    pub fn set_audience(&self, audience: impl Into<String>) {
        let audience = audience.into();
        let previous = self.audience.swap(Arc::new(audience.clone()));
        if *previous != audience {
            tracing::info!(audience = %audience, "Token audience updated");
        }
    }

    pub fn audience(&self) -> String {
        self.audience.load().as_ref().clone()
    }

    pub fn is_enabled(&self) -> bool {
        !self.audience.load().is_empty()
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// The renewal chain, once `enable` has set it up.
    pub fn refresher(&self) -> Option<&Arc<KeyRefresher>> {
        self.refresher.get()
    }

    /// Verify `token` (raw JWT, optionally `Bearer `-prefixed).
    ///
    /// Returns `Ok(None)` without looking at the token when verification
    /// is disabled.
    pub fn verify(&self, token: Option<&str>) -> Result<Option<Claims>, AuthError> {
        let audience = self.audience.load();
        if audience.is_empty() {
            return Ok(None);
        }

        let token = token
            .map(|t| t.trim())
            .map(|t| t.strip_prefix("Bearer ").unwrap_or(t).trim())
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let header = decode_header(token).map_err(|e| AuthError::MalformedToken(e.to_string()))?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;

        let snapshot = self.cache.snapshot();
        let pem = snapshot
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownKeyId(kid.clone()))?;
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|_| AuthError::InvalidKey(kid.clone()))?;

        let data = decode::<Claims>(token, &key, &validation())
            .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;

        check_audience(&data.claims, &audience)?;
        Ok(Some(data.claims))
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("audience", &self.audience())
            .field("keys", &self.cache.len())
            .field("refresher", &self.refresher.get().map(|r| r.endpoint().as_str()))
            .finish()
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    // exp/nbf are still checked when present
    validation.required_spec_claims = HashSet::new();
    validation.validate_nbf = true;
    // Audience is compared separately to report the mismatch
    validation.validate_aud = false;
    validation
}

fn check_audience(claims: &Claims, expected: &str) -> Result<(), AuthError> {
    let ok = match claims.get("aud") {
        Some(Value::String(aud)) => aud == expected,
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(expected)),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(AuthError::AudienceMismatch {
            expected: expected.to_string(),
            actual: claims.get("aud").map(ToString::to_string).unwrap_or_default(),
        })
    }
}
