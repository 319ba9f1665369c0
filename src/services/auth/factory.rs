/// Factory: build the token verifier from the application `AuthConfig`.
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::services::auth::{
    DiscoveryError, OidcOptions, OidcVerifier, StaticKeyVerifier, TokenVerifier,
};

pub async fn build_verifier(config: &AuthConfig) -> Result<Arc<dyn TokenVerifier>, DiscoveryError> {
    // A pinned key wins over discovery.
    if let Some(public_key) = &config.public_key {
        let verifier = StaticKeyVerifier::from_rsa_key(
            public_key,
            config.issuer_url.as_deref(),
            &config.client_id,
            config.leeway_seconds,
        )?;
        return Ok(Arc::new(verifier));
    }

    let issuer = config
        .issuer_url
        .as_deref()
        .ok_or_else(|| DiscoveryError::InvalidIssuer("issuer url is not configured".into()))?;

    let options = OidcOptions {
        leeway_seconds: config.leeway_seconds,
        cache_ttl: config.jwks_cache_ttl,
        min_refresh_interval: config.jwks_min_refresh_interval,
        http_timeout: config.verify_timeout,
    };

    let verifier = OidcVerifier::discover(issuer, &config.client_id, options).await?;
    Ok(Arc::new(verifier))
}
