pub mod factory;
pub mod jwks;
pub mod oidc;
pub mod static_key;
pub mod verifier;

pub use factory::build_verifier;
pub use oidc::{DiscoveryError, OidcOptions, OidcVerifier};
pub use static_key::StaticKeyVerifier;
pub use verifier::{TokenVerifier, VerifiedToken, VerifyError};
