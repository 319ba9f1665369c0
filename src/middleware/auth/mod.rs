/*!
 * Request authentication & authorization
 *
 * Responsibility:
 * - Authorization: Bearer の検証と role policy の評価
 * - 認証済み identity を request extensions に公開する
 *
 * Public API:
 * - Authenticator (from_config / guard / authenticate)
 * - AccessPolicy / RoutePolicy / RoleMode
 * - AuthError
 */

mod access;
mod authenticator;
mod claims;
mod error;
mod policy;

pub use authenticator::Authenticator;
pub use claims::{ClaimsError, IdentityClaims, RoleClaim};
pub use error::{AuthError, Unauthenticated};
pub use policy::{AccessPolicy, PolicyDenial, RoleMode, RoutePolicy};
