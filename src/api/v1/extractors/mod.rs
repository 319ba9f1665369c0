/*
 * Responsibility
 * - v1 handler が使う extractor の公開窓口
 */
pub mod auth_ctx;
pub mod public_id;

pub use auth_ctx::{AuthenticatedIdentity, CurrentIdentity, DEV_SUBJECT, current_identity};
pub use public_id::{PublicId, PublicProductId};
