/*!
 * Authenticated identity extractor
 *
 * Responsibility:
 * - 認証済みリクエストの identity を handler に提供する
 * - HTTP / axum 依存は core に閉じ込め、型定義は types に分離する
 *
 * Public API:
 * - AuthenticatedIdentity
 * - CurrentIdentity / current_identity
 */

mod core;
mod types;

pub use core::{CurrentIdentity, current_identity};
pub use types::{AuthenticatedIdentity, DEV_SUBJECT};
