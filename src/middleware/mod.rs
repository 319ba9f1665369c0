/*
 * Responsibility
 * - middleware の公開インターフェース
 * - trace: X-Trace-Id の伝播 / auth: Bearer 検証と role policy
 * - http, cors, security_headers: 全 route 共通の横断的関心事
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
pub mod trace;
