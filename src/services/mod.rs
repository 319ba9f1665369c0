/*
 * Responsibility
 * - handler から呼ばれる業務ロジック / 外部連携の公開窓口
 */
pub mod auth;
pub mod id_codec;
pub mod product;
