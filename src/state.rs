/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::middleware::auth::Authenticator;
use crate::repos::ProductRepository;
use crate::services::id_codec::IdCodec;
use crate::services::product::ProductService;

#[derive(Clone, Debug)]
pub struct AppState {
    pub products: ProductService,
    pub id_codec: IdCodec,
    pub auth: Authenticator,
}

impl AppState {
    pub fn new(repo: Arc<dyn ProductRepository>, id_codec: IdCodec, auth: Authenticator) -> Self {
        Self {
            products: ProductService::new(repo),
            id_codec,
            auth,
        }
    }
}
