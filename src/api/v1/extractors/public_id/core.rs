/*
 * Responsibility
 * - Path の String を公開 ID 型として受け、内部 ID (i64) へ変換する
 * - 失敗時は AppError (400 / JSON body) へ変換
 *
 * 置かないもの
 *  - Product といった具体リソース名 (types 側)
 */
use std::marker::PhantomData;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

pub struct PublicId<T> {
    pub id: i64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PublicId<T> {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }
}

// derive だと T にも Clone/Copy を要求してしまうため手で書く
impl<T> Clone for PublicId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PublicId<T> {}

impl<T> std::fmt::Debug for PublicId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicId").field("id", &self.id).finish()
    }
}

impl<T> FromRequestParts<AppState> for PublicId<T> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Path(public_id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::bad_request("invalid id"))?;

        let id = state.id_codec.decode(&public_id)?;
        Ok(Self::new(id))
    }
}
