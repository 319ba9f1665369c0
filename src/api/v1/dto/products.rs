/*
 * Responsibility
 * - Products の request/response DTO
 * - 公開 ID を返す場合は、encode 済みの値を返す (内部 ID を漏らさない)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: String,
}

/// `?page=&page_size=`; out-of-range values fall back to defaults in the service.
#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: String, // encoded
    pub name: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
