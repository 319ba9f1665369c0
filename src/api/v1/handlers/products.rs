/*
 * Responsibility
 * - /products 系 CRUD handler
 * - Path の {id} は公開 ID → extractor で復号化して内部 ID に変換して受け取る
 * - 認証・認可は route 側の guard が済ませている。ここでは CurrentIdentity を監査ログに使うだけ
 */
use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};

use crate::{
    api::v1::{
        dto::products::{
            CreateProductRequest, ListProductsQuery, ProductResponse, UpdateProductRequest,
        },
        extractors::{CurrentIdentity, PublicProductId},
    },
    error::AppError,
    repos::ProductRow,
    services::product::Page,
    state::AppState,
};

fn row_to_response(state: &AppState, row: ProductRow) -> Result<ProductResponse, AppError> {
    Ok(ProductResponse {
        id: state.id_codec.encode(row.id)?,
        name: row.name,
        price: row.price,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ListProductsQuery>, QueryRejection>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let Query(query) = query.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let page = Page::new(query.page, query.page_size);

    let rows = state.products.list(page).await?;

    let res = rows
        .into_iter()
        .map(|row| row_to_response(&state, row))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(res))
}

pub async fn get_product(
    State(state): State<AppState>,
    product_id: PublicProductId,
) -> Result<Json<ProductResponse>, AppError> {
    let row = state.products.get(product_id.id).await?;
    Ok(Json(row_to_response(&state, row)?))
}

pub async fn create_product(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    let req = body(payload)?;

    let row = state.products.create(&req.name, req.price).await?;
    tracing::info!(subject = %identity.subject(), product_id = row.id, "product created");

    Ok((StatusCode::CREATED, Json(row_to_response(&state, row)?)))
}

pub async fn update_product(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    product_id: PublicProductId,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, AppError> {
    let req = body(payload)?;

    let row = state.products.rename(product_id.id, &req.name).await?;
    tracing::info!(subject = %identity.subject(), product_id = row.id, "product renamed");

    Ok(Json(row_to_response(&state, row)?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    product_id: PublicProductId,
) -> Result<StatusCode, AppError> {
    state.products.delete(product_id.id).await?;
    tracing::info!(subject = %identity.subject(), product_id = product_id.id, "product deleted");

    Ok(StatusCode::NO_CONTENT)
}
