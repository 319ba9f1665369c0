/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - route ごとの認可 policy (mode, roles) を静的な表として持つ
 * - guard は method router 単位で掛ける (route_layer)。中央 registry は持たない
 */
use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::middleware::auth::RoutePolicy;
use crate::state::AppState;

use crate::api::v1::handlers::products::{
    create_product, delete_product, get_product, list_products, update_product,
};

pub const LIST_PRODUCTS: RoutePolicy = RoutePolicy::any(&[]);
pub const GET_PRODUCT: RoutePolicy = RoutePolicy::any(&[]);
pub const CREATE_PRODUCT: RoutePolicy = RoutePolicy::any(&["admin"]);
pub const UPDATE_PRODUCT: RoutePolicy = RoutePolicy::any(&["manager"]);
pub const DELETE_PRODUCT: RoutePolicy = RoutePolicy::any(&["admin"]);

pub fn routes(state: &AppState) -> Router<AppState> {
    let auth = &state.auth;

    Router::new()
        .route(
            "/products",
            auth.guard(LIST_PRODUCTS, get(list_products))
                .merge(auth.guard(CREATE_PRODUCT, post(create_product))),
        )
        .route(
            "/products/{id}",
            auth.guard(GET_PRODUCT, get(get_product))
                .merge(auth.guard(UPDATE_PRODUCT, put(update_product)))
                .merge(auth.guard(DELETE_PRODUCT, delete(delete_product))),
        )
}
