use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use eshop_core::{ApiResult, PageRequest, PagingParams, ProductId};
use eshop_products::{ProductCreateRequest, ProductUpdateRequest};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

fn page_request(params: PagingParams) -> Result<PageRequest, axum::response::Response> {
    PageRequest::try_from(params).map_err(errors::domain_error_to_response)
}

fn product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

fn not_found() -> axum::response::Response {
    errors::api_error(StatusCode::NOT_FOUND, "Product not found")
}

pub async fn manage_paging(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<PagingParams>,
) -> axum::response::Response {
    let request = match page_request(params) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.catalog.manage_paging(&request).await {
        Ok(page) => (StatusCode::OK, Json(ApiResult::success(page))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn public_paging(
    Extension(services): Extension<Arc<AppServices>>,
    Path(language_id): Path<String>,
    Query(params): Query<PagingParams>,
) -> axum::response::Response {
    let request = match page_request(params) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.catalog.public_paging(&language_id, &request).await {
        Ok(page) => (StatusCode::OK, Json(ApiResult::success(page))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn get_by_id(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, language_id)): Path<(String, String)>,
) -> axum::response::Response {
    let id = match product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog.get_by_id(id, &language_id).await {
        Ok(product) => (StatusCode::OK, Json(ApiResult::success(product))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ProductCreateRequest>,
) -> axum::response::Response {
    match services.catalog.create(body, Utc::now()).await {
        Ok(id) => {
            tracing::info!(actor = %principal.user_id(), product_id = %id, "product created via api");
            (StatusCode::CREATED, Json(ApiResult::success(id))).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ProductUpdateRequest>,
) -> axum::response::Response {
    match services.catalog.update(&body).await {
        Ok(0) => not_found(),
        Ok(affected) => {
            tracing::info!(actor = %principal.user_id(), product_id = %body.id, affected, "product updated via api");
            (StatusCode::OK, Json(ApiResult::success(affected))).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog.delete(id).await {
        Ok(0) => not_found(),
        Ok(affected) => {
            tracing::info!(actor = %principal.user_id(), product_id = %id, "product deleted via api");
            (StatusCode::OK, Json(ApiResult::success(affected))).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn update_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, new_price)): Path<(String, String)>,
) -> axum::response::Response {
    let id = match product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Ok(new_price) = new_price.parse::<i64>() else {
        return errors::api_error(StatusCode::BAD_REQUEST, "price must be an integer amount");
    };
    match services.catalog.update_price(id, new_price).await {
        Ok(true) => {
            tracing::info!(actor = %principal.user_id(), product_id = %id, new_price, "price changed via api");
            (StatusCode::OK, Json(ApiResult::ok())).into_response()
        }
        Ok(false) => not_found(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
