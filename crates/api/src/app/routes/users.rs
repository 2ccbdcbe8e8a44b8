use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use eshop_auth::{LoginRequest, RegisterRequest, UserUpdateRequest};
use eshop_core::{ApiResult, PageRequest, PagingParams, UserId};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn authenticate(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> axum::response::Response {
    match services.authority.authenticate(&body, Utc::now()).await {
        Ok(token) => (StatusCode::OK, Json(ApiResult::success(token))).into_response(),
        Err(e) => {
            tracing::debug!(kind = e.kind(), "sign-in refused");
            errors::sign_in_error_to_response(e)
        }
    }
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> axum::response::Response {
    match services.authority.register(&body, Utc::now()).await {
        Ok(_) => (StatusCode::OK, Json(ApiResult::ok())).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn paging(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<PagingParams>,
) -> axum::response::Response {
    let request = match PageRequest::try_from(params) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.users.paging(&request).await {
        Ok(page) => (StatusCode::OK, Json(ApiResult::success(page))).into_response(),
        Err(e) => errors::query_error_to_response(e),
    }
}

pub async fn get_by_id(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.authority.lookup_by_id(id).await {
        Ok(user) => (StatusCode::OK, Json(ApiResult::success(user))).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<UserUpdateRequest>,
) -> axum::response::Response {
    let id: UserId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.authority.update(id, &body, Utc::now()).await {
        Ok(()) => (StatusCode::OK, Json(ApiResult::ok())).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use eshop_auth::{Credential, Hs256TokenCodec, SigningConfig, TokenAuthority};
    use eshop_core::FilterSpec;
    use eshop_infra::{
        InMemoryCredentialStore, InMemoryProductStore, ProductCatalog, RecordSource, SourceError,
        UserDirectory,
    };

    use super::*;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl RecordSource<Credential> for CountingSource {
        async fn count(&self, _filter: &FilterSpec) -> Result<u64, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        async fn fetch(&self, _: &FilterSpec, _: u64, _: u64) -> Result<Vec<Credential>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn services(source: Arc<CountingSource>) -> Arc<AppServices> {
        let signing = SigningConfig::new(
            b"0123456789abcdef0123456789abcdef".to_vec(),
            "https://eshop.test",
            "https://eshop.test",
        )
        .unwrap();
        Arc::new(AppServices {
            authority: TokenAuthority::new(Arc::new(InMemoryCredentialStore::new()), &signing),
            users: UserDirectory::new(source),
            catalog: ProductCatalog::new(Arc::new(InMemoryProductStore::new())),
            validator: Arc::new(Hs256TokenCodec::new(&signing)),
        })
    }

    #[tokio::test]
    async fn rejected_page_parameters_make_no_store_calls() {
        let source = Arc::new(CountingSource::default());
        let services = services(source.clone());

        for params in [
            PagingParams { page_index: Some(0), ..Default::default() },
            PagingParams { page_size: Some(0), ..Default::default() },
            PagingParams { page_size: Some(1001), ..Default::default() },
        ] {
            let response = paging(Extension(services.clone()), Query(params)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        let response = paging(Extension(services), Query(PagingParams::default())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(source.calls.load(Ordering::SeqCst) > 0);
    }
}
