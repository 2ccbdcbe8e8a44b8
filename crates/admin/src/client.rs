//! Typed HTTP clients for the back-office API.
//!
//! Every response is an `ApiResult` envelope. GET requests are retried with
//! exponential backoff on network errors and 5xx responses; anything that
//! changes state is sent exactly once.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use eshop_auth::{LoginRequest, RegisterRequest, UserUpdateRequest, UserVm};
use eshop_core::{ApiResult, PageRequest, PageResult, PagingParams, ProductId, RetryPolicy, UserId};
use eshop_products::{ProductCreateRequest, ProductUpdateRequest, ProductVm};

use crate::config::AdminConfig;
use crate::error::ClientError;

/// Shared transport: base address, bearer token and retry budget.
#[derive(Debug, Clone)]
pub struct BaseApiClient {
    http: reqwest::Client,
    base_address: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl BaseApiClient {
    pub fn new(base_address: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_address: base_address.into().trim_end_matches('/').to_string(),
            token: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.base_address.clone()).with_retry(config.retry)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A copy of this client that sends `Authorization: Bearer <token>`.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_address, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn get<T>(&self, path: &str) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        self.get_with(path, |req| req).await
    }

    pub async fn get_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.get_with(path, |req| req.query(query)).await
    }

    async fn get_with<T, F>(&self, path: &str, build: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let build = &build;
        self.retry
            .run(
                path,
                || async move { send(build(self.request(Method::GET, path))).await },
                ClientError::is_transient,
            )
            .await
    }

    pub async fn send_json<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        send(self.request(method, path).json(body)).await
    }

    pub async fn send_empty<T>(&self, method: Method, path: &str) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        send(self.request(method, path)).await
    }
}

async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
    let resp = req
        .send()
        .await
        .map_err(|e| ClientError::Network(e.to_string()))?;
    decode(resp).await
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| ClientError::Network(e.to_string()))?;

    match serde_json::from_str::<ApiResult<T>>(&body) {
        Ok(envelope) if status.is_success() && envelope.is_success => {
            envelope.into_result().map_err(ClientError::Parse)
        }
        Ok(envelope) => Err(ClientError::Api {
            status: status.as_u16(),
            message: envelope.message,
        }),
        // Framework-level rejections (bad JSON, 405) carry a plain-text body.
        Err(_) if !status.is_success() => Err(ClientError::Api {
            status: status.as_u16(),
            message: body,
        }),
        Err(e) => Err(ClientError::Parse(e.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct UserApiClient {
    base: BaseApiClient,
}

impl UserApiClient {
    pub fn new(base: BaseApiClient) -> Self {
        Self { base }
    }

    /// Returns the signed session token.
    pub async fn authenticate(&self, request: &LoginRequest) -> Result<String, ClientError> {
        self.base
            .send_json(Method::POST, "/api/users/authenticate", request)
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ClientError> {
        let _: bool = self.base.send_json(Method::POST, "/api/users", request).await?;
        Ok(())
    }

    pub async fn get_users_paging(&self, request: &PageRequest) -> Result<PageResult<UserVm>, ClientError> {
        self.base
            .get_query("/api/users/paging", &PagingParams::from(request))
            .await
    }

    pub async fn get_by_id(&self, id: UserId) -> Result<UserVm, ClientError> {
        self.base.get(&format!("/api/users/{id}")).await
    }

    pub async fn update(&self, id: UserId, request: &UserUpdateRequest) -> Result<(), ClientError> {
        let _: bool = self
            .base
            .send_json(Method::PUT, &format!("/api/users/{id}"), request)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProductApiClient {
    base: BaseApiClient,
}

impl ProductApiClient {
    pub fn new(base: BaseApiClient) -> Self {
        Self { base }
    }

    pub async fn get_product_pagings(
        &self,
        request: &PageRequest,
    ) -> Result<PageResult<ProductVm>, ClientError> {
        self.base
            .get_query("/api/products/paging", &PagingParams::from(request))
            .await
    }

    pub async fn get_public_pagings(
        &self,
        language_id: &str,
        request: &PageRequest,
    ) -> Result<PageResult<ProductVm>, ClientError> {
        self.base
            .get_query(&format!("/api/products/public/{language_id}"), &PagingParams::from(request))
            .await
    }

    pub async fn get_by_id(&self, id: ProductId, language_id: &str) -> Result<ProductVm, ClientError> {
        self.base
            .get(&format!("/api/products/{id}/{language_id}"))
            .await
    }

    pub async fn create(&self, request: &ProductCreateRequest) -> Result<ProductId, ClientError> {
        self.base.send_json(Method::POST, "/api/products", request).await
    }

    pub async fn update(&self, request: &ProductUpdateRequest) -> Result<u64, ClientError> {
        self.base.send_json(Method::PUT, "/api/products", request).await
    }

    pub async fn delete(&self, id: ProductId) -> Result<u64, ClientError> {
        self.base
            .send_empty(Method::DELETE, &format!("/api/products/{id}"))
            .await
    }

    pub async fn update_price(&self, id: ProductId, new_price: i64) -> Result<bool, ClientError> {
        self.base
            .send_empty(Method::PATCH, &format!("/api/products/{id}/{new_price}"))
            .await
    }
}
