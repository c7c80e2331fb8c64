pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::DistributionConfig;
use crate::services::storage::FileSystem;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::receive_upload,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::Role,
            models::UploadResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "upload", description = "Build ingestion"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: DistributionConfig,
    pub fs: Arc<dyn FileSystem>,
    pub upload_service: Arc<UploadService>,
}

impl AppState {
    pub fn new(config: DistributionConfig, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            upload_service: Arc::new(UploadService::new(config.clone(), fs.clone())),
            config,
            fs,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/upload",
            post(api::handlers::upload::receive_upload)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_upload_size,
                ))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::basic_auth_middleware,
                )),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
