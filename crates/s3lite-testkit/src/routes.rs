//! HTTP route definitions

use crate::{handlers, middleware, ApiError, AppState, S3ErrorCode};
use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::HeaderMap,
    middleware as axum_middleware,
    response::Response,
    routing::get,
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Service endpoints
        .route("/", get(handlers::list_buckets))
        // Bucket endpoints
        .route(
            "/{bucket}",
            get(bucket_get_handler)
                .put(handlers::create_bucket)
                .delete(handlers::delete_bucket)
                .head(handlers::head_bucket),
        )
        // Object endpoints
        .route(
            "/{bucket}/{*key}",
            get(handlers::get_object)
                .put(object_put_handler)
                .head(handlers::head_object)
                .delete(object_delete_handler)
                .post(object_post_handler),
        )
        // Apply middleware
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}

/// GET on a bucket is only ListObjectsV2
async fn bucket_get_handler(
    state: State<Arc<AppState>>,
    path: Path<String>,
    query: Query<handlers::ListObjectsParams>,
) -> Result<Response, ApiError> {
    if query.list_type != Some(2) {
        return Err(ApiError::s3(
            S3ErrorCode::InvalidRequest,
            "Only ListObjectsV2 (list-type=2) is supported",
        ));
    }
    handlers::list_objects(state, path, query).await
}

/// Handler that routes PUT to either upload_part or put_object
async fn object_put_handler(
    state: State<Arc<AppState>>,
    path: Path<(String, String)>,
    query: Query<handlers::MultipartParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if query.upload_id.is_some() {
        handlers::upload_part(state, path, query, headers, body).await
    } else {
        handlers::put_object(state, path, headers, body).await
    }
}

/// Handler for DELETE with optional uploadId parameter
async fn object_delete_handler(
    state: State<Arc<AppState>>,
    path: Path<(String, String)>,
    query: Query<handlers::MultipartParams>,
) -> Result<Response, ApiError> {
    if query.upload_id.is_some() {
        handlers::abort_multipart_upload(state, path, query).await
    } else {
        handlers::delete_object(state, path).await
    }
}

/// Handler for POST (multipart operations)
async fn object_post_handler(
    state: State<Arc<AppState>>,
    path: Path<(String, String)>,
    query: Query<handlers::MultipartParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if query.uploads.is_some() {
        handlers::create_multipart_upload(state, path, headers).await
    } else if query.upload_id.is_some() {
        handlers::complete_multipart_upload(state, path, query, headers, body).await
    } else {
        Err(ApiError::s3(
            S3ErrorCode::InvalidRequest,
            "Invalid POST request",
        ))
    }
}
