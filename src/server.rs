//! Axum router construction.
//!
//! The [`app`] function wires the presign route and the operational
//! endpoints to their handlers and returns a ready-to-serve
//! [`axum::Router`].
//!
//! Dispatch order matches the API contract: incomplete storage
//! configuration is a 500 before anything else, then an unknown method
//! (including `HEAD`) is a 405 on any path, then an unknown path with `GET`
//! is a 404.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::errors::{generate_request_id, GatewayError};
use crate::handlers;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::presign::PresignedUpload;
use crate::AppState;

/// Value of the `server` response header.
const SERVER_NAME: &str = "presigner";

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the presigner API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "presigner",
        description = "Issues SigV4 presigned upload URLs for S3-compatible storage"
    ),
    paths(health_check, crate::handlers::presign::presigned_url),
    components(schemas(PresignedUpload)),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Upload", description = "Presigned upload URLs"),
    )
)]
pub struct ApiDoc;

/// Build the axum [`Router`].
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route(
            "/presignedUrl",
            get(handlers::presign::presigned_url)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .route("/health", get(health_check).fallback(method_not_allowed))
        .route("/openapi.json", get(openapi_json).fallback(method_not_allowed));

    if state.config.observability.metrics {
        router = router.route("/metrics", get(metrics_handler).fallback(method_not_allowed));
    }

    router
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

// -- Common headers middleware -----------------------------------------------

/// Adds `x-request-id` (16-character uppercase hex) and `server` to every
/// response.
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(&generate_request_id()) {
            headers.insert("x-request-id", value);
        }
    }
    headers.insert("server", HeaderValue::from_static(SERVER_NAME));

    response
}

// -- Fallbacks ---------------------------------------------------------------

/// Incomplete storage configuration outranks any routing error.
fn routing_error(state: &AppState, err: GatewayError) -> GatewayError {
    match state.config.storage.upload_target() {
        Ok(_) => err,
        Err(config_err) => config_err.into(),
    }
}

/// Known path, wrong method.
async fn method_not_allowed(State(state): State<Arc<AppState>>) -> GatewayError {
    routing_error(&state, GatewayError::MethodNotAllowed)
}

/// Unknown path: non-GET methods are rejected before the path is considered.
async fn fallback(State(state): State<Arc<AppState>>, method: Method) -> GatewayError {
    let err = if method == Method::GET {
        GatewayError::NotFound
    } else {
        GatewayError::MethodNotAllowed
    };
    routing_error(&state, err)
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

/// `GET /openapi.json` -- OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::header;
    use tower::ServiceExt;

    fn configured() -> Config {
        let mut config = Config::default();
        config.storage.endpoint = "storage.example.com".to_string();
        config.storage.bucket = "uploads".to_string();
        config.storage.access_key = "AKID".to_string();
        config.storage.secret_key = "secret".to_string();
        config
    }

    fn router(config: Config) -> Router {
        app(Arc::new(AppState { config }))
    }

    async fn send(router: Router, method: Method, uri: &str) -> Response {
        router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_presign_success() {
        let response = send(router(configured()), Method::GET, "/presignedUrl?filename=photo.png").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()["server"], "presigner");
        assert_eq!(response.headers()["x-request-id"].len(), 16);

        let body = json(response).await;
        let public_url = body["public_url"].as_str().unwrap();
        let upload_url = body["upload_url"].as_str().unwrap();
        assert!(public_url.starts_with("http://storage.example.com/uploads/"));
        assert!(public_url.ends_with(".png"));
        assert!(upload_url.starts_with(public_url));
        assert!(upload_url.contains("X-Amz-Expires=300"));

        let signature = upload_url.split("X-Amz-Signature=").nth(1).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_presign_uses_configured_origin() {
        let mut config = configured();
        config.cors.origin = "https://app.example.com".to_string();
        let response = send(router(config), Method::GET, "/presignedUrl?filename=a.txt").await;
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn test_presign_decodes_filename() {
        let response = send(
            router(configured()),
            Method::GET,
            "/presignedUrl?filename=my%20holiday%20photo.JPG",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        let public_url = body["public_url"].as_str().unwrap();
        assert!(public_url.ends_with(".JPG"));
        assert!(!public_url.contains("holiday"));
    }

    #[tokio::test]
    async fn test_missing_filename() {
        let response = send(router(configured()), Method::GET, "/presignedUrl").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json(response).await,
            serde_json::json!({ "error": "Missing filename parameter" })
        );
    }

    #[tokio::test]
    async fn test_empty_filename() {
        let response = send(router(configured()), Method::GET, "/presignedUrl?filename=").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Missing filename parameter");
    }

    #[tokio::test]
    async fn test_post_is_method_not_allowed() {
        let response = send(router(configured()), Method::POST, "/presignedUrl?filename=a.png").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET");
        assert_eq!(
            json(response).await,
            serde_json::json!({ "error": "Method not allowed", "allowed_methods": ["GET"] })
        );
    }

    #[tokio::test]
    async fn test_head_is_method_not_allowed() {
        let response = send(router(configured()), Method::HEAD, "/presignedUrl?filename=a.png").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET");
    }

    #[tokio::test]
    async fn test_repeated_filename_uses_first() {
        let response = send(
            router(configured()),
            Method::GET,
            "/presignedUrl?filename=a.png&filename=b.jpg",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert!(body["public_url"].as_str().unwrap().ends_with(".png"));
    }

    #[tokio::test]
    async fn test_configuration_checked_before_method() {
        let response = send(router(Config::default()), Method::POST, "/presignedUrl").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::ALLOW).is_none());
        assert_eq!(json(response).await["error"], "Failed to generate presigned URL");

        let response = send(router(Config::default()), Method::DELETE, "/elsewhere").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_configuration_checked_before_path() {
        let response = send(router(Config::default()), Method::GET, "/nope").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json(response).await["details"],
            "Missing required environment variables: MINIO_ENDPOINT, MINIO_BUCKET, MINIO_ACCESS_KEY, MINIO_SECRET_KEY"
        );
    }

    #[tokio::test]
    async fn test_wrong_method_on_unknown_path() {
        let response = send(router(configured()), Method::DELETE, "/elsewhere").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let response = send(router(configured()), Method::GET, "/upload").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["error"], "Not Found");
    }

    #[tokio::test]
    async fn test_missing_configuration() {
        let mut config = configured();
        config.storage.secret_key.clear();
        config.storage.bucket.clear();
        let response = send(router(config), Method::GET, "/presignedUrl?filename=a.png").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json(response).await,
            serde_json::json!({
                "error": "Failed to generate presigned URL",
                "details": "Missing required environment variables: MINIO_BUCKET, MINIO_SECRET_KEY"
            })
        );
    }

    #[tokio::test]
    async fn test_configuration_checked_before_filename() {
        let response = send(router(Config::default()), Method::GET, "/presignedUrl").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_tls_and_port_in_urls() {
        let mut config = configured();
        config.storage.use_ssl = true;
        config.storage.port = Some(9443);
        let response = send(router(config), Method::GET, "/presignedUrl?filename=a.png").await;
        let body = json(response).await;
        assert!(body["public_url"]
            .as_str()
            .unwrap()
            .starts_with("https://storage.example.com:9443/uploads/"));
    }

    #[tokio::test]
    async fn test_health() {
        let response = send(router(configured()), Method::GET, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_openapi_lists_presign_route() {
        let response = send(router(configured()), Method::GET, "/openapi.json").await;
        assert_eq!(response.status(), StatusCode::OK);
        let doc = json(response).await;
        assert!(doc["paths"]["/presignedUrl"]["get"].is_object());
    }

    #[tokio::test]
    async fn test_metrics_route_disabled() {
        let mut config = configured();
        config.observability.metrics = false;
        let response = send(router(config), Method::GET, "/metrics").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
