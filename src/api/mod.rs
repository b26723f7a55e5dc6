#![allow(clippy::needless_for_each)]

use crate::api::handlers::{
    auth::{
        self,
        challenge::{__path_login_challenge, __path_register_challenge},
        session::{__path_logout, __path_session},
        types,
        verify::{__path_login_verify, __path_register_verify},
    },
    health::{self, __path_health},
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Request, StatusCode,
        header::{REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    },
    middleware,
    response::Response,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod cookies;
pub mod gate;
pub(crate) mod handlers;

pub use handlers::auth::{AuthConfig, AuthState, SessionMode};

const REQUEST_ID: &str = "x-request-id";

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        register_challenge,
        register_verify,
        login_challenge,
        login_verify,
        session,
        logout
    ),
    components(schemas(
        health::Health,
        types::RegisterChallengeRequest,
        types::RegisterVerifyRequest,
        types::LoginChallengeRequest,
        types::LoginVerifyRequest,
        types::RegistrationChallengeResponse,
        types::LoginChallengeResponse,
        types::VerifyResponse,
        types::SessionResponse,
        types::ErrorResponse,
    )),
    tags(
        (name = "auth", description = "Passkey ceremonies and sessions"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Application router.
///
/// Everything registered before the gate layer goes through it; `/health` and
/// the Swagger UI are added afterwards and stay reachable without a session.
pub fn router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/", get(|| async { "🌱" }))
        .route(
            "/api/auth/register-challenge",
            post(auth::challenge::register_challenge),
        )
        .route(
            "/api/auth/register-verify",
            post(auth::verify::register_verify),
        )
        .route(
            "/api/auth/login-challenge",
            post(auth::challenge::login_challenge),
        )
        .route("/api/auth/login-verify", post(auth::verify::login_verify))
        .route("/api/auth/session", get(auth::session::session))
        .route("/api/auth/logout", post(auth::session::logout))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gate::gate))
        .route("/health", get(health::health).options(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(Extension(state))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::if_not_present(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    REFERRER_POLICY,
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                )),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, state: Arc<AuthState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

async fn not_found() -> Response {
    handlers::auth::error_response(StatusCode::NOT_FOUND, "Not found")
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
