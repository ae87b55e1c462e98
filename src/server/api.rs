use crate::agent::TutorAgent;
use crate::cli::Args;
use crate::models::chat::{ ChatReply, ChatRequest, ErrorBody };
use axum::{
    extract::{ rejection::JsonRejection, State },
    http::StatusCode,
    response::{ Html, IntoResponse, Response },
    routing::{ get, post },
    Json,
    Router,
};
use governor::{ DefaultDirectRateLimiter, Quota, RateLimiter };
use log::{ error, info, warn };
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };
use tower_http::services::ServeDir;

/// Returned for every failure whose cause stays server-side.
pub const GENERIC_ERROR: &str = "Failed to get response from AI.";

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Clone)]
struct AppState {
    agent: Arc<TutorAgent>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

fn error_response(status: StatusCode, error: &str, details: Option<Vec<String>>) -> Response {
    (status, Json(ErrorBody { error: error.to_string(), details })).into_response()
}

/// Builds the application router. A `rate_limit` of zero disables limiting.
pub fn router(agent: Arc<TutorAgent>, videos_dir: PathBuf, rate_limit: u32) -> Router {
    let limiter = NonZeroU32::new(rate_limit).map(|per_second|
        Arc::new(RateLimiter::direct(Quota::per_second(per_second)))
    );
    let state = AppState { agent, limiter };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/hello", get(hello_handler))
        .route("/api/chat", post(chat_handler))
        .nest_service("/videos", ServeDir::new(videos_dir))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    addr: &str,
    app: Router,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;

    match (args.enable_tls, &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;
            info!("Starting HTTPS server on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        }
        (true, _, _) => {
            return Err("--enable-tls requires both --tls-cert-path and --tls-key-path".into());
        }
        _ => {
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                e
            })?;
            info!("Starting HTTP server on: http://{}", addr);
            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn hello_handler() -> &'static str {
    "Hello from the math tutor backend!"
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Response {
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            warn!("Chat request rejected by rate limiter");
            return error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please slow down.",
                None
            );
        }
    }

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Malformed chat request: {}", rejection.body_text());
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid request body.",
                Some(vec![rejection.body_text()])
            );
        }
    };

    if request.message.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request body.",
            Some(vec!["message must not be empty".to_string()])
        );
    }

    match state.agent.process_message(&request.message).await {
        Ok(reply) => (StatusCode::OK, Json::<ChatReply>(reply)).into_response(),
        Err(e) => {
            if e.is_schema_validation() {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "The AI returned a malformed lesson plan.",
                    e.validation_details().map(<[String]>::to_vec)
                );
            }
            error!("Chat request failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR, None)
        }
    }
}
