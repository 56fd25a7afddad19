use crate::agent::BookingAgent;
use crate::cli::Args;
use crate::error::BookingError;
use crate::locale::Locale;
use crate::models::chat::{ ChatRequest, ChatResponse, ErrorResponse };
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ rejection::JsonRejection, State },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use governor::{ DefaultDirectRateLimiter, Quota, RateLimiter };
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

#[derive(Clone)]
pub struct AppState {
    agent: Option<Arc<BookingAgent>>,
    contact_email: String,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl AppState {
    pub fn new(agent: Option<Arc<BookingAgent>>, contact_email: String, per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            agent,
            contact_email,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

pub async fn start_http_server(
    args: &Args,
    state: AppState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = args.server_addr.parse::<SocketAddr>()
        .map_err(|e| format!("Invalid SERVER_ADDR '{}': {}", args.server_addr, e))?;
    let app = router(state);

    match (args.enable_tls, &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;
            info!("Starting HTTPS server on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await?;
        }
        (enable_tls, _, _) => {
            if enable_tls {
                warn!("ENABLE_TLS is set but TLS_CERT_PATH or TLS_KEY_PATH is missing. Serving plain HTTP.");
            }
            let listener = tokio::net::TcpListener::bind(addr).await
                .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e))?;
            info!("Starting HTTP server on: http://{}", addr);
            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}

fn error_response(status: StatusCode, error: impl Into<String>, response: Option<String>) -> Response {
    (status, Json(ErrorResponse { error: error.into(), response })).into_response()
}

fn fallback_response(text: String) -> Response {
    Json(ChatResponse { response: text, booked: false, booking_details: None }).into_response()
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            warn!("Rejected chat request body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text(), None);
        }
    };

    if request.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message is required", None);
    }

    let locale = Locale::from_tag(request.locale.as_deref());

    if state.limiter.check().is_err() {
        warn!("Chat rate limit exceeded");
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests",
            Some(locale.rate_limited_message().to_string())
        );
    }

    let Some(agent) = &state.agent else {
        return fallback_response(locale.setup_message(&state.contact_email));
    };

    match agent.converse(&request.message, locale, &request.conversation_history).await {
        Ok(outcome) => Json(ChatResponse::from(outcome)).into_response(),
        Err(BookingError::Validation(message)) => {
            error_response(StatusCode::BAD_REQUEST, message, None)
        }
        Err(e) if e.is_backend_failure() => {
            warn!("Answering with email fallback: {}", e);
            fallback_response(locale.backend_unavailable_message(&state.contact_email))
        }
        Err(e) => {
            error!("Chat API error: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process message",
                Some(locale.internal_error_message().to_string())
            )
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
