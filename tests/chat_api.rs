use async_trait::async_trait;
use axum::body::{ to_bytes, Body };
use axum::http::{ Request, StatusCode };
use axum::Router;
use booking_agent::agent::{ AgentSettings, BookingAgent };
use booking_agent::calendar::slots::AdmitAll;
use booking_agent::calendar::Scheduler;
use booking_agent::config::prompt::PromptConfig;
use booking_agent::llm::LlmType;
use booking_agent::llm::chat::{ LlmError, ModelBackend, ModelRequest, ModelResponse, ToolCall };
use booking_agent::server::api::{ router, AppState };
use chrono_tz::America::New_York;
use serde_json::{ json, Value as JsonValue };
use std::collections::VecDeque;
use std::sync::{ Arc, Mutex };
use tower::ServiceExt;

struct ScriptedBackend(Mutex<VecDeque<Result<ModelResponse, LlmError>>>);

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete_with_tools(
        &self,
        _request: ModelRequest<'_>
    ) -> Result<ModelResponse, LlmError> {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".into())))
    }

    fn get_model(&self) -> String {
        "scripted".into()
    }

    fn get_llm_type(&self) -> LlmType {
        LlmType::OpenAI
    }
}

fn app_with(script: Vec<Result<ModelResponse, LlmError>>) -> Router {
    let scheduler = Arc::new(Scheduler::new(New_York, "LeadFlow AI").with_admission(Arc::new(AdmitAll)));
    let agent = BookingAgent::new(
        Arc::new(ScriptedBackend(Mutex::new(script.into()))),
        scheduler.clone(),
        scheduler,
        Arc::new(PromptConfig::builtin().with_company("LeadFlow AI")),
        AgentSettings::default()
    );
    router(AppState::new(Some(Arc::new(agent)), "hello@leadflow.ai".into(), 100))
}

fn setup_mode_app() -> Router {
    router(AppState::new(None, "hello@leadflow.ai".into(), 100))
}

async fn post_chat(app: Router, body: JsonValue) -> (StatusCode, JsonValue) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn empty_message_is_a_validation_error() {
    let (status, body) = post_chat(setup_mode_app(), json!({ "message": "  ", "locale": "en" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Message is required" }));
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = setup_mode_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn setup_mode_answers_in_the_requested_language() {
    let (status, body) = post_chat(setup_mode_app(), json!({ "message": "Hola", "locale": "es" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booked"], false);
    let text = body["response"].as_str().unwrap();
    assert!(text.starts_with("¡Gracias por tu interés!"));
    assert!(text.contains("hello@leadflow.ai"));
}

#[tokio::test]
async fn booking_turn_returns_booking_details() {
    let app = app_with(
        vec![
            Ok(
                ModelResponse::tool_use(ToolCall {
                    id: "call_1".into(),
                    name: "book_slot".into(),
                    input: json!({
                        "datetime": "2025-01-15T14:00:00.000Z",
                        "name": "Ada",
                        "email": "ada@example.com"
                    }),
                })
            ),
            Ok(ModelResponse::text("You're booked for Wednesday at 9:00 AM!"))
        ]
    );

    let (status, body) = post_chat(
        app,
        json!({
            "message": "Ada, ada@example.com",
            "locale": "en",
            "conversationHistory": [
                { "id": "greeting", "content": "Hi! When works for you?", "isBot": true },
                { "id": "1", "content": "Wednesday at 9", "isFromAssistant": false }
            ]
        })
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booked"], true);
    assert_eq!(body["response"], "You're booked for Wednesday at 9:00 AM!");
    assert_eq!(
        body["bookingDetails"],
        json!({
            "date": "Wednesday, January 15, 2025",
            "time": "9:00 AM",
            "name": "Ada",
            "email": "ada@example.com"
        })
    );
}

#[tokio::test]
async fn backend_outage_gets_the_email_fallback() {
    let app = app_with(vec![Err(LlmError::Api { status: 401, body: "bad key".into() })]);

    let (status, body) = post_chat(app, json!({ "message": "Hi", "locale": "en" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booked"], false);
    assert!(body["response"].as_str().unwrap().contains("hello@leadflow.ai"));
    assert!(body.get("bookingDetails").is_none());
}

#[tokio::test]
async fn unknown_locale_falls_back_to_english() {
    let (_, body) = post_chat(setup_mode_app(), json!({ "message": "Bonjour", "locale": "fr" })).await;
    assert!(body["response"].as_str().unwrap().starts_with("Thanks for your interest!"));
}

#[tokio::test]
async fn requests_beyond_the_rate_limit_are_refused() {
    let app = router(AppState::new(None, "hello@leadflow.ai".into(), 1));

    let (first, _) = post_chat(app.clone(), json!({ "message": "Hi" })).await;
    let (second, body) = post_chat(app, json!({ "message": "Hi", "locale": "es" })).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["response"].as_str().unwrap().starts_with("Estamos recibiendo"));
}

#[tokio::test]
async fn health_reports_ok() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = setup_mode_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}
