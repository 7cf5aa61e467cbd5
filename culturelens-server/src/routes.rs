//! HTTP route handlers.
//!
//! Thin adapters between the wire and the core pipeline: no interpretation
//! logic lives here. Components that failed to initialize at startup are
//! absent from the state and their routes answer with a structured error
//! instead of failing the whole process.

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use culturelens_core::narration::NarrationPipeline;
use culturelens_core::pipeline::{InterpretPipeline, InterpretRequest};
use culturelens_core::vision::VisionResolver;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InterpretPipeline>,
    pub vision: Option<Arc<VisionResolver>>,
    pub narration: Option<Arc<NarrationPipeline>>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/analyze/image", post(analyze_image))
        .route("/interpret", post(interpret))
        .route("/lenses", get(lenses))
        .route("/reflect", post(reflect))
        .route("/audio/languages", get(audio_languages))
        .route("/audio/intro", post(audio_intro))
        .route("/audio/narrate", post(audio_narrate))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({"message": "CultureLens API", "status": "running"}))
}

/// `POST /analyze/image`: multipart image to recognition result.
async fn analyze_image(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let Some(vision) = &state.vision else {
        return service_disabled("image analysis");
    };

    let mut image: Option<Vec<u8>> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.bytes().await {
            Ok(bytes) => {
                image = Some(bytes.to_vec());
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read multipart field");
            }
        }
    }

    let Some(image) = image else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "No image file in request"})),
        )
            .into_response();
    };

    Json(vision.recognize(&image).await).into_response()
}

/// `POST /interpret`: the multi-stage interpretation pipeline.
async fn interpret(
    State(state): State<AppState>,
    Json(request): Json<InterpretRequest>,
) -> impl IntoResponse {
    Json(state.pipeline.interpret(&request).await)
}

/// `GET /lenses`: the static lens catalog.
async fn lenses() -> impl IntoResponse {
    Json(json!({
        "lenses": [
            {"id": "neutral", "name": "Neutral/Academic"},
            {"id": "local", "name": "Local Community"},
            {"id": "asian", "name": "Asian Perspective"},
            {"id": "european", "name": "European Perspective"},
            {"id": "indigenous", "name": "Indigenous Perspective"}
        ]
    }))
}

#[derive(Debug, Deserialize)]
struct ReflectRequest {
    object_id: String,
    #[serde(default)]
    reflection: String,
}

/// `POST /reflect`: acknowledge a user reflection (not durably stored).
async fn reflect(
    State(state): State<AppState>,
    Json(request): Json<ReflectRequest>,
) -> impl IntoResponse {
    Json(
        state
            .pipeline
            .sentiment()
            .add_reflection(&request.object_id, &request.reflection),
    )
}

async fn audio_languages(State(state): State<AppState>) -> Response {
    let Some(narration) = &state.narration else {
        return service_disabled("audio narration");
    };
    Json(json!({"languages": narration.available_languages()})).into_response()
}

#[derive(Debug, Deserialize)]
struct AudioRequest {
    object_id: String,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default = "default_audio_lens")]
    cultural_lens: String,
}

fn default_language() -> String {
    "english".to_string()
}

fn default_audio_lens() -> String {
    "local".to_string()
}

/// `POST /audio/intro`: short introduction narration for a landmark.
async fn audio_intro(State(state): State<AppState>, Json(request): Json<AudioRequest>) -> Response {
    let Some(narration) = &state.narration else {
        return service_disabled("audio narration");
    };

    let facts = state
        .pipeline
        .knowledge()
        .get_facts(&request.object_id, None, None)
        .await;
    let text = narration.intro_text(&facts.facts.name, &facts.facts.location);

    audio_response(
        narration.narrate(&text, &request.language).await,
        &format!("intro_{}.mp3", request.object_id),
    )
}

/// `POST /audio/narrate`: full narration in the requested language.
async fn audio_narrate(
    State(state): State<AppState>,
    Json(request): Json<AudioRequest>,
) -> Response {
    let Some(narration) = &state.narration else {
        return service_disabled("audio narration");
    };

    let facts = state
        .pipeline
        .knowledge()
        .get_facts(&request.object_id, None, None)
        .await;
    let interpretation = state
        .pipeline
        .interpreter()
        .interpret(&request.object_id, &request.cultural_lens, &facts)
        .await;
    let text = narration.compose_narration(&facts, Some(&interpretation));

    audio_response(
        narration.narrate(&text, &request.language).await,
        &format!("narration_{}_{}.mp3", request.object_id, request.language),
    )
}

/// Audio bytes as an MP3 attachment, or a JSON error carrying the text
/// that was attempted.
fn audio_response(result: culturelens_core::types::NarrationAudio, filename: &str) -> Response {
    match result.audio {
        Some(audio) => (
            [
                (header::CONTENT_TYPE, "audio/mpeg".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", filename),
                ),
            ],
            audio,
        )
            .into_response(),
        None => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": "Failed to generate audio", "text": result.text})),
        )
            .into_response(),
    }
}

fn service_disabled(what: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"error": format!("{} is not configured on this server", what)})),
    )
        .into_response()
}
