use crate::config::{CredentialStore, EngineConfig};
use crate::pipeline::{
    AspectRatio, GenerationRequest, GenerationTarget, Orchestrator,
};
use crate::plate::PlateRenderer;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ── Endpoint Fixtures ───────────────────────────────────────

/// A `generateContent` reply with a single text part.
pub fn text_response(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]}
        }]
    })
}

/// A `generateContent` reply with a single inline PNG (bytes 1,2,3).
pub fn image_response() -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [
                {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
            ]}
        }]
    })
}

/// A full engineering reply, optionally naming a grounding entity.
pub fn engineered_reply(grounding: Option<&str>) -> String {
    json!({
        "analysis": "subject plus one rendered text element",
        "grounding_search_query": grounding,
        "target": "image",
        "final_prompt": "A photorealistic stop sign at a rainy intersection at dusk, 1:1",
        "text_replication_instruction": "Replicate text plate 1 exactly as rendered, glyph for glyph.",
        "negative_prompt": "blurry, deformed, duplicated subjects, garbled text",
    })
    .to_string()
}

pub async fn mount_model(server: &MockServer, model: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(format!("/models/{}:generateContent", model)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub fn requests_for<'a>(received: &'a [Request], model: &str) -> Vec<&'a Request> {
    let marker = format!("/models/{}:", model);
    received
        .iter()
        .filter(|r| r.url.path().contains(&marker))
        .collect()
}

// ── Orchestrator Setup ──────────────────────────────────────

/// An orchestrator wired to the mock server, with each pipeline stage on
/// its own model id so mocks can tell the calls apart. Returns the temp
/// dir holding the credential file.
pub fn make_orchestrator(server: &MockServer, with_renderer: bool) -> (Orchestrator, TempDir) {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let credentials = CredentialStore::new(tmp.path());
    credentials.save("test-key").expect("failed to seed credential");

    let config = EngineConfig {
        base_url: Some(server.uri()),
        quoting_model: "quoter".to_string(),
        engineering_model: "engineer".to_string(),
        grounding_model: "grounder".to_string(),
        generation_model: "painter".to_string(),
        font_path: None,
        output_dir: None,
    };

    let renderer = if with_renderer {
        PlateRenderer::from_system_fonts().ok()
    } else {
        None
    };

    (
        Orchestrator::new("test-key", config, renderer, credentials),
        tmp,
    )
}

pub fn image_request(prompt: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.to_string(),
        target: GenerationTarget::Image,
        aspect_ratio: AspectRatio::Square,
        reference_images: Vec::new(),
    }
}
