//! Prompt engineering: one multimodal call that turns the quoted prompt,
//! text plates and reference images into a structured generation brief.

use super::instructions::{IMAGE_ENGINEERING_SYSTEM_PROMPT, VIDEO_ENGINEERING_SYSTEM_PROMPT};
use crate::gemini::wire::{Content, GenerateContentRequest, GenerationParameters, Part};
use crate::gemini::GeminiClient;
use crate::pipeline::types::{
    AspectRatio, EngineeredPrompt, GenerationTarget, ImageReference, PipelineError,
};
use serde_json::json;
use tracing::warn;

/// Run the engineering call. A response that is not the expected JSON object
/// is a hard failure carrying the raw response text; there is no retry and
/// no cache, exactly one round trip per invocation.
pub async fn engineer(
    client: &GeminiClient,
    model: &str,
    prompt: &str,
    target: GenerationTarget,
    text_plates: &[ImageReference],
    reference_images: &[ImageReference],
    aspect_ratio: AspectRatio,
) -> Result<EngineeredPrompt, PipelineError> {
    let mut parts = vec![Part::text(format!(
        "User prompt: {}\nRequested aspect ratio: {}",
        prompt,
        aspect_ratio.as_ratio()
    ))];

    for (i, plate) in text_plates.iter().enumerate() {
        parts.push(Part::text(format!(
            "Text plate {} ({}), this exact text must appear in the output:",
            i + 1,
            plate.name
        )));
        parts.push(Part::from_image(plate));
    }

    for (i, image) in reference_images.iter().enumerate() {
        parts.push(Part::text(format!("Reference image {} ({}):", i + 1, image.name)));
        parts.push(Part::from_image(image));
    }

    parts.push(Part::text("Produce the final JSON object now."));

    let system = match target {
        GenerationTarget::Image => IMAGE_ENGINEERING_SYSTEM_PROMPT,
        GenerationTarget::Video => VIDEO_ENGINEERING_SYSTEM_PROMPT,
    };

    let request = GenerateContentRequest {
        contents: vec![Content::user(parts)],
        system_instruction: Some(Content::system_text(system)),
        generation_config: Some(GenerationParameters {
            temperature: Some(0.4),
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(response_schema(target)),
        }),
    };

    let response = client
        .generate_content_once(model, &request)
        .await
        .map_err(|e| {
            if e.is_auth_failure() {
                PipelineError::InvalidCredential(e.to_string())
            } else {
                PipelineError::Engineering(e.to_string())
            }
        })?;

    let raw = response.first_text().ok_or_else(|| {
        PipelineError::Engineering("engineering response contained no text".to_string())
    })?;

    parse_engineered(&raw, target)
}

fn parse_engineered(
    raw: &str,
    target: GenerationTarget,
) -> Result<EngineeredPrompt, PipelineError> {
    let mut parsed: EngineeredPrompt = serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
        PipelineError::Engineering(format!(
            "unparseable engineering response ({}); raw response: {}",
            e, raw
        ))
    })?;

    if parsed.target != target {
        warn!(
            "engineering response declared target '{}', expected '{}', overriding",
            parsed.target, target
        );
        parsed.target = target;
    }

    // Grounding references only exist for image targets.
    if parsed.target == GenerationTarget::Video {
        parsed.grounding_search_query = None;
    }
    if let Some(query) = &parsed.grounding_search_query {
        if query.trim().is_empty() {
            parsed.grounding_search_query = None;
        }
    }

    Ok(parsed)
}

/// JSON-mode fences some models still emit despite the response mime type.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Response schema for the structured engineering reply. The video variant
/// has no grounding field at all.
fn response_schema(target: GenerationTarget) -> serde_json::Value {
    let mut properties = json!({
        "analysis": {"type": "STRING"},
        "target": {"type": "STRING", "enum": ["image", "video"]},
        "final_prompt": {"type": "STRING"},
        "text_replication_instruction": {"type": "STRING"},
        "negative_prompt": {"type": "STRING"},
    });

    if target == GenerationTarget::Image {
        properties["grounding_search_query"] = json!({"type": "STRING", "nullable": true});
    }

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": ["analysis", "target", "final_prompt", "text_replication_instruction", "negative_prompt"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_response(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]}
            }]
        })
    }

    fn engineered_json(query: Option<&str>) -> String {
        json!({
            "analysis": "one subject, one text plate",
            "grounding_search_query": query,
            "target": "image",
            "final_prompt": "A photorealistic stop sign at a rainy intersection, 1:1",
            "text_replication_instruction": "Replicate text plate 1 (STOP) exactly as rendered.",
            "negative_prompt": "blurry, deformed, garbled text",
        })
        .to_string()
    }

    fn plate() -> ImageReference {
        ImageReference::new("text_plate_STOP.png", "image/png", vec![1, 2, 3])
    }

    #[tokio::test]
    async fn test_engineer_parses_structured_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/engineer:generateContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response(&engineered_json(Some("Azadi Tower Tehran")))),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("key", server.uri());
        let engineered = engineer(
            &client,
            "engineer",
            "a photo of the Azadi Tower that says \"تهران\"",
            GenerationTarget::Image,
            &[plate()],
            &[],
            AspectRatio::Square,
        )
        .await
        .unwrap();

        assert_eq!(
            engineered.grounding_search_query.as_deref(),
            Some("Azadi Tower Tehran")
        );
        assert!(engineered.text_replication_instruction.contains("STOP"));
        assert!(!engineered.negative_prompt.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_response_carries_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/engineer:generateContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response("sure! here is your prompt: a nice sign")),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("key", server.uri());
        let err = engineer(
            &client,
            "engineer",
            "a nice sign",
            GenerationTarget::Image,
            &[],
            &[],
            AspectRatio::Square,
        )
        .await
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("prompt engineering failed"));
        assert!(
            message.contains("here is your prompt: a nice sign"),
            "error must embed the raw response, got: {}",
            message
        );
    }

    #[tokio::test]
    async fn test_request_orders_plates_before_references() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/engineer:generateContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(text_response(&engineered_json(None))),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("key", server.uri());
        let reference = ImageReference::new("mood.jpg", "image/jpeg", vec![9, 9]);
        engineer(
            &client,
            "engineer",
            "a stop sign",
            GenerationTarget::Image,
            &[plate()],
            &[reference],
            AspectRatio::Landscape,
        )
        .await
        .unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();

        let labels: Vec<&str> = parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect();
        assert!(labels[0].contains("Requested aspect ratio: 16:9"));
        assert!(labels[1].starts_with("Text plate 1"));
        assert!(labels[2].starts_with("Reference image 1"));

        // Plate bytes precede reference bytes
        let inline_positions: Vec<usize> = parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.get("inlineData").is_some())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(inline_positions.len(), 2);
        assert!(inline_positions[0] < inline_positions[1]);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[tokio::test]
    async fn test_video_schema_omits_grounding_and_clears_query() {
        let server = MockServer::start().await;
        let video_reply = json!({
            "analysis": "tracking shot",
            "grounding_search_query": "should be dropped",
            "target": "video",
            "final_prompt": "Slow dolly-in on a neon sign, 16:9",
            "text_replication_instruction": "",
            "negative_prompt": "flicker",
        })
        .to_string();
        Mock::given(method("POST"))
            .and(path("/models/engineer:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&video_reply)))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("key", server.uri());
        let engineered = engineer(
            &client,
            "engineer",
            "a neon sign",
            GenerationTarget::Video,
            &[],
            &[],
            AspectRatio::Landscape,
        )
        .await
        .unwrap();

        assert!(engineered.grounding_search_query.is_none());

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        let schema_props = &body["generationConfig"]["responseSchema"]["properties"];
        assert!(schema_props.get("grounding_search_query").is_none());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_empty_grounding_query_normalized_to_none() {
        let raw = json!({
            "analysis": "",
            "grounding_search_query": "  ",
            "target": "image",
            "final_prompt": "a red balloon",
            "text_replication_instruction": "",
            "negative_prompt": "blurry",
        })
        .to_string();
        let parsed = parse_engineered(&raw, GenerationTarget::Image).unwrap();
        assert!(parsed.grounding_search_query.is_none());
    }
}
