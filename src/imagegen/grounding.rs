//! Grounding reference synthesis: a neutral photo of a named real-world
//! entity, used to pin the generation model to the entity's true appearance.

use crate::gemini::wire::{Content, GenerateContentRequest, Part};
use crate::gemini::GeminiClient;
use crate::pipeline::types::{ImageReference, PipelineError};
use base64::{engine::general_purpose, Engine as _};

pub const GROUNDING_REFERENCE_NAME: &str = "grounding_reference.png";

/// Ask the image model for an isolated, neutrally lit reference photo of
/// `query`. Fails when the response carries no image payload.
pub async fn fetch_grounding(
    client: &GeminiClient,
    model: &str,
    query: &str,
) -> Result<ImageReference, PipelineError> {
    let prompt = format!(
        "A photorealistic reference photograph of {}. The subject is isolated \
         and centered against a plain neutral background under soft, even \
         lighting, shown from a characteristic angle. No people, no text, no \
         watermarks, no logos.",
        query.trim()
    );

    let request = GenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(prompt)])],
        system_instruction: None,
        generation_config: None,
    };

    let response = client.generate_content(model, &request).await.map_err(|e| {
        if e.is_auth_failure() {
            PipelineError::InvalidCredential(e.to_string())
        } else {
            PipelineError::Grounding(e.to_string())
        }
    })?;

    let inline = response
        .first_inline_image()
        .ok_or_else(|| PipelineError::Grounding("no image in response".to_string()))?;

    let data = general_purpose::STANDARD
        .decode(&inline.data)
        .map_err(|e| PipelineError::Grounding(format!("image payload decode failed: {}", e)))?;

    let mime_type = if inline.mime_type.is_empty() {
        "image/png".to_string()
    } else {
        inline.mime_type.clone()
    };

    Ok(ImageReference::new(GROUNDING_REFERENCE_NAME, mime_type, data))
}
