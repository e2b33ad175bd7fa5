//! The final generation call: one multimodal request carrying the composed
//! prompt, the text plates (first) and every reference image.

use crate::gemini::wire::{Content, GenerateContentRequest, Part};
use crate::gemini::GeminiClient;
use crate::pipeline::types::{GeneratedImage, ImageReference, PipelineError};
use base64::{engine::general_purpose, Engine as _};

pub async fn generate(
    client: &GeminiClient,
    model: &str,
    prompt: &str,
    text_plates: &[ImageReference],
    reference_images: &[ImageReference],
) -> Result<GeneratedImage, PipelineError> {
    let mut parts = vec![Part::text(prompt)];
    for plate in text_plates {
        parts.push(Part::from_image(plate));
    }
    for image in reference_images {
        parts.push(Part::from_image(image));
    }

    let request = GenerateContentRequest {
        contents: vec![Content::user(parts)],
        system_instruction: None,
        generation_config: None,
    };

    let response = client.generate_content(model, &request).await.map_err(|e| {
        if e.is_auth_failure() {
            PipelineError::InvalidCredential(e.to_string())
        } else {
            PipelineError::Generation(e.to_string())
        }
    })?;

    let Some(inline) = response.first_inline_image() else {
        // Surface refusal prose when the model replied with words instead
        // of pixels.
        let prose = response.text_parts().join(" ");
        let detail = if prose.is_empty() {
            "no image produced".to_string()
        } else {
            format!("no image produced (model said: {})", prose)
        };
        return Err(PipelineError::Generation(detail));
    };

    let data = general_purpose::STANDARD
        .decode(&inline.data)
        .map_err(|e| PipelineError::Generation(format!("image payload decode failed: {}", e)))?;

    let mime_type = if inline.mime_type.is_empty() {
        "image/png".to_string()
    } else {
        inline.mime_type.clone()
    };

    Ok(GeneratedImage { mime_type, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image_response() -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
                ]}
            }]
        })
    }

    #[tokio::test]
    async fn test_generate_returns_data_url_ready_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/painter:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("key", server.uri());
        let image = generate(&client, "painter", "a stop sign", &[], &[])
            .await
            .unwrap();

        assert_eq!(image.data, vec![1, 2, 3]);
        assert_eq!(image.data_url(), "data:image/png;base64,AQID");
    }

    #[tokio::test]
    async fn test_plates_precede_references_in_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/painter:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
            .mount(&server)
            .await;

        let plate = ImageReference::new("text_plate_STOP.png", "image/png", vec![1]);
        let reference = ImageReference::new("mood.jpg", "image/jpeg", vec![2]);

        let client = GeminiClient::with_base_url("key", server.uri());
        generate(&client, "painter", "a stop sign", &[plate], &[reference])
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts[0]["text"].is_string());
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[2]["inlineData"]["mimeType"], "image/jpeg");
    }

    #[tokio::test]
    async fn test_text_only_reply_is_no_image_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/painter:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "I cannot draw that."}]}
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("key", server.uri());
        let err = generate(&client, "painter", "a stop sign", &[], &[])
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("no image produced"));
        assert!(message.contains("I cannot draw that."));
    }
}
