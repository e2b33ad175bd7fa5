//! Prompt quoting: wrap literal display-text spans in double quotes so the
//! rest of the pipeline knows which strings need text plates. This step is
//! best-effort and never blocks a generation.

use super::instructions::QUOTING_SYSTEM_PROMPT;
use crate::gemini::wire::{Content, GenerateContentRequest, GenerationParameters, Part};
use crate::gemini::GeminiClient;
use tracing::warn;

/// Ask the text model to quote literal-text spans in `prompt`. On any
/// failure (transport, credential, parse, or an empty reply) the original
/// prompt is returned unchanged. Empty input short-circuits without a
/// network call.
pub async fn add_quotes(client: &GeminiClient, model: &str, prompt: &str) -> String {
    if prompt.trim().is_empty() {
        return prompt.to_string();
    }

    let request = GenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(prompt)])],
        system_instruction: Some(Content::system_text(QUOTING_SYSTEM_PROMPT)),
        generation_config: Some(GenerationParameters {
            temperature: Some(0.0),
            ..Default::default()
        }),
    };

    match client.generate_content(model, &request).await {
        Ok(response) => match response.first_text() {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => {
                warn!("quoting model returned an empty reply, keeping original prompt");
                prompt.to_string()
            }
        },
        Err(e) => {
            warn!("prompt quoting failed, continuing with original prompt: {}", e);
            prompt.to_string()
        }
    }
}

/// Extract the double-quoted spans of a quoted prompt, deduplicated,
/// in order of first appearance. Typographic double quotes are treated
/// like straight ones.
pub fn quoted_spans(prompt: &str) -> Vec<String> {
    let normalized: String = prompt
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '«' | '»' => '"',
            other => other,
        })
        .collect();

    let mut spans: Vec<String> = Vec::new();
    for (i, segment) in normalized.split('"').enumerate() {
        // Odd segments sit between a quote pair; a trailing unbalanced
        // quote leaves its tail as the last odd segment, which we ignore
        // only if empty.
        if i % 2 == 1 {
            let span = segment.trim();
            if !span.is_empty() && !spans.iter().any(|s| s == span) {
                spans.push(span.to_string());
            }
        }
    }
    spans
}
