use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Error Types ────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum PipelineError {
    EmptyPrompt,
    InvalidCredential(String),
    Engineering(String),
    Grounding(String),
    Generation(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::EmptyPrompt => write!(f, "prompt is empty"),
            PipelineError::InvalidCredential(msg) => write!(f, "credential rejected: {}", msg),
            PipelineError::Engineering(msg) => write!(f, "prompt engineering failed: {}", msg),
            PipelineError::Grounding(msg) => write!(f, "grounding generation failed: {}", msg),
            PipelineError::Generation(msg) => write!(f, "image generation failed: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<PipelineError> for String {
    fn from(e: PipelineError) -> String {
        e.to_string()
    }
}

// ── Image References ───────────────────────────────────

/// A binary image payload plus its media type and display name.
/// Built once (by the plate renderer, a user upload, or the grounding
/// client) and moved by value between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageReference {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// The picture returned by the generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl GeneratedImage {
    /// Encode as a `data:` URL for immediate display.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.data)
        )
    }
}

// ── Generation Parameters ──────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationTarget {
    Image,
    Video,
}

impl fmt::Display for GenerationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationTarget::Image => write!(f, "image"),
            GenerationTarget::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    Square,
    Portrait,
    Landscape,
}

impl AspectRatio {
    /// The ratio string the endpoints understand.
    pub fn as_ratio(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
        }
    }
}

// ── Engineered Prompt ──────────────────────────────────

/// Structured elaboration of the user's request, produced by the prompt
/// engineering model. `grounding_search_query` is only ever present for
/// `Image` targets whose prompt named a recognizable real-world entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineeredPrompt {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub grounding_search_query: Option<String>,
    pub target: GenerationTarget,
    pub final_prompt: String,
    #[serde(default)]
    pub text_replication_instruction: String,
    #[serde(default)]
    pub negative_prompt: String,
}

// ── Retry Snapshot ─────────────────────────────────────

/// The minimal bundle needed to re-run image generation without repeating
/// the quoting and engineering calls. Captured right after engineering and
/// grounding succeed, before the first generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub prompt: String,
    pub text_plates: Vec<ImageReference>,
    pub reference_images: Vec<ImageReference>,
}

// ── Pipeline State ─────────────────────────────────────

#[derive(Debug, Clone)]
pub enum PipelineState {
    Idle,
    Loading,
    Success(GeneratedImage),
    Error(String),
}
