pub mod client;
pub mod wire;

pub use client::{GeminiClient, GenAiError, DEFAULT_BASE_URL};
