pub mod orchestrator;
pub mod types;

pub use orchestrator::{GenerationRequest, Orchestrator};
pub use types::{
    AspectRatio, EngineeredPrompt, GeneratedImage, GenerationConfig, GenerationTarget,
    ImageReference, PipelineError, PipelineState,
};

#[cfg(test)]
mod tests;
