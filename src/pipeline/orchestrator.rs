//! Pipeline orchestration: quoting → plate rendering → engineering →
//! optional grounding → generation, with a persisted retry snapshot and a
//! single failure funnel.

use crate::config::{CredentialStore, EngineConfig};
use crate::gemini::GeminiClient;
use crate::imagegen::{fetch_grounding, generate};
use crate::pipeline::types::{
    AspectRatio, EngineeredPrompt, GeneratedImage, GenerationConfig, GenerationTarget,
    ImageReference, PipelineError, PipelineState,
};
use crate::plate::PlateRenderer;
use crate::prompt::engineer::engineer;
use crate::prompt::quoting;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// One generation attempt as the presentation layer hands it over.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub target: GenerationTarget,
    pub aspect_ratio: AspectRatio,
    pub reference_images: Vec<ImageReference>,
}

/// Sequences the pipeline stages strictly one after another and exposes
/// progress/result state to the presentation layer. All pipeline data moves
/// by value from stage to stage; the only shared state is the state cell
/// and the retry snapshot.
#[derive(Clone)]
pub struct Orchestrator {
    client: GeminiClient,
    config: EngineConfig,
    renderer: Option<Arc<PlateRenderer>>,
    credentials: CredentialStore,
    state: Arc<RwLock<PipelineState>>,
    last_config: Arc<RwLock<Option<GenerationConfig>>>,
}

impl Orchestrator {
    pub fn new(
        api_key: impl Into<String>,
        config: EngineConfig,
        renderer: Option<PlateRenderer>,
        credentials: CredentialStore,
    ) -> Self {
        let client = GeminiClient::with_base_url(api_key, config.base_url());
        Self {
            client,
            config,
            renderer: renderer.map(Arc::new),
            credentials,
            state: Arc::new(RwLock::new(PipelineState::Idle)),
            last_config: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn state(&self) -> PipelineState {
        self.state.read().await.clone()
    }

    /// The retry snapshot captured by the last successful engineering pass.
    pub async fn last_config(&self) -> Option<GenerationConfig> {
        self.last_config.read().await.clone()
    }

    /// "Start over": back to `Idle`, dropping the retry snapshot.
    pub async fn reset(&self) {
        *self.state.write().await = PipelineState::Idle;
        *self.last_config.write().await = None;
    }

    /// Run the full pipeline. Prompts without text are rejected before any
    /// network call.
    pub async fn run(&self, request: GenerationRequest) -> Result<GeneratedImage, PipelineError> {
        if request.prompt.trim().is_empty() {
            return Err(PipelineError::EmptyPrompt);
        }

        self.set_state(PipelineState::Loading).await;
        match self.run_inner(request).await {
            Ok(image) => {
                self.set_state(PipelineState::Success(image.clone())).await;
                Ok(image)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Re-run image generation only, from the persisted snapshot, with the
    /// identical prompt/plate/reference bundle.
    pub async fn retry(&self) -> Result<GeneratedImage, PipelineError> {
        let snapshot = self.last_config.read().await.clone();
        let Some(config) = snapshot else {
            return Err(PipelineError::Generation(
                "nothing to retry: no engineered prompt captured yet".to_string(),
            ));
        };

        self.set_state(PipelineState::Loading).await;
        match self.generate_from(&config).await {
            Ok(image) => {
                self.set_state(PipelineState::Success(image.clone())).await;
                Ok(image)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn run_inner(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedImage, PipelineError> {
        let quoted = quoting::add_quotes(
            &self.client,
            &self.config.quoting_model,
            &request.prompt,
        )
        .await;

        let plates = self.render_plates(&quoted);
        info!(
            "engineering prompt (target {}, {} plates, {} references)",
            request.target,
            plates.len(),
            request.reference_images.len()
        );

        let engineered = engineer(
            &self.client,
            &self.config.engineering_model,
            &quoted,
            request.target,
            &plates,
            &request.reference_images,
            request.aspect_ratio,
        )
        .await?;

        let mut references = request.reference_images;
        if let Some(query) = engineered.grounding_search_query.as_deref() {
            match fetch_grounding(&self.client, &self.config.grounding_model, query).await {
                Ok(reference) => {
                    info!("grounding reference fetched for '{}'", query);
                    references.push(reference);
                }
                // A rejected credential funnels out even from this
                // best-effort stage.
                Err(PipelineError::InvalidCredential(msg)) => {
                    return Err(PipelineError::InvalidCredential(msg));
                }
                Err(e) => warn!("continuing ungrounded: {}", e),
            }
        }

        let config = GenerationConfig {
            prompt: compose_generation_prompt(&engineered, plates.len()),
            text_plates: plates,
            reference_images: references,
        };
        // Persist before the generation attempt so a failed attempt can be
        // retried without repeating quoting/engineering.
        *self.last_config.write().await = Some(config.clone());

        self.generate_from(&config).await
    }

    fn render_plates(&self, quoted_prompt: &str) -> Vec<ImageReference> {
        let spans = quoting::quoted_spans(quoted_prompt);
        if spans.is_empty() {
            return Vec::new();
        }
        let Some(renderer) = &self.renderer else {
            warn!("no plate renderer configured, skipping {} text plate(s)", spans.len());
            return Vec::new();
        };
        spans
            .iter()
            .filter_map(|span| renderer.render(span))
            .collect()
    }

    async fn generate_from(
        &self,
        config: &GenerationConfig,
    ) -> Result<GeneratedImage, PipelineError> {
        generate(
            &self.client,
            &self.config.generation_model,
            &config.prompt,
            &config.text_plates,
            &config.reference_images,
        )
        .await
    }

    /// The single failure funnel. Credential rejections clear the stored
    /// credential and drop back to `Idle` so the presentation layer reopens
    /// credential entry; everything else lands in `Error`.
    async fn fail(&self, err: PipelineError) -> PipelineError {
        match &err {
            PipelineError::InvalidCredential(_) => {
                warn!("{}", err);
                self.credentials.clear();
                self.set_state(PipelineState::Idle).await;
            }
            _ => {
                self.set_state(PipelineState::Error(err.to_string())).await;
            }
        }
        err
    }

    async fn set_state(&self, state: PipelineState) {
        *self.state.write().await = state;
    }
}

/// Fold the engineered pieces into the one prompt string the generation
/// endpoint receives. The replication directive only applies when plates
/// actually exist.
fn compose_generation_prompt(engineered: &EngineeredPrompt, plate_count: usize) -> String {
    let mut prompt = engineered.final_prompt.trim().to_string();

    if plate_count > 0 && !engineered.text_replication_instruction.trim().is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(engineered.text_replication_instruction.trim());
    }

    if !engineered.negative_prompt.trim().is_empty() {
        prompt.push_str("\n\nAvoid: ");
        prompt.push_str(engineered.negative_prompt.trim());
    }

    prompt
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn engineered(replication: &str, negative: &str) -> EngineeredPrompt {
        EngineeredPrompt {
            analysis: String::new(),
            grounding_search_query: None,
            target: GenerationTarget::Image,
            final_prompt: "A stop sign at night".to_string(),
            text_replication_instruction: replication.to_string(),
            negative_prompt: negative.to_string(),
        }
    }

    #[test]
    fn test_compose_appends_replication_and_negative() {
        let prompt = compose_generation_prompt(
            &engineered("Replicate plate 1 exactly.", "blurry, deformed"),
            1,
        );
        assert!(prompt.starts_with("A stop sign at night"));
        assert!(prompt.contains("Replicate plate 1 exactly."));
        assert!(prompt.ends_with("Avoid: blurry, deformed"));
    }

    #[test]
    fn test_compose_skips_replication_without_plates() {
        let prompt =
            compose_generation_prompt(&engineered("Replicate plate 1 exactly.", ""), 0);
        assert_eq!(prompt, "A stop sign at night");
    }
}
