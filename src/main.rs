use anyhow::{bail, Context, Result};
use clap::Parser;
use negar_engine::config::{data_dir, CredentialStore, EngineConfig};
use negar_engine::pipeline::{
    AspectRatio, GeneratedImage, GenerationRequest, GenerationTarget, ImageReference,
    Orchestrator, PipelineError,
};
use negar_engine::plate::PlateRenderer;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "negar", version, about = "Text-aware generative image pipeline")]
struct Cli {
    /// Prompt describing the picture to generate
    prompt: Vec<String>,

    /// Generation target: image or video
    #[arg(long, default_value = "image")]
    target: String,

    /// Aspect ratio: square, portrait or landscape
    #[arg(long, default_value = "square")]
    aspect: String,

    /// Reference image file, repeatable
    #[arg(long = "reference", value_name = "PATH")]
    references: Vec<PathBuf>,

    /// Output directory for the generated image
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Font file used for text plates
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// API key override (not persisted)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let prompt = cli.prompt.join(" ");

    let target = match cli.target.as_str() {
        "image" => GenerationTarget::Image,
        "video" => GenerationTarget::Video,
        other => bail!("unknown target '{}', expected image or video", other),
    };
    let aspect_ratio = match cli.aspect.as_str() {
        "square" => AspectRatio::Square,
        "portrait" => AspectRatio::Portrait,
        "landscape" => AspectRatio::Landscape,
        other => bail!("unknown aspect '{}', expected square, portrait or landscape", other),
    };

    let dir = data_dir();
    let config = EngineConfig::load(&dir.join("engine.json"));
    let credentials = CredentialStore::new(&dir);
    let reference_images = load_references(&cli.references)?;

    let font_path = cli.font.clone().or_else(|| config.font_path.clone());
    let mut api_key = cli.api_key.clone().or_else(|| credentials.resolve());

    let image = loop {
        let key = match api_key.take() {
            Some(key) => key,
            None => read_api_key(&credentials)?,
        };

        let renderer = build_renderer(font_path.as_deref());
        let orchestrator = Orchestrator::new(key, config.clone(), renderer, credentials.clone());
        let request = GenerationRequest {
            prompt: prompt.clone(),
            target,
            aspect_ratio,
            reference_images: reference_images.clone(),
        };

        match orchestrator.run(request).await {
            Ok(image) => break image,
            Err(PipelineError::InvalidCredential(msg)) => {
                eprintln!("The endpoint rejected the API key ({}). Enter a new one.", msg);
                continue;
            }
            Err(e) => {
                // The engineered prompt survives a generation failure, so a
                // retry skips straight to the generation call.
                if orchestrator.last_config().await.is_some()
                    && confirm("Retry image generation with the same engineered prompt? [y/N] ")?
                {
                    match orchestrator.retry().await {
                        Ok(image) => break image,
                        Err(retry_err) => bail!("{}", retry_err),
                    }
                }
                bail!("{}", e);
            }
        }
    };

    let path = save_image(&image, cli.output.as_ref().or(config.output_dir.as_ref()))?;
    println!("{}", path.display());
    Ok(())
}

fn build_renderer(font_path: Option<&Path>) -> Option<PlateRenderer> {
    let result = match font_path {
        Some(path) => PlateRenderer::from_font_file(path),
        None => PlateRenderer::from_system_fonts(),
    };
    match result {
        Ok(renderer) => Some(renderer),
        Err(e) => {
            warn!("text plates disabled: {}", e);
            None
        }
    }
}

fn load_references(paths: &[PathBuf]) -> Result<Vec<ImageReference>> {
    paths
        .iter()
        .map(|path| {
            let data = std::fs::read(path)
                .with_context(|| format!("failed to read reference image {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "reference".to_string());
            Ok(ImageReference::new(name, guess_mime(path), data))
        })
        .collect()
}

fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

fn read_api_key(credentials: &CredentialStore) -> Result<String> {
    eprint!("Enter API key: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read API key from stdin")?;
    let key = line.trim().to_string();
    if key.is_empty() {
        bail!("no API key provided");
    }
    if let Err(e) = credentials.save(&key) {
        warn!("could not persist the API key: {}", e);
    }
    Ok(key)
}

fn confirm(message: &str) -> Result<bool> {
    eprint!("{}", message);
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read answer from stdin")?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn save_image(image: &GeneratedImage, output_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let dir = output_dir
        .cloned()
        .unwrap_or_else(|| data_dir().join("generated_images"));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let ext = match image.mime_type.as_str() {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    };
    let filename = format!(
        "{}_{}.{}",
        chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        uuid::Uuid::new_v4(),
        ext
    );
    let path = dir.join(filename);
    std::fs::write(&path, &image.data)
        .with_context(|| format!("failed to write image to {}", path.display()))?;
    Ok(path)
}
