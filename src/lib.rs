use anyhow::{Result, anyhow};
use std::path::Path;

pub mod engine;
pub mod logging;
pub mod normalize;
pub mod server;
pub mod settings;

use engine::Engine;
use normalize::normalize;
use server::models::OcrResponse;

#[derive(Debug, Clone)]
pub struct Config {
    pub image: String,
    pub engine: Option<String>,
    pub settings_path: Option<String>,
}

/// One-shot recognition: runs the engine on a local image and returns the
/// same JSON body the HTTP service would respond with, pretty-printed.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let engine = match config.engine {
        Some(command) => Engine::new(command, settings.engine_args.clone()),
        None => Engine::from_settings(&settings),
    };

    let image = Path::new(&config.image);
    if !image.exists() {
        return Err(anyhow!("image not found: {}", config.image));
    }

    let raw = engine.recognize(image)?;
    let normalized = normalize(&raw);
    let response = OcrResponse {
        text: normalized.text,
        lines: normalized.lines,
        raw_result: None,
    };
    Ok(serde_json::to_string_pretty(&response)?)
}
