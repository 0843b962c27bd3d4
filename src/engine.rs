use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::path::Path;
use std::process::Command;

use crate::settings::Settings;

/// External recognition engine, invoked as a subprocess with the image path
/// appended to the configured arguments.
#[derive(Debug, Clone)]
pub struct Engine {
    command: String,
    args: Vec<String>,
}

impl Engine {
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self { command, args }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.engine_command.clone(),
            settings.engine_args.clone(),
        )
    }

    /// Runs the engine on one image and returns its raw output.
    ///
    /// Stdout is taken as JSON when it parses; otherwise it is wrapped as a
    /// JSON string so the normalizer can still scrape text out of it. Empty
    /// stdout means no detection.
    pub fn recognize(&self, image: &Path) -> Result<Value> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(image)
            .output()
            .with_context(|| {
                format!("failed to run ocr engine '{}' (is it installed?)", self.command)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("ocr engine failed: {}", stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
    }
}
