use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub engine_command: String,
    pub engine_args: Vec<String>,
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine_command: "paddleocr".to_string(),
            engine_args: vec!["ocr".to_string(), "-i".to_string()],
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    engine: Option<EngineSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct EngineSettings {
    command: Option<String>,
    args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(engine) = incoming.engine {
            if let Some(command) = engine.command {
                if !command.trim().is_empty() {
                    self.engine_command = command;
                }
            }
            if let Some(args) = engine.args {
                self.engine_args = args;
            }
        }
        if let Some(server) = incoming.server {
            if let Some(host) = server.host {
                if !host.trim().is_empty() {
                    self.host = host;
                }
            }
            if let Some(port) = server.port {
                if port > 0 {
                    self.port = port;
                }
            }
        }
    }

    /// Bind address for the HTTP service. The OCR_SERVICE_HOST and
    /// OCR_SERVICE_PORT environment variables override the settings files.
    pub fn bind_addr(&self) -> String {
        let host = std::env::var("OCR_SERVICE_HOST")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.host.clone());
        let port = std::env::var("OCR_SERVICE_PORT")
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(self.port);
        format!("{}:{}", host, port)
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".receipt-ocr-service"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overrides_engine_and_server_sections() {
        let mut settings = Settings::default();
        let parsed: SettingsFile = toml::from_str(
            r#"
            [engine]
            command = "tesseract"
            args = ["--format", "json"]

            [server]
            host = "127.0.0.1"
            port = 9000
            "#,
        )
        .unwrap();
        settings.merge(parsed);
        assert_eq!(settings.engine_command, "tesseract");
        assert_eq!(settings.engine_args, vec!["--format", "json"]);
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 9000);
    }

    #[test]
    fn merge_keeps_defaults_for_blank_values() {
        let mut settings = Settings::default();
        let parsed: SettingsFile = toml::from_str(
            r#"
            [engine]
            command = "  "

            [server]
            host = ""
            port = 0
            "#,
        )
        .unwrap();
        settings.merge(parsed);
        assert_eq!(settings.engine_command, "paddleocr");
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 8000);
    }

    #[test]
    fn default_settings_file_parses() {
        let parsed: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML).unwrap();
        let mut settings = Settings::default();
        settings.merge(parsed);
        assert!(!settings.engine_command.is_empty());
    }
}
