use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(
    name = "receipt-ocr-service",
    version,
    about = "Extract receipt text with an external OCR engine"
)]
struct Cli {
    /// Image file to recognize (omit when using --serve)
    image: Option<String>,

    /// Run the HTTP service instead of a one-shot recognition
    #[arg(long = "serve")]
    serve: bool,

    /// Bind address for --serve (overrides settings and OCR_SERVICE_HOST/PORT)
    #[arg(long = "addr")]
    addr: Option<String>,

    /// OCR engine command (overrides settings)
    #[arg(long = "engine")]
    engine: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    receipt_ocr_service::logging::init(cli.verbose || cli.serve)?;

    if cli.serve {
        let settings_path = cli.read_settings.as_deref().map(Path::new);
        let mut settings = receipt_ocr_service::settings::load_settings(settings_path)?;
        if let Some(command) = cli.engine {
            settings.engine_command = command;
        }
        let addr = cli.addr.unwrap_or_else(|| settings.bind_addr());
        return receipt_ocr_service::server::run_server(settings, addr).await;
    }

    let Some(image) = cli.image else {
        return Err(anyhow!("image path is required unless --serve is set"));
    };

    let output = receipt_ocr_service::run(receipt_ocr_service::Config {
        image,
        engine: cli.engine,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
