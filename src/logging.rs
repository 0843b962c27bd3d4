use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// One-shot CLI runs stay quiet unless asked; the server always logs.
pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let _ = fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_level(true)
        .try_init();
    Ok(())
}
