//! Footprint application shell
//!
//! Reads one scan request, runs it, and writes the aggregate context as JSON
//! on stdout. Prompting and report rendering live outside this binary.

use anyhow::Context;
use footprint_catalog::Catalog;
use footprint_core::AppConfig;
use footprint_scanner::{run_invocation, ScanRequest};
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,footprint=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Parse a scan request from a JSON file, or from stdin when `path` is `None` or `-`.
pub fn read_request(path: Option<&Path>) -> anyhow::Result<ScanRequest> {
    let raw = match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("reading scan request {}", path.display()))?,
        _ => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("reading scan request from stdin")?;
            raw
        }
    };
    serde_json::from_str(&raw).context("scan request is not valid JSON")
}

/// Run one invocation end to end.
pub async fn run(request_path: Option<String>) -> anyhow::Result<()> {
    init_tracing();
    info!("Starting Footprint v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_with_env().context("loading configuration")?;
    let request = read_request(request_path.as_deref().map(Path::new))?;
    let catalog = Catalog::bootstrap(&config.catalog)
        .await
        .context("loading site catalog")?;

    let context = run_invocation(&config, &catalog, &request).await?;
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}
