//! cardscan-id - identify a trading card from a photo
//!
//! Reads an image file, runs the scan pipeline against the Gemini vision API
//! and the Pokémon TCG API, and prints the `ScanResult` as JSON on stdout.
//! Logs go to stderr. Ctrl-C cancels the scan in flight.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cardscan_common::config::{self as common_config, GEMINI_KEY_ENV, TCG_KEY_ENV};
use cardscan_id::catalog::PokemonTcgClient;
use cardscan_id::vision::GeminiClient;
use cardscan_id::{imaging, ScanConfig, ScanOptions, ScanPipeline};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cardscan-id
#[derive(Parser, Debug)]
#[command(name = "cardscan-id")]
#[command(about = "Identify a trading card from a photo")]
#[command(version)]
struct Args {
    /// Card photo (JPEG, PNG, WebP, ...)
    image: PathBuf,

    /// Config file (defaults to CARDSCAN_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Always use the fast tier
    #[arg(long, conflicts_with = "prefer_quality")]
    prefer_speed: bool,

    /// Use the enhanced tier unless the time budget forbids it
    #[arg(long)]
    prefer_quality: bool,

    /// Soft end-to-end time budget in milliseconds
    #[arg(long, env = "CARDSCAN_TIME_BUDGET_MS")]
    time_budget_ms: Option<u64>,

    /// Escalate to the enhanced tier below this quality score (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality_threshold: Option<u8>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml_config, config_source) = common_config::load_with_source(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing (RUST_LOG overrides the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "cardscan-id {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_source {
        common_config::ConfigSource::File(_) => info!("Config: {}", config_source),
        common_config::ConfigSource::Defaults => warn!("No config file found, using defaults"),
    }

    let scan_config = ScanConfig::from_table(&toml_config.scan).context("Invalid [scan] configuration")?;

    let Some(gemini_key) = common_config::resolve_api_key(
        "Gemini",
        GEMINI_KEY_ENV,
        toml_config.gemini_api_key.as_ref(),
    ) else {
        bail!(
            "No Gemini API key configured. Set {} or gemini_api_key in the config file.",
            GEMINI_KEY_ENV
        );
    };
    let tcg_key = common_config::resolve_api_key("Pokémon TCG", TCG_KEY_ENV, toml_config.tcg_api_key.as_ref());
    if tcg_key.is_none() {
        warn!("No Pokémon TCG API key configured; using anonymous rate limits");
    }

    let user_agent = common_config::get_user_agent();
    let vision = GeminiClient::new(
        gemini_key,
        toml_config.endpoints.gemini_base_url.clone(),
        &user_agent,
    )
    .context("Failed to create Gemini client")?;
    let catalog = PokemonTcgClient::new(
        tcg_key,
        toml_config.endpoints.tcg_base_url.clone(),
        &user_agent,
        scan_config.search.page_size,
        scan_config.search.requests_per_second,
    )
    .context("Failed to create Pokémon TCG client")?;

    let pipeline = ScanPipeline::new(scan_config, Arc::new(vision), Arc::new(catalog))?;

    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Failed to read {}", args.image.display()))?;
    let image = imaging::decode_image(&bytes)?;
    info!(
        "Image: {} ({}x{})",
        args.image.display(),
        image.width(),
        image.height()
    );

    let options = ScanOptions {
        prefer_speed: args.prefer_speed,
        prefer_quality: args.prefer_quality,
        time_budget_ms: args.time_budget_ms,
        quality_threshold: args.quality_threshold,
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling scan");
            on_ctrl_c.cancel();
        }
    });

    let result = pipeline.scan(&image, &options, &cancel).await?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);

    Ok(())
}
