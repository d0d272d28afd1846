//! card-generator: build Marketmon creature cards from live market data.
//!
//! Pipeline: company index -> financial metrics -> percentile card stats ->
//! creature descriptions (Claude) -> creature art (Stability) -> one JSON
//! array of finished cards.
//!
//! Usage:
//!   cargo run -p card-generator -- --symbols AAPL MSFT GOOGL
//!   cargo run -p card-generator -- --limit 50
//!   cargo run -p card-generator -- --provider alphavantage --cards-only

mod index;
mod pace;

use alphavantage_client::AlphaVantageClient;
use anthropic_client::AnthropicClient;
use anyhow::Context;
use card_stats::CardStatEngine;
use cards_core::{CompanyMetrics, CreatureGenerator, ImageGenerator, MetricsProvider};
use pace::Pacer;
use stability_client::StabilityClient;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use yahoo_client::YahooClient;

const DEFAULT_OUT: &str = "cards.json";
const DEFAULT_IMAGES_DIR: &str = "creature_images";
/// Max concurrent metrics fetches
const DEFAULT_CONCURRENCY: usize = 4;

// Claude free-tier pacing: 5 requests, then wait out a 60 s window.
const CREATURE_BATCH: usize = 5;
const CREATURE_WINDOW: Duration = Duration::from_secs(60);
// Stability pacing: 150 requests per 10 s window.
const IMAGE_BATCH: usize = 150;
const IMAGE_WINDOW: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "card_generator=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        std::process::exit(0);
    }

    let provider_name = flag_value(&args, "--provider").unwrap_or_else(|| "yahoo".to_string());
    let limit: usize = flag_value(&args, "--limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(usize::MAX);
    let concurrency: usize = flag_value(&args, "--concurrency")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_CONCURRENCY);
    let out = flag_value(&args, "--out").unwrap_or_else(|| DEFAULT_OUT.to_string());
    let images_dir =
        flag_value(&args, "--images-dir").unwrap_or_else(|| DEFAULT_IMAGES_DIR.to_string());
    let cards_only = args.iter().any(|a| a == "--cards-only");
    let skip_images = args.iter().any(|a| a == "--skip-images");

    let provider: Arc<dyn MetricsProvider> = match provider_name.as_str() {
        "yahoo" => Arc::new(YahooClient::new()),
        "alphavantage" => {
            let api_key = std::env::var("ALPHAVANTAGE_API_KEY")
                .expect("ALPHAVANTAGE_API_KEY must be set");
            Arc::new(AlphaVantageClient::new(api_key))
        }
        other => {
            eprintln!("Unknown provider: {other} (expected yahoo or alphavantage)");
            usage();
            std::process::exit(1);
        }
    };

    let symbols: Vec<String> = if let Some(idx) = args.iter().position(|a| a == "--symbols") {
        args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .cloned()
            .collect()
    } else {
        index::fetch_sp500(limit)
            .await?
            .into_iter()
            .map(|listing| listing.symbol)
            .collect()
    };
    anyhow::ensure!(!symbols.is_empty(), "no symbols to process");

    let total = symbols.len();
    tracing::info!(
        "card-generator: {} symbols via {}, out={}, cards_only={}",
        total,
        provider.name(),
        out,
        cards_only
    );

    // Stage 1: fetch the metrics batch. Per-symbol failures are skipped;
    // the bucketing only needs the symbols that survived.
    let metrics = fetch_metrics_batch(provider, symbols, concurrency).await;
    anyhow::ensure!(!metrics.is_empty(), "no metrics fetched; nothing to do");

    // Stage 2: the whole batch goes through the stat engine at once; the
    // percentile cutoffs come from the batch's own distribution.
    let mut cards = CardStatEngine::new()
        .compute_card_stats(&metrics)
        .context("computing card stats")?;
    tracing::info!("Computed stats for {} cards", cards.len());

    let metrics_by_ticker: HashMap<String, CompanyMetrics> = metrics
        .into_iter()
        .map(|m| (m.ticker.clone(), m))
        .collect();

    // Stage 3: creature descriptions, sequential and paced.
    if !cards_only {
        let creatures = AnthropicClient::new(
            std::env::var("ANTHROPIC_API_KEY").expect("ANTHROPIC_API_KEY must be set"),
        );
        let mut pacer = Pacer::new(CREATURE_BATCH, CREATURE_WINDOW);
        let total_cards = cards.len();

        for (i, card) in cards.iter_mut().enumerate() {
            let Some(company) = metrics_by_ticker.get(&card.ticker) else {
                continue;
            };
            pacer.pace().await;
            tracing::info!("[{}/{}] {} creature", i + 1, total_cards, card.ticker);

            match creatures.generate_creature(company).await {
                Ok(profile) => {
                    card.creature_name = Some(profile.name);
                    card.creature_description = Some(profile.description);
                    card.environment = profile.environment;
                }
                Err(e) => {
                    tracing::warn!("[{}] creature generation failed: {}", card.ticker, e);
                }
            }
        }

        // Stage 4: creature art for every card that got a description.
        if !skip_images {
            let images = StabilityClient::new(
                std::env::var("STABILITY_API_KEY").expect("STABILITY_API_KEY must be set"),
            );
            tokio::fs::create_dir_all(&images_dir)
                .await
                .with_context(|| format!("creating {images_dir}"))?;
            let mut pacer = Pacer::new(IMAGE_BATCH, IMAGE_WINDOW);

            for card in cards.iter_mut() {
                let Some(description) = card.creature_description.clone() else {
                    tracing::warn!("[{}] no creature description; skipping image", card.ticker);
                    continue;
                };
                pacer.pace().await;

                match images.generate_image(&description).await {
                    Ok(bytes) => {
                        let path = format!("{images_dir}/{}.png", card.ticker);
                        tokio::fs::write(&path, &bytes)
                            .await
                            .with_context(|| format!("writing {path}"))?;
                        card.creature_image = Some(path);
                    }
                    Err(e) => {
                        tracing::warn!("[{}] image generation failed: {}", card.ticker, e);
                    }
                }
            }
        }
    }

    // Stage 5: one JSON array with everything attached.
    let json = serde_json::to_vec_pretty(&cards)?;
    tokio::fs::write(&out, &json)
        .await
        .with_context(|| format!("writing {out}"))?;
    tracing::info!("Done! {} cards written to {}", cards.len(), out);

    Ok(())
}

/// Fan the metrics fetches out over a bounded number of tasks, dropping
/// symbols the provider has nothing for.
async fn fetch_metrics_batch(
    provider: Arc<dyn MetricsProvider>,
    symbols: Vec<String>,
    concurrency: usize,
) -> Vec<CompanyMetrics> {
    let total = symbols.len();
    let completed = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let mut handles = Vec::with_capacity(total);
    for symbol in symbols {
        let provider = Arc::clone(&provider);
        let completed = Arc::clone(&completed);
        let failed = Arc::clone(&failed);
        let semaphore = Arc::clone(&semaphore);

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            let result = provider.fetch_metrics(&symbol).await;
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;

            match result {
                Ok(metrics) => {
                    tracing::info!("[{}/{}] {} metrics fetched", done, total, symbol);
                    Some(metrics)
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("[{}/{}] {} failed: {}", done, total, symbol, e);
                    None
                }
            }
        }));
    }

    let mut metrics = Vec::with_capacity(total);
    for handle in handles {
        if let Ok(Some(m)) = handle.await {
            metrics.push(m);
        }
    }

    let fails = failed.load(Ordering::Relaxed);
    if fails > 0 {
        tracing::warn!("{} of {} symbols had no usable metrics", fails, total);
    }
    metrics
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn usage() {
    eprintln!("Usage:");
    eprintln!("  card-generator                         Full S&P 500 run via Yahoo Finance");
    eprintln!("  card-generator --symbols AAPL MSFT ... Specific symbols");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --provider NAME    Metrics backend: yahoo (default) or alphavantage");
    eprintln!("  --limit N          Truncate the S&P 500 index to N companies");
    eprintln!("  --concurrency N    Max parallel metrics fetches (default: {DEFAULT_CONCURRENCY})");
    eprintln!("  --out PATH         Output JSON path (default: {DEFAULT_OUT})");
    eprintln!("  --images-dir PATH  Where creature art lands (default: {DEFAULT_IMAGES_DIR})");
    eprintln!("  --cards-only       Stop after the stat engine; no creatures or art");
    eprintln!("  --skip-images      Generate creatures but no art");
    eprintln!();
    eprintln!("Environment: ANTHROPIC_API_KEY, STABILITY_API_KEY,");
    eprintln!("             ALPHAVANTAGE_API_KEY (+ optional ALPHAVANTAGE_RATE_LIMIT)");
}
