use anyhow::{Context, Result};
use cards_core::CompanyListing;
use std::time::Duration;

const CONSTITUENTS_URL: &str =
    "https://raw.githubusercontent.com/datasets/s-and-p-500-companies/main/data/constituents.csv";

/// Fetch the S&P 500 constituents index, truncated to `limit` rows.
pub async fn fetch_sp500(limit: usize) -> Result<Vec<CompanyListing>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let body = client
        .get(CONSTITUENTS_URL)
        .send()
        .await?
        .error_for_status()
        .context("fetching S&P 500 constituents")?
        .text()
        .await?;

    let listings = parse_constituents(&body)?;
    tracing::info!("Fetched {} S&P 500 constituents", listings.len());
    Ok(listings.into_iter().take(limit).collect())
}

/// Parse the constituents CSV. Expected columns: Symbol, Name, Sector.
fn parse_constituents(csv_data: &str) -> Result<Vec<CompanyListing>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let mut listings = Vec::new();
    for result in reader.records() {
        let record = result?;
        let symbol = record.get(0).unwrap_or("").trim();
        if symbol.is_empty() {
            continue;
        }

        // Index symbols use dots where the quote APIs expect hyphens (BRK.B).
        listings.push(CompanyListing {
            symbol: symbol.replace('.', "-"),
            name: record.get(1).unwrap_or("").trim().to_string(),
            sector: record
                .get(2)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        });
    }

    Ok(listings)
}
