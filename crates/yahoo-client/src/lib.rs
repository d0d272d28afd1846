use async_trait::async_trait;
use cards_core::{CardError, CompanyMetrics, MetricsProvider};
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";
const MODULES: &str = "price,summaryProfile,financialData,balanceSheetHistory";

// Yahoo rejects requests without a browser-looking user agent.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Metrics backend over the Yahoo Finance `quoteSummary` API. One call per
/// symbol covers price, profile, financial data, and balance-sheet history.
#[derive(Clone)]
pub struct YahooClient {
    client: reqwest::Client,
}

impl YahooClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsProvider for YahooClient {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_metrics(&self, symbol: &str) -> Result<CompanyMetrics, CardError> {
        let url = format!("{BASE_URL}/{symbol}");
        let response = self
            .client
            .get(&url)
            .query(&[("modules", MODULES)])
            .send()
            .await
            .map_err(|e| CardError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CardError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let summary: QuoteSummaryEnvelope = response
            .json()
            .await
            .map_err(|e| CardError::ApiError(e.to_string()))?;

        let result = summary
            .quote_summary
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0))
                }
            })
            .ok_or_else(|| {
                CardError::MissingData(format!("no quoteSummary result for {symbol}"))
            })?;

        Ok(metrics_from_summary(symbol, result))
    }
}

fn metrics_from_summary(symbol: &str, result: QuoteSummaryResult) -> CompanyMetrics {
    let price = result.price.unwrap_or_default();
    let profile = result.summary_profile.unwrap_or_default();
    let financial = result.financial_data.unwrap_or_default();

    // Equity is not served directly; derive it from the newest statement.
    let shareholder_equity = result
        .balance_sheet_history
        .and_then(|history| history.balance_sheet_statements.into_iter().next())
        .and_then(|statement| {
            let assets = statement.total_assets.raw?;
            let liabilities = statement.total_liab.raw?;
            Some(assets - liabilities)
        });

    if shareholder_equity.is_none() {
        tracing::warn!("[{symbol}] no balance sheet data; equity left missing");
    }

    CompanyMetrics {
        ticker: symbol.to_string(),
        company_name: price.long_name,
        sector: profile.sector,
        description: profile.long_business_summary,
        market_cap: price.market_cap.raw,
        free_cash_flow: financial.free_cashflow.raw,
        shareholder_equity,
        earnings_growth: financial.earnings_growth.raw,
    }
}

// `quoteSummary` response schema, trimmed to the fields the cards need.
// Yahoo wraps every figure as `{ "raw": 123, "fmt": "123M" }`.

#[derive(Debug, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    price: Option<Price>,
    summary_profile: Option<SummaryProfile>,
    financial_data: Option<FinancialData>,
    balance_sheet_history: Option<BalanceSheetHistory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Price {
    long_name: Option<String>,
    #[serde(default)]
    market_cap: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryProfile {
    sector: Option<String>,
    long_business_summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    #[serde(default)]
    free_cashflow: RawValue,
    #[serde(default)]
    earnings_growth: RawValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceSheetHistory {
    #[serde(default)]
    balance_sheet_statements: Vec<BalanceSheetStatement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceSheetStatement {
    #[serde(default)]
    total_assets: RawValue,
    #[serde(default)]
    total_liab: RawValue,
}
