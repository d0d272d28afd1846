use async_trait::async_trait;
use cards_core::{CardError, CompanyMetrics, MetricsProvider};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Need to wait until the oldest request falls out of the window
            let oldest = *ts.front().expect("window is non-empty here");
            let sleep_dur =
                (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for Alpha Vantage API slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Metrics backend over the Alpha Vantage REST API.
///
/// Each symbol costs three calls (OVERVIEW, BALANCE_SHEET, CASH_FLOW), all
/// of which go through the shared rate limiter.
#[derive(Clone)]
pub struct AlphaVantageClient {
    api_key: String,
    client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        // Free tier allows 5 req/min; paid plans can raise this via env.
        let rate_limit: usize = std::env::var("ALPHAVANTAGE_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        function: &str,
        symbol: &str,
    ) -> Result<T, CardError> {
        self.rate_limiter.acquire().await;

        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", function),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
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

        response
            .json::<T>()
            .await
            .map_err(|e| CardError::ApiError(e.to_string()))
    }
}

#[async_trait]
impl MetricsProvider for AlphaVantageClient {
    fn name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch_metrics(&self, symbol: &str) -> Result<CompanyMetrics, CardError> {
        let overview: Overview = self.call("OVERVIEW", symbol).await?;

        // An unknown or rate-limited symbol comes back as an empty object.
        if overview.name.is_none() {
            return Err(CardError::MissingData(format!(
                "no overview data for {symbol}"
            )));
        }

        let balance: AnnualReports<BalanceSheetReport> =
            self.call("BALANCE_SHEET", symbol).await?;
        let cash_flow: AnnualReports<CashFlowReport> = self.call("CASH_FLOW", symbol).await?;

        let shareholder_equity = balance
            .annual_reports
            .first()
            .and_then(|report| parse_field(&report.total_shareholder_equity));

        // Alpha Vantage reports no free-cash-flow field; derive it from the
        // latest annual cash-flow statement.
        let free_cash_flow = cash_flow.annual_reports.first().and_then(|report| {
            let operating = parse_field(&report.operating_cashflow)?;
            let capex = parse_field(&report.capital_expenditures)?;
            Some(operating - capex)
        });

        Ok(CompanyMetrics {
            ticker: symbol.to_string(),
            company_name: overview.name,
            sector: overview.sector,
            description: overview.description,
            market_cap: parse_field(&overview.market_capitalization),
            free_cash_flow,
            shareholder_equity,
            earnings_growth: parse_field(&overview.quarterly_earnings_growth_yoy),
        })
    }
}

/// Alpha Vantage serves every numeric as a JSON string, with "None" or "-"
/// standing in for missing figures. Parse leniently to Option.
fn parse_field(value: &Option<String>) -> Option<f64> {
    value.as_deref().and_then(|s| s.trim().parse::<f64>().ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Overview {
    name: Option<String>,
    sector: Option<String>,
    description: Option<String>,
    market_capitalization: Option<String>,
    #[serde(rename = "QuarterlyEarningsGrowthYOY")]
    quarterly_earnings_growth_yoy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnnualReports<T> {
    #[serde(rename = "annualReports", default = "Vec::new")]
    annual_reports: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceSheetReport {
    total_shareholder_equity: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CashFlowReport {
    operating_cashflow: Option<String>,
    capital_expenditures: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_handles_alpha_vantage_number_strings() {
        assert_eq!(parse_field(&Some("3019989000000".to_string())), Some(3019989000000.0));
        assert_eq!(parse_field(&Some("-0.104".to_string())), Some(-0.104));
        assert_eq!(parse_field(&Some("None".to_string())), None);
        assert_eq!(parse_field(&Some("-".to_string())), None);
        assert_eq!(parse_field(&None), None);
    }

    #[test]
    fn overview_deserializes_pascal_case_payload() {
        let json = r#"{
            "Symbol": "CAT",
            "Name": "Caterpillar Inc",
            "Sector": "Industrials",
            "Description": "Caterpillar manufactures construction equipment.",
            "MarketCapitalization": "170000000000",
            "QuarterlyEarningsGrowthYOY": "0.22"
        }"#;

        let overview: Overview = serde_json::from_str(json).unwrap();
        assert_eq!(overview.name.as_deref(), Some("Caterpillar Inc"));
        assert_eq!(parse_field(&overview.market_capitalization), Some(1.7e11));
        assert_eq!(parse_field(&overview.quarterly_earnings_growth_yoy), Some(0.22));
    }

    #[test]
    fn empty_overview_means_missing_symbol() {
        let overview: Overview = serde_json::from_str("{}").unwrap();
        assert!(overview.name.is_none());
    }

    #[test]
    fn reports_default_to_empty_when_absent() {
        let balance: AnnualReports<BalanceSheetReport> = serde_json::from_str("{}").unwrap();
        assert!(balance.annual_reports.is_empty());

        let json = r#"{
            "annualReports": [
                { "totalShareholderEquity": "19550000000" },
                { "totalShareholderEquity": "15869000000" }
            ]
        }"#;
        let balance: AnnualReports<BalanceSheetReport> = serde_json::from_str(json).unwrap();
        assert_eq!(
            parse_field(&balance.annual_reports[0].total_shareholder_equity),
            Some(1.955e10)
        );
    }
}
