use serde::{Deserialize, Serialize};

/// One row of the company index (S&P 500 constituents).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyListing {
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
}

/// Raw financial metrics for one company, as delivered by a metrics
/// provider. Any of the numeric fields may be missing upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyMetrics {
    pub ticker: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub market_cap: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub shareholder_equity: Option<f64>,
    pub earnings_growth: Option<f64>,
}

/// A creature card. The stat fields are produced by the stat engine;
/// the creature fields are attached afterwards by the generation clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub health: u32,
    pub attack: u32,
    pub defense: u32,
    pub growth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creature_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creature_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creature_image: Option<String>,
}

/// Creature name + appearance produced by the text-generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatureProfile {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub environment: Option<String>,
}
