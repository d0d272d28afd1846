use crate::{CardError, CompanyMetrics, CreatureProfile};
use async_trait::async_trait;

/// Trait for financial-metrics backends (Yahoo Finance, Alpha Vantage, ...).
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Short backend name used in logs and CLI selection.
    fn name(&self) -> &'static str;

    async fn fetch_metrics(&self, symbol: &str) -> Result<CompanyMetrics, CardError>;
}

/// Trait for creature-description generation services.
#[async_trait]
pub trait CreatureGenerator: Send + Sync {
    async fn generate_creature(
        &self,
        company: &CompanyMetrics,
    ) -> Result<CreatureProfile, CardError>;
}

/// Trait for text-to-image generation services.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, description: &str) -> Result<Vec<u8>, CardError>;
}
