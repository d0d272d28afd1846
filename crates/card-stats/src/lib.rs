use cards_core::{Card, CardError, CompanyMetrics};

/// Stat tier tables, indexed by percentile bucket (lowest first). Each table
/// holds ten distinct tiers; the top entry is duplicated as a clamp guard so
/// an index of `len - 1` still lands on the highest tier.
pub const HEALTH_TIERS: [u32; 11] = [24, 28, 30, 35, 40, 45, 50, 55, 60, 80, 80];
pub const ATTACK_TIERS: [u32; 11] = [5, 7, 9, 11, 13, 15, 16, 17, 20, 24, 24];
pub const DEFENSE_TIERS: [u32; 11] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 11, 11];

/// Inclusive bounds of the growth stat.
pub const GROWTH_MIN: i64 = 2;
pub const GROWTH_MAX: i64 = 15;

/// Target bucket count for the ranked metrics. Batches smaller than this
/// get one bucket per record.
const PERCENTILE_GROUPS: usize = 10;

// Substitutes for missing metric values. Market cap and shareholder equity
// use 1 rather than 0 so a column of absentees doesn't collapse the cutoffs.
const MARKET_CAP_DEFAULT: f64 = 1.0;
const FREE_CASH_FLOW_DEFAULT: f64 = 0.0;
const SHAREHOLDER_EQUITY_DEFAULT: f64 = 1.0;
const EARNINGS_GROWTH_DEFAULT: f64 = 0.0;

/// Percentile cutoffs derived from one metric column of a batch.
///
/// Cutoffs sit at every `step`-th element of the sorted column, so a value's
/// bucket is the index of the first cutoff >= it; values above every cutoff
/// fall into the final bucket.
struct PercentileBuckets {
    cutoffs: Vec<f64>,
}

impl PercentileBuckets {
    fn from_values(values: &[f64], groups: usize) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let groups = groups.min(n);
        let step = (n / groups).max(1);
        let cutoffs = (step..n).step_by(step).map(|i| sorted[i]).collect();

        Self { cutoffs }
    }

    fn bucket_of(&self, value: f64) -> usize {
        self.cutoffs
            .iter()
            .position(|cutoff| *cutoff >= value)
            .unwrap_or(self.cutoffs.len())
    }
}

/// Converts a batch of raw financial metrics into bounded integer card
/// stats. Each ranked stat reflects the company's rank *within the batch*,
/// not its absolute figures, so the cards stay balanced whether the batch
/// spans millions or trillions in market cap.
///
/// Pure and deterministic: no I/O and nothing time- or randomness-dependent.
/// The whole batch must be present up front because the cutoffs are derived
/// from the batch's own value distribution.
pub struct CardStatEngine;

impl CardStatEngine {
    pub fn new() -> Self {
        Self
    }

    /// Map every company in the batch to a card, 1:1, tickers carried
    /// through unchanged.
    ///
    /// Fails only on an empty batch or a blank ticker; missing numeric
    /// fields are substituted with documented defaults and never error.
    pub fn compute_card_stats(
        &self,
        companies: &[CompanyMetrics],
    ) -> Result<Vec<Card>, CardError> {
        if companies.is_empty() {
            return Err(CardError::InvalidInput(
                "cannot compute card stats for an empty batch".to_string(),
            ));
        }
        if let Some(company) = companies.iter().find(|c| c.ticker.trim().is_empty()) {
            return Err(CardError::InvalidInput(format!(
                "company {:?} has no ticker",
                company.company_name.as_deref().unwrap_or("<unnamed>")
            )));
        }

        // Substitute defaults once per record; the same value feeds both
        // cutoff construction and the record's own bucket lookup.
        let market_caps: Vec<f64> = companies
            .iter()
            .map(|c| c.market_cap.unwrap_or(MARKET_CAP_DEFAULT))
            .collect();
        let free_cash_flows: Vec<f64> = companies
            .iter()
            .map(|c| c.free_cash_flow.unwrap_or(FREE_CASH_FLOW_DEFAULT))
            .collect();
        let shareholder_equities: Vec<f64> = companies
            .iter()
            .map(|c| c.shareholder_equity.unwrap_or(SHAREHOLDER_EQUITY_DEFAULT))
            .collect();

        let health_buckets = PercentileBuckets::from_values(&market_caps, PERCENTILE_GROUPS);
        let attack_buckets = PercentileBuckets::from_values(&free_cash_flows, PERCENTILE_GROUPS);
        let defense_buckets =
            PercentileBuckets::from_values(&shareholder_equities, PERCENTILE_GROUPS);

        let cards = companies
            .iter()
            .enumerate()
            .map(|(i, company)| Card {
                ticker: company.ticker.clone(),
                name: company.company_name.clone(),
                sector: company.sector.clone(),
                health: tier_lookup(&HEALTH_TIERS, health_buckets.bucket_of(market_caps[i])),
                attack: tier_lookup(&ATTACK_TIERS, attack_buckets.bucket_of(free_cash_flows[i])),
                defense: tier_lookup(
                    &DEFENSE_TIERS,
                    defense_buckets.bucket_of(shareholder_equities[i]),
                ),
                growth: growth_stat(company.earnings_growth),
                creature_name: None,
                creature_description: None,
                environment: None,
                creature_image: None,
            })
            .collect();

        Ok(cards)
    }
}

impl Default for CardStatEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp the bucket index into the table before looking up the tier.
fn tier_lookup(table: &[u32], bucket: usize) -> u32 {
    table[bucket.min(table.len() - 1)]
}

/// Growth is an absolute-scale transform, not a ranked one:
/// `clamp(round(g * 10) + 5, 2, 15)`, rounding half away from zero
/// (`f64::round`). Missing earnings growth counts as 0, so the stat is
/// always defined.
fn growth_stat(earnings_growth: Option<f64>) -> u32 {
    let growth = earnings_growth.unwrap_or(EARNINGS_GROWTH_DEFAULT);
    let scaled = (growth * 10.0).round() as i64 + 5;
    scaled.clamp(GROWTH_MIN, GROWTH_MAX) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn company(
        ticker: &str,
        market_cap: Option<f64>,
        free_cash_flow: Option<f64>,
        shareholder_equity: Option<f64>,
        earnings_growth: Option<f64>,
    ) -> CompanyMetrics {
        CompanyMetrics {
            ticker: ticker.to_string(),
            company_name: Some(format!("{} Inc", ticker)),
            sector: Some("Technology".to_string()),
            description: None,
            market_cap,
            free_cash_flow,
            shareholder_equity,
            earnings_growth,
        }
    }

    /// Ten companies whose market caps are simply 1..=10, everything else
    /// missing.
    fn ladder_batch() -> Vec<CompanyMetrics> {
        (1..=10)
            .map(|i| company(&format!("T{i}"), Some(i as f64), None, None, None))
            .collect()
    }

    fn stats_by_ticker(cards: &[Card]) -> BTreeMap<String, (u32, u32, u32, u32)> {
        cards
            .iter()
            .map(|c| (c.ticker.clone(), (c.health, c.attack, c.defense, c.growth)))
            .collect()
    }

    #[test]
    fn one_card_per_company_with_tickers_preserved() {
        let batch = ladder_batch();
        let cards = CardStatEngine::new().compute_card_stats(&batch).unwrap();

        assert_eq!(cards.len(), batch.len());
        let mut input_tickers: Vec<_> = batch.iter().map(|c| c.ticker.clone()).collect();
        let mut output_tickers: Vec<_> = cards.iter().map(|c| c.ticker.clone()).collect();
        input_tickers.sort();
        output_tickers.sort();
        assert_eq!(input_tickers, output_tickers);
    }

    #[test]
    fn stats_come_from_the_tier_tables() {
        let batch = ladder_batch();
        let cards = CardStatEngine::new().compute_card_stats(&batch).unwrap();

        for card in &cards {
            assert!(HEALTH_TIERS.contains(&card.health), "health {}", card.health);
            assert!(ATTACK_TIERS.contains(&card.attack), "attack {}", card.attack);
            assert!(DEFENSE_TIERS.contains(&card.defense), "defense {}", card.defense);
            assert!((GROWTH_MIN as u32..=GROWTH_MAX as u32).contains(&card.growth));
        }
    }

    #[test]
    fn bigger_market_cap_never_means_less_health() {
        let batch = ladder_batch();
        let cards = CardStatEngine::new().compute_card_stats(&batch).unwrap();
        let by_ticker = stats_by_ticker(&cards);

        for i in 1..10 {
            let (smaller, _, _, _) = by_ticker[&format!("T{i}")];
            let (larger, _, _, _) = by_ticker[&format!("T{}", i + 1)];
            assert!(larger >= smaller, "T{} {} < T{} {}", i + 1, larger, i, smaller);
        }
    }

    #[test]
    fn worked_example_pins_the_top_bucket_off_by_one() {
        // Caps 1..=10 build nine cutoffs [2..=10]. The smallest record hits
        // bucket 0; the largest only reaches bucket 8 (the last cutoff
        // equals its own value), i.e. health 60, not the 80 tier.
        let batch = ladder_batch();
        let cards = CardStatEngine::new().compute_card_stats(&batch).unwrap();
        let by_ticker = stats_by_ticker(&cards);

        assert_eq!(by_ticker["T1"].0, 24);
        assert_eq!(by_ticker["T10"].0, 60);
    }

    #[test]
    fn deterministic_under_batch_permutation() {
        let batch = ladder_batch();
        let mut reversed = batch.clone();
        reversed.reverse();

        let engine = CardStatEngine::new();
        let straight = stats_by_ticker(&engine.compute_card_stats(&batch).unwrap());
        let permuted = stats_by_ticker(&engine.compute_card_stats(&reversed).unwrap());

        assert_eq!(straight, permuted);
    }

    #[test]
    fn missing_market_cap_buckets_like_a_cap_of_one() {
        let mut with_null = ladder_batch();
        with_null[0].market_cap = None;
        let mut with_one = ladder_batch();
        with_one[0].market_cap = Some(1.0);

        let engine = CardStatEngine::new();
        let nulled = stats_by_ticker(&engine.compute_card_stats(&with_null).unwrap());
        let explicit = stats_by_ticker(&engine.compute_card_stats(&with_one).unwrap());

        assert_eq!(nulled, explicit);
    }

    #[test]
    fn single_company_batch_gets_the_lowest_tiers() {
        // One record means no cutoffs at all, so every ranked stat lands in
        // the first bucket no matter how large the underlying figures are.
        let batch = vec![company(
            "AAPL",
            Some(3.0e12),
            Some(1.0e11),
            Some(6.0e10),
            Some(0.1),
        )];
        let cards = CardStatEngine::new().compute_card_stats(&batch).unwrap();

        assert_eq!(cards[0].health, 24);
        assert_eq!(cards[0].attack, 5);
        assert_eq!(cards[0].defense, 1);
    }

    #[test]
    fn identical_values_all_share_the_lowest_bucket() {
        let batch: Vec<_> = (0..10)
            .map(|i| {
                company(
                    &format!("T{i}"),
                    Some(5.0e9),
                    Some(5.0e9),
                    Some(5.0e9),
                    None,
                )
            })
            .collect();
        let cards = CardStatEngine::new().compute_card_stats(&batch).unwrap();

        for card in &cards {
            assert_eq!(card.health, 24);
            assert_eq!(card.attack, 5);
            assert_eq!(card.defense, 1);
        }
    }

    #[test]
    fn growth_rounds_half_away_from_zero_and_clamps() {
        let cases = [
            (Some(0.33), 8),  // round(3.3) + 5
            (Some(-10.0), 2), // clamped at the floor
            (Some(2.0), 15),  // clamped at the ceiling
            (Some(0.05), 6),  // round(0.5) away from zero
            (None, 5),        // missing defaults to 0
        ];
        for (input, expected) in cases {
            let batch = vec![company("TST", None, None, None, input)];
            let cards = CardStatEngine::new().compute_card_stats(&batch).unwrap();
            assert_eq!(cards[0].growth, expected, "earnings_growth = {input:?}");
        }
    }

    #[test]
    fn empty_batch_is_invalid_input() {
        let err = CardStatEngine::new().compute_card_stats(&[]).unwrap_err();
        assert!(matches!(err, CardError::InvalidInput(_)));
    }

    #[test]
    fn blank_ticker_is_invalid_input() {
        let mut batch = ladder_batch();
        batch[3].ticker = "  ".to_string();
        let err = CardStatEngine::new().compute_card_stats(&batch).unwrap_err();
        assert!(matches!(err, CardError::InvalidInput(_)));
    }

    #[test]
    fn tier_tables_rise_monotonically() {
        for table in [&HEALTH_TIERS, &ATTACK_TIERS, &DEFENSE_TIERS] {
            for pair in table.windows(2) {
                assert!(pair[0] <= pair[1], "{table:?}");
            }
            // Ten distinct tiers, top entry duplicated as the clamp guard.
            assert_eq!(table[table.len() - 1], table[table.len() - 2]);
        }
    }
}
