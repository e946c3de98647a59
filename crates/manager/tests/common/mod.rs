use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Mutex;
use stealth_trade_core::{
    Candidate, EngineConfig, MarketDataFeed, Side, SubScores, TrailDistance,
};

/// Feed double: per-symbol prices set directly by the test.
#[derive(Default)]
pub struct StaticFeed {
    prices: Mutex<HashMap<String, Decimal>>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, symbol: &str, price: Decimal) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), price);
    }

    pub fn clear(&self, symbol: &str) {
        self.prices.lock().unwrap().remove(symbol);
    }
}

#[async_trait]
impl MarketDataFeed for StaticFeed {
    async fn snapshot(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        let prices = self.prices.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|s| prices.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }
}

/// Engine config tuned for tests: fixed $2 trail distance, slow tick so
/// `refresh_now` drives every cycle deterministically.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.trail.distance = TrailDistance::Fixed(dec!(2));
    config.manager.monitor_interval_secs = 3600;
    config.manager.close_backoff_base_secs = 0;
    config
}

/// A candidate that sails through the default gate thresholds.
pub fn strong_candidate(symbol: &str, confidence: f64) -> Candidate {
    Candidate::new(symbol, Side::Long, confidence, Utc::now())
        .with_expected_return(0.03)
        .with_volume_ratio(1.6)
        .with_sub_scores(SubScores {
            momentum: 0.8,
            trend: 0.7,
            volume: 0.9,
        })
}
