//! CSV replay price feed for paper trading runs.
//!
//! Input rows are `step,symbol,price`; all rows sharing a step form one
//! price frame. The CLI loop advances the frame cursor once per cycle, and
//! `snapshot` serves the current frame. Symbols absent from a frame are
//! simply missing from the snapshot, which exercises the engine's
//! skip-on-stale behavior.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use stealth_trade_core::MarketDataFeed;

#[derive(Debug, Deserialize)]
struct PriceRow {
    step: usize,
    symbol: String,
    price: String,
}

pub struct CsvReplayFeed {
    frames: Vec<HashMap<String, Decimal>>,
    cursor: Mutex<usize>,
}

impl CsvReplayFeed {
    /// Loads all frames from a CSV file.
    ///
    /// # Errors
    /// Returns an error on unreadable files, malformed rows, or bad prices.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("opening price file {}", path.display()))?;

        let mut frames: Vec<HashMap<String, Decimal>> = Vec::new();
        for row in reader.deserialize() {
            let row: PriceRow = row.context("parsing price row")?;
            let price = Decimal::from_str(&row.price)
                .with_context(|| format!("bad price {:?} for {}", row.price, row.symbol))?;
            if frames.len() <= row.step {
                frames.resize_with(row.step + 1, HashMap::new);
            }
            frames[row.step].insert(row.symbol, price);
        }

        if frames.is_empty() {
            anyhow::bail!("price file {} contains no rows", path.display());
        }
        tracing::info!(frames = frames.len(), "loaded replay price frames");
        Ok(Self {
            frames,
            cursor: Mutex::new(0),
        })
    }

    /// Moves to the next frame. Returns false once the replay is exhausted.
    pub fn advance(&self) -> bool {
        let mut cursor = self.cursor.lock().expect("cursor poisoned");
        if *cursor + 1 < self.frames.len() {
            *cursor += 1;
            true
        } else {
            false
        }
    }

    fn current(&self) -> HashMap<String, Decimal> {
        let cursor = self.cursor.lock().expect("cursor poisoned");
        self.frames[*cursor].clone()
    }
}

#[async_trait]
impl MarketDataFeed for CsvReplayFeed {
    async fn snapshot(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        let frame = self.current();
        Ok(symbols
            .iter()
            .filter_map(|s| frame.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }
}
