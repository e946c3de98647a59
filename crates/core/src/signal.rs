//! Scored trade candidates and the types the quality gate produces.
//!
//! A [`Candidate`] is the opaque input from the upstream scoring pipeline.
//! The gate turns it into an [`AcceptedSignal`] (with an assigned tier) or
//! discards it; nothing downstream ever sees a raw candidate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a position or candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Profit when price rises
    Long,
    /// Profit when price falls
    Short,
}

impl Side {
    /// Returns true for the long side.
    #[must_use]
    pub const fn is_long(self) -> bool {
        matches!(self, Self::Long)
    }

    /// Returns the opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

/// Discrete confidence bucket driving acceptance threshold and sizing multiplier.
///
/// Ordering matters: higher tiers demand higher confidence and earn a larger
/// allocation multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    /// Lowest acceptable bucket, sized down
    Scout,
    /// Baseline bucket, sized at 1x
    Standard,
    /// Highest-conviction bucket, sized up
    Prime,
}

/// Component scores produced by the upstream scorer, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub momentum: f64,
    pub trend: f64,
    pub volume: f64,
}

impl SubScores {
    /// Returns true when every component lies inside the unit interval.
    #[must_use]
    pub fn in_unit_range(&self) -> bool {
        [self.momentum, self.trend, self.volume]
            .iter()
            .all(|s| (0.0..=1.0).contains(s))
    }
}

/// A scored trade candidate from the upstream pipeline.
///
/// Immutable; consumed exactly once by the quality gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub side: Side,
    /// Composite confidence in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub sub_scores: SubScores,
    /// Expected return of the setup as a fraction (0.03 = 3%)
    pub expected_return: f64,
    /// Current volume over its recent average
    pub volume_ratio: f64,
    /// Scorer-suggested protective stop, if any
    #[serde(default)]
    pub suggested_stop: Option<Decimal>,
    /// Scorer-suggested profit target, if any
    #[serde(default)]
    pub suggested_target: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl Candidate {
    /// Creates a candidate with neutral sub-scores and no suggested levels.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            confidence,
            sub_scores: SubScores::default(),
            expected_return: 0.0,
            volume_ratio: 0.0,
            suggested_stop: None,
            suggested_target: None,
            timestamp,
        }
    }

    /// Sets the expected return.
    #[must_use]
    pub const fn with_expected_return(mut self, expected_return: f64) -> Self {
        self.expected_return = expected_return;
        self
    }

    /// Sets the volume-surge ratio.
    #[must_use]
    pub const fn with_volume_ratio(mut self, volume_ratio: f64) -> Self {
        self.volume_ratio = volume_ratio;
        self
    }

    /// Sets the component sub-scores.
    #[must_use]
    pub const fn with_sub_scores(mut self, sub_scores: SubScores) -> Self {
        self.sub_scores = sub_scores;
        self
    }

    /// Sets the suggested protective stop.
    #[must_use]
    pub const fn with_suggested_stop(mut self, stop: Decimal) -> Self {
        self.suggested_stop = Some(stop);
        self
    }

    /// Sets the suggested profit target.
    #[must_use]
    pub const fn with_suggested_target(mut self, target: Decimal) -> Self {
        self.suggested_target = Some(target);
        self
    }
}

/// A candidate that passed the quality gate, with its assigned tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedSignal {
    pub symbol: String,
    pub side: Side,
    pub confidence: f64,
    pub tier: QualityTier,
    pub expected_return: f64,
    pub suggested_stop: Option<Decimal>,
    pub suggested_target: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl AcceptedSignal {
    /// Builds an accepted signal from a validated candidate and its tier.
    #[must_use]
    pub fn from_candidate(candidate: &Candidate, tier: QualityTier) -> Self {
        Self {
            symbol: candidate.symbol.clone(),
            side: candidate.side,
            confidence: candidate.confidence,
            tier,
            expected_return: candidate.expected_return,
            suggested_stop: candidate.suggested_stop,
            suggested_target: candidate.suggested_target,
            timestamp: candidate.timestamp,
        }
    }
}
