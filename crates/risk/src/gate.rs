//! Signal quality gate.
//!
//! Validates a scored candidate against confidence, profitability, and
//! volume thresholds. The only side effect is the generated/accepted/
//! rejected counters; everything else is a pure decision.

use serde::{Deserialize, Serialize};
use stealth_trade_core::{AcceptedSignal, Candidate, GateConfig, QualityTier};

/// Outcome of gate validation.
#[derive(Debug, Clone)]
pub enum GateDecision {
    Accepted(AcceptedSignal),
    Rejected { reason: GateRejectReason },
}

impl GateDecision {
    /// True for the accepted variant.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Why a candidate failed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateRejectReason {
    /// A sub-score or the confidence fell outside [0, 1]
    OutOfRangeScore,
    /// Confidence below the absolute floor
    BelowConfidenceFloor,
    /// Confidence below the lowest tier minimum
    BelowTierMinimum,
    /// Expected return under the profitability floor
    InsufficientExpectedReturn,
    /// Volume-surge ratio under the configured multiple
    WeakVolumeSurge,
}

impl std::fmt::Display for GateRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRangeScore => write!(f, "score outside the unit interval"),
            Self::BelowConfidenceFloor => write!(f, "confidence below absolute floor"),
            Self::BelowTierMinimum => write!(f, "confidence below lowest tier minimum"),
            Self::InsufficientExpectedReturn => write!(f, "expected return below floor"),
            Self::WeakVolumeSurge => write!(f, "volume surge below required multiple"),
        }
    }
}

/// Running gate statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GateCounters {
    pub generated: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Validates candidates and assigns quality tiers.
pub struct SignalGate {
    config: GateConfig,
    counters: GateCounters,
}

impl SignalGate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            counters: GateCounters::default(),
        }
    }

    /// Runs a candidate through every check in order.
    ///
    /// Check order: score sanity, absolute confidence floor, tier minimum,
    /// expected-return floor, volume surge. The volume check rejects
    /// regardless of how high the confidence is.
    pub fn validate(&mut self, candidate: &Candidate) -> GateDecision {
        self.counters.generated += 1;

        let decision = self.check(candidate);
        match &decision {
            GateDecision::Accepted(signal) => {
                self.counters.accepted += 1;
                tracing::debug!(
                    symbol = %signal.symbol,
                    confidence = signal.confidence,
                    tier = ?signal.tier,
                    "candidate accepted"
                );
            }
            GateDecision::Rejected { reason } => {
                self.counters.rejected += 1;
                tracing::debug!(symbol = %candidate.symbol, %reason, "candidate rejected");
            }
        }
        decision
    }

    fn check(&self, candidate: &Candidate) -> GateDecision {
        if !candidate.sub_scores.in_unit_range() || !(0.0..=1.0).contains(&candidate.confidence) {
            return GateDecision::Rejected {
                reason: GateRejectReason::OutOfRangeScore,
            };
        }

        if candidate.confidence < self.config.confidence_floor {
            return GateDecision::Rejected {
                reason: GateRejectReason::BelowConfidenceFloor,
            };
        }

        let Some(tier) = self.assign_tier(candidate.confidence) else {
            return GateDecision::Rejected {
                reason: GateRejectReason::BelowTierMinimum,
            };
        };

        if candidate.expected_return < self.config.min_expected_return {
            return GateDecision::Rejected {
                reason: GateRejectReason::InsufficientExpectedReturn,
            };
        }

        if candidate.volume_ratio < self.config.min_volume_ratio {
            return GateDecision::Rejected {
                reason: GateRejectReason::WeakVolumeSurge,
            };
        }

        GateDecision::Accepted(AcceptedSignal::from_candidate(candidate, tier))
    }

    fn assign_tier(&self, confidence: f64) -> Option<QualityTier> {
        if confidence >= self.config.prime_min {
            Some(QualityTier::Prime)
        } else if confidence >= self.config.standard_min {
            Some(QualityTier::Standard)
        } else if confidence >= self.config.scout_min {
            Some(QualityTier::Scout)
        } else {
            None
        }
    }

    /// Current counter values.
    #[must_use]
    pub const fn counters(&self) -> GateCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stealth_trade_core::{Side, SubScores};

    fn gate() -> SignalGate {
        SignalGate::new(GateConfig::default())
    }

    fn strong_candidate(symbol: &str, confidence: f64) -> Candidate {
        Candidate::new(symbol, Side::Long, confidence, Utc::now())
            .with_expected_return(0.03)
            .with_volume_ratio(1.6)
            .with_sub_scores(SubScores {
                momentum: 0.8,
                trend: 0.7,
                volume: 0.9,
            })
    }

    #[test]
    fn high_confidence_candidate_accepted() {
        // confidence 0.90, expected return 0.03, volume ratio 1.6 vs 1.2
        let mut gate = gate();
        let decision = gate.validate(&strong_candidate("ABC", 0.90));

        let GateDecision::Accepted(signal) = decision else {
            panic!("expected acceptance");
        };
        assert_eq!(signal.tier, QualityTier::Prime);
        assert_eq!(gate.counters().accepted, 1);
    }

    #[test]
    fn tier_boundaries() {
        let mut gate = gate();
        for (confidence, expected) in [
            (0.76, QualityTier::Scout),
            (0.80, QualityTier::Standard),
            (0.84, QualityTier::Standard),
            (0.85, QualityTier::Prime),
        ] {
            let GateDecision::Accepted(signal) = gate.validate(&strong_candidate("T", confidence))
            else {
                panic!("confidence {confidence} should pass");
            };
            assert_eq!(signal.tier, expected, "confidence {confidence}");
        }
    }

    #[test]
    fn confidence_below_floor_rejected() {
        let mut gate = gate();
        let decision = gate.validate(&strong_candidate("ABC", 0.65));
        assert!(matches!(
            decision,
            GateDecision::Rejected {
                reason: GateRejectReason::BelowConfidenceFloor
            }
        ));
    }

    #[test]
    fn between_floor_and_scout_rejected_by_tier() {
        let mut gate = gate();
        let decision = gate.validate(&strong_candidate("ABC", 0.72));
        assert!(matches!(
            decision,
            GateDecision::Rejected {
                reason: GateRejectReason::BelowTierMinimum
            }
        ));
    }

    #[test]
    fn weak_volume_rejects_despite_high_confidence() {
        let mut gate = gate();
        let candidate = strong_candidate("ABC", 0.95).with_volume_ratio(1.0);
        let decision = gate.validate(&candidate);
        assert!(matches!(
            decision,
            GateDecision::Rejected {
                reason: GateRejectReason::WeakVolumeSurge
            }
        ));
    }

    #[test]
    fn thin_expected_return_rejected() {
        let mut gate = gate();
        let candidate = strong_candidate("ABC", 0.90).with_expected_return(0.001);
        let decision = gate.validate(&candidate);
        assert!(matches!(
            decision,
            GateDecision::Rejected {
                reason: GateRejectReason::InsufficientExpectedReturn
            }
        ));
    }

    #[test]
    fn out_of_range_sub_score_rejected() {
        let mut gate = gate();
        let candidate = strong_candidate("ABC", 0.90).with_sub_scores(SubScores {
            momentum: 1.4,
            trend: 0.5,
            volume: 0.5,
        });
        let decision = gate.validate(&candidate);
        assert!(matches!(
            decision,
            GateDecision::Rejected {
                reason: GateRejectReason::OutOfRangeScore
            }
        ));
    }

    #[test]
    fn counters_track_every_outcome() {
        let mut gate = gate();
        gate.validate(&strong_candidate("A", 0.90));
        gate.validate(&strong_candidate("B", 0.50));
        gate.validate(&strong_candidate("C", 0.82));

        let counters = gate.counters();
        assert_eq!(counters.generated, 3);
        assert_eq!(counters.accepted, 2);
        assert_eq!(counters.rejected, 1);
    }
}
