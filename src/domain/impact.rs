//! Market behaviour before and after an upgrade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::forecast::{FlowEstimate, VolatilityShift};
use super::id::{ProtocolId, UpgradeId};

/// Relative change beyond which TVL level or TVL dispersion counts as moved.
const TRANSITION_THRESHOLD: f64 = 0.1;

/// How liquidity settled after an upgrade, judged on the change in mean TVL
/// and in TVL dispersion between the two windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityTransition {
    StableGrowth,
    VolatileGrowth,
    StableDecline,
    VolatileDecline,
    HighVolatilityStable,
    Stable,
}

impl LiquidityTransition {
    /// Both arguments are relative changes (`0.1` = +10%).
    #[must_use]
    pub fn classify(tvl_change: f64, volatility_change: f64) -> Self {
        let t = TRANSITION_THRESHOLD;
        if tvl_change > t && volatility_change < t {
            Self::StableGrowth
        } else if tvl_change > t && volatility_change > t {
            Self::VolatileGrowth
        } else if tvl_change < -t && volatility_change < t {
            Self::StableDecline
        } else if tvl_change < -t && volatility_change > t {
            Self::VolatileDecline
        } else if tvl_change.abs() <= t && volatility_change > t {
            Self::HighVolatilityStable
        } else {
            Self::Stable
        }
    }
}

/// Annualized realized volatility on either side of the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityImpact {
    pub pre: f64,
    pub post: f64,
    /// `(post - pre) / pre`; zero when `pre` is zero.
    pub change: f64,
    pub shift: VolatilityShift,
}

/// TVL level and dispersion on either side of the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityImpact {
    pub pre_mean_tvl: f64,
    pub post_mean_tvl: f64,
    pub tvl_change: f64,
    pub pre_tvl_std: f64,
    pub post_tvl_std: f64,
    pub volatility_change: f64,
    pub transition: LiquidityTransition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeImpact {
    pub upgrade: UpgradeId,
    pub protocol: ProtocolId,
    /// Execution time, or first sighting when the upgrade never executed.
    pub anchor: DateTime<Utc>,
    /// Absent when either window holds fewer than three prices.
    pub volatility: Option<VolatilityImpact>,
    /// Absent when either window holds no TVL observation.
    pub liquidity: Option<LiquidityImpact>,
    /// Expected movement from each related protocol into this one.
    pub flows: Vec<FlowEstimate>,
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use LiquidityTransition::*;
        assert_eq!(LiquidityTransition::classify(0.2, 0.0), StableGrowth);
        assert_eq!(LiquidityTransition::classify(0.2, 0.3), VolatileGrowth);
        assert_eq!(LiquidityTransition::classify(-0.2, -0.5), StableDecline);
        assert_eq!(LiquidityTransition::classify(-0.2, 0.3), VolatileDecline);
        assert_eq!(LiquidityTransition::classify(0.05, 0.3), HighVolatilityStable);
        assert_eq!(LiquidityTransition::classify(0.05, 0.0), Stable);
    }

    #[test]
    fn boundary_changes_fall_through_to_stable() {
        // Exactly +10% in dispersion is neither calm nor volatile growth.
        assert_eq!(LiquidityTransition::classify(0.2, 0.1), LiquidityTransition::Stable);
        assert_eq!(LiquidityTransition::classify(0.1, 0.0), LiquidityTransition::Stable);
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&LiquidityTransition::HighVolatilityStable).unwrap(),
            "\"high_volatility_stable\""
        );
    }
}
