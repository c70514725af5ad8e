//! Risk scores, weights and the fused assessment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{ProtocolId, UpgradeId};

/// Composite score below this is nominal.
pub const ELEVATED_THRESHOLD: f64 = 40.0;
/// Composite score at or above this is critical.
pub const CRITICAL_THRESHOLD: f64 = 70.0;
/// Substituted for a component whose inputs are unavailable.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Classification of a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Nominal,
    Elevated,
    Critical,
}

impl RiskLevel {
    #[must_use]
    pub fn classify(score: f64) -> Self {
        if score < ELEVATED_THRESHOLD {
            Self::Nominal
        } else if score < CRITICAL_THRESHOLD {
            Self::Elevated
        } else {
            Self::Critical
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nominal => "NOMINAL",
            Self::Elevated => "ELEVATED",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four scored risk dimensions, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskComponent {
    Technical,
    Governance,
    Market,
    Liquidity,
}

impl RiskComponent {
    pub const ALL: [Self; 4] = [
        Self::Technical,
        Self::Governance,
        Self::Market,
        Self::Liquidity,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Governance => "governance",
            Self::Market => "market",
            Self::Liquidity => "liquidity",
        }
    }
}

impl std::fmt::Display for RiskComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-component scores, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub technical: f64,
    pub governance: f64,
    pub market: f64,
    pub liquidity: f64,
}

impl ComponentScores {
    #[must_use]
    pub fn get(&self, component: RiskComponent) -> f64 {
        match component {
            RiskComponent::Technical => self.technical,
            RiskComponent::Governance => self.governance,
            RiskComponent::Market => self.market,
            RiskComponent::Liquidity => self.liquidity,
        }
    }

    /// Components in declaration order paired with their score.
    pub fn iter(&self) -> impl Iterator<Item = (RiskComponent, f64)> + '_ {
        RiskComponent::ALL.into_iter().map(|c| (c, self.get(c)))
    }
}

/// Component weights. Non-negative and summing to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    technical: f64,
    governance: f64,
    market: f64,
    liquidity: f64,
}

impl RiskWeights {
    const SUM_TOLERANCE: f64 = 1e-6;

    /// Validate and build a weight set.
    pub fn new(
        technical: f64,
        governance: f64,
        market: f64,
        liquidity: f64,
    ) -> Result<Self, DomainError> {
        let all = [technical, governance, market, liquidity];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(DomainError::InvalidWeights {
                reason: "weights must be finite and non-negative".into(),
            });
        }
        let sum: f64 = all.iter().sum();
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(DomainError::InvalidWeights {
                reason: format!("weights must sum to 1, got {sum:.4}"),
            });
        }
        Ok(Self {
            technical,
            governance,
            market,
            liquidity,
        })
    }

    #[must_use]
    pub fn get(&self, component: RiskComponent) -> f64 {
        match component {
            RiskComponent::Technical => self.technical,
            RiskComponent::Governance => self.governance,
            RiskComponent::Market => self.market,
            RiskComponent::Liquidity => self.liquidity,
        }
    }

    /// Weighted sum of the given scores.
    #[must_use]
    pub fn composite(&self, scores: &ComponentScores) -> f64 {
        RiskComponent::ALL
            .iter()
            .map(|c| self.get(*c) * scores.get(*c))
            .sum()
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            technical: 0.25,
            governance: 0.25,
            market: 0.25,
            liquidity: 0.25,
        }
    }
}

/// A component flagged as driving the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub component: RiskComponent,
    pub score: f64,
}

/// Fused risk view of one upgrade at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub upgrade: UpgradeId,
    pub protocol: ProtocolId,
    pub components: ComponentScores,
    pub composite: f64,
    pub level: RiskLevel,
    /// Sorted by score, descending.
    pub factors: Vec<RiskFactor>,
    pub recommendation: String,
    pub mitigations: Vec<String>,
    /// Set when any component used the neutral substitute.
    pub partial: bool,
    pub missing_inputs: Vec<RiskComponent>,
    pub model_version: String,
    pub computed_at: DateTime<Utc>,
}
