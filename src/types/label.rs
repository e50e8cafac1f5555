//! Risk label space shared by every model in the ensemble.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of risk tiers. Every probability vector has this many entries,
/// indexed by label id.
pub const NUM_LABELS: usize = 4;

/// Risk tier assigned to an analyzed post.
///
/// The integer ids are fixed by the training metadata of the base models
/// and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLabel {
    Low,
    Moderate,
    High,
    NoRisk,
}

impl RiskLabel {
    /// All labels in id order; the index into this array is the label id.
    pub const ALL: [RiskLabel; NUM_LABELS] = [
        RiskLabel::Low,
        RiskLabel::Moderate,
        RiskLabel::High,
        RiskLabel::NoRisk,
    ];

    /// Resolve a label from its stable integer id.
    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    /// Stable integer id of this label.
    pub fn id(self) -> usize {
        match self {
            RiskLabel::Low => 0,
            RiskLabel::Moderate => 1,
            RiskLabel::High => 2,
            RiskLabel::NoRisk => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLabel::Low => "low",
            RiskLabel::Moderate => "moderate",
            RiskLabel::High => "high",
            RiskLabel::NoRisk => "no_risk",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        for id in 0..NUM_LABELS {
            let label = RiskLabel::from_id(id).unwrap();
            assert_eq!(label.id(), id);
        }
        assert!(RiskLabel::from_id(NUM_LABELS).is_none());
    }

    #[test]
    fn test_all_matches_ids() {
        for (idx, label) in RiskLabel::ALL.iter().enumerate() {
            assert_eq!(label.id(), idx);
        }
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&RiskLabel::NoRisk).unwrap(),
            "\"no_risk\""
        );
        let label: RiskLabel = serde_json::from_str("\"moderate\"").unwrap();
        assert_eq!(label, RiskLabel::Moderate);
    }
}
