use super::stage::Stage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregates derived from the stage list. Never stored.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PresaleStats {
    pub total_raised: Decimal,
    pub total_tokens_sold: u64,
    pub current_stage: Option<Stage>,
}

impl PresaleStats {
    /// Folds stats over stages already ordered by `stage_number`.
    pub fn from_stages(stages: &[Stage]) -> Self {
        let total_tokens_sold = stages.iter().map(|s| s.sold_tokens).sum();
        let total_raised = stages
            .iter()
            .map(Stage::raised)
            .fold(Decimal::ZERO, |acc, raised| acc.saturating_add(raised))
            .normalize();
        let current_stage = stages.iter().find(|s| s.is_active).cloned();

        Self {
            total_raised,
            total_tokens_sold,
            current_stage,
        }
    }
}

/// What the UI renders: every stage plus the derived stats.
///
/// An empty snapshot means the data is unavailable, not that no stages exist.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct PresaleSnapshot {
    pub stages: Vec<Stage>,
    pub stats: PresaleStats,
}

impl PresaleSnapshot {
    pub fn from_stages(stages: Vec<Stage>) -> Self {
        let stats = PresaleStats::from_stages(&stages);
        Self { stages, stats }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }
}
