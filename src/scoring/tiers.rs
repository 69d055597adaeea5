use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Discrete classification of a blended final score.
///
/// Each tier is inclusive on its lower bound: exactly 90 is Excellent,
/// exactly 80 is Good, exactly 60 is Acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Excellent,
    Good,
    Acceptable,
    NeedsImprovement,
}

impl PerformanceTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            PerformanceTier::Excellent
        } else if score >= 80.0 {
            PerformanceTier::Good
        } else if score >= 60.0 {
            PerformanceTier::Acceptable
        } else {
            PerformanceTier::NeedsImprovement
        }
    }
}

/// Dashboard coloring for raw completion percentages.
///
/// One canonical threshold table is used everywhere: >= 100 Completed,
/// >= 70 OnTrack, >= 40 AtRisk, below that Behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Completed,
    OnTrack,
    AtRisk,
    Behind,
}

impl ProgressStatus {
    pub fn from_completion(completion_percentage: f64) -> Self {
        if completion_percentage >= 100.0 {
            ProgressStatus::Completed
        } else if completion_percentage >= 70.0 {
            ProgressStatus::OnTrack
        } else if completion_percentage >= 40.0 {
            ProgressStatus::AtRisk
        } else {
            ProgressStatus::Behind
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_lower_bounds_are_inclusive() {
        assert_eq!(PerformanceTier::from_score(90.0), PerformanceTier::Excellent);
        assert_eq!(PerformanceTier::from_score(89.999), PerformanceTier::Good);
        assert_eq!(PerformanceTier::from_score(80.0), PerformanceTier::Good);
        assert_eq!(PerformanceTier::from_score(79.999), PerformanceTier::Acceptable);
        assert_eq!(PerformanceTier::from_score(60.0), PerformanceTier::Acceptable);
        assert_eq!(PerformanceTier::from_score(59.999), PerformanceTier::NeedsImprovement);
        assert_eq!(PerformanceTier::from_score(0.0), PerformanceTier::NeedsImprovement);
    }

    #[test]
    fn over_achievement_is_still_excellent() {
        assert_eq!(PerformanceTier::from_score(120.0), PerformanceTier::Excellent);
    }

    // Canonical progress thresholds; the single source of truth for every
    // dashboard is this table.
    #[test]
    fn progress_threshold_table() {
        assert_eq!(ProgressStatus::from_completion(105.0), ProgressStatus::Completed);
        assert_eq!(ProgressStatus::from_completion(100.0), ProgressStatus::Completed);
        assert_eq!(ProgressStatus::from_completion(99.9), ProgressStatus::OnTrack);
        assert_eq!(ProgressStatus::from_completion(70.0), ProgressStatus::OnTrack);
        assert_eq!(ProgressStatus::from_completion(69.9), ProgressStatus::AtRisk);
        assert_eq!(ProgressStatus::from_completion(40.0), ProgressStatus::AtRisk);
        assert_eq!(ProgressStatus::from_completion(39.9), ProgressStatus::Behind);
        assert_eq!(ProgressStatus::from_completion(0.0), ProgressStatus::Behind);
    }
}
