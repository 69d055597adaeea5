//! KPI score engine.
//!
//! Pure arithmetic shared by every screen that shows KPI numbers: completion
//! percentage, the 50/50 quantity/quality blend, performance tiers, and the
//! dashboard progress status. Invalid inputs fail with a validation error
//! rather than being clamped silently.

mod engine;
mod tiers;

pub use engine::{completion_percentage, final_score};
pub use tiers::{PerformanceTier, ProgressStatus};
