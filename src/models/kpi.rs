use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};
use crate::scoring::{PerformanceTier, ProgressStatus};

// =============================================================================
// ASSIGNMENT
// =============================================================================

/// Assignment lifecycle. Evaluated assignments are never deleted; they are
/// the audit trail for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Submitted,
    Evaluated,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Submitted => "submitted",
            AssignmentStatus::Evaluated => "evaluated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(AssignmentStatus::Assigned),
            "in_progress" => Some(AssignmentStatus::InProgress),
            "submitted" => Some(AssignmentStatus::Submitted),
            "evaluated" => Some(AssignmentStatus::Evaluated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KpiAssignment {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub cycle_id: Uuid,
    #[schema(example = "sales-north")]
    pub work_group: String,
    #[schema(example = 200.0)]
    pub target_value: f64,
    #[schema(example = "orders")]
    pub unit: String,
    /// Share of salary tied to this KPI, in percent.
    #[schema(example = 30.0)]
    pub weight_pct: f64,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for KpiAssignment {
    fn entity_type() -> &'static str {
        "kpi"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity(&self) -> Severity {
        Severity::Important
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbKpiAssignment {
    pub id: String,
    pub employee_id: String,
    pub cycle_id: String,
    pub work_group: String,
    pub target_value: f64,
    pub unit: String,
    pub weight_pct: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbKpiAssignment> for KpiAssignment {
    type Error = AppError;

    fn try_from(value: DbKpiAssignment) -> Result<Self, Self::Error> {
        let parse_id = |s: &str| {
            Uuid::parse_str(s).map_err(|_| AppError::internal(format!("malformed id '{s}' in kpi row")))
        };
        Ok(KpiAssignment {
            id: parse_id(&value.id)?,
            employee_id: parse_id(&value.employee_id)?,
            cycle_id: parse_id(&value.cycle_id)?,
            work_group: value.work_group,
            target_value: value.target_value,
            unit: value.unit,
            weight_pct: value.weight_pct,
            status: AssignmentStatus::parse(&value.status)
                .ok_or_else(|| AppError::internal(format!("malformed kpi status '{}'", value.status)))?,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct KpiCreateRequest {
    pub employee_id: Uuid,
    #[schema(example = "sales-north")]
    pub work_group: String,
    #[schema(example = 200.0)]
    pub target_value: f64,
    #[schema(example = "orders")]
    pub unit: String,
    #[schema(example = 30.0)]
    pub weight_pct: f64,
}

// =============================================================================
// REPORT (employee-submitted actual)
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PerformanceReport {
    pub id: Uuid,
    pub assignment_id: Uuid,
    #[schema(example = 210.0)]
    pub actual_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Loggable for PerformanceReport {
    fn entity_type() -> &'static str {
        "kpi_report"
    }
    fn subject_id(&self) -> Uuid {
        self.assignment_id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPerformanceReport {
    pub id: String,
    pub assignment_id: String,
    pub actual_value: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbPerformanceReport> for PerformanceReport {
    type Error = AppError;

    fn try_from(value: DbPerformanceReport) -> Result<Self, Self::Error> {
        let parse_id = |s: &str| {
            Uuid::parse_str(s).map_err(|_| AppError::internal(format!("malformed id '{s}' in report row")))
        };
        Ok(PerformanceReport {
            id: parse_id(&value.id)?,
            assignment_id: parse_id(&value.assignment_id)?,
            actual_value: value.actual_value,
            note: value.note,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportSubmitRequest {
    #[schema(example = 210.0)]
    pub actual_value: f64,
    pub note: Option<String>,
}

// =============================================================================
// EVALUATION (manager-recorded, derives the final score)
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PerformanceEvaluation {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub evaluator_id: Uuid,
    /// Completion percentage credited by the evaluator; may exceed 100.
    #[schema(example = 105.0)]
    pub quantity_score: f64,
    /// Integer mark from 1 to 10.
    #[schema(example = 9)]
    pub quality_rating: i64,
    #[schema(example = 97.5)]
    pub final_score: f64,
    pub tier: PerformanceTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Loggable for PerformanceEvaluation {
    fn entity_type() -> &'static str {
        "kpi_evaluation"
    }
    fn subject_id(&self) -> Uuid {
        self.assignment_id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPerformanceEvaluation {
    pub id: String,
    pub assignment_id: String,
    pub evaluator_id: String,
    pub quantity_score: f64,
    pub quality_rating: i64,
    pub final_score: f64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbPerformanceEvaluation> for PerformanceEvaluation {
    type Error = AppError;

    fn try_from(value: DbPerformanceEvaluation) -> Result<Self, Self::Error> {
        let parse_id = |s: &str| {
            Uuid::parse_str(s).map_err(|_| AppError::internal(format!("malformed id '{s}' in evaluation row")))
        };
        Ok(PerformanceEvaluation {
            id: parse_id(&value.id)?,
            assignment_id: parse_id(&value.assignment_id)?,
            evaluator_id: parse_id(&value.evaluator_id)?,
            quantity_score: value.quantity_score,
            quality_rating: value.quality_rating,
            tier: PerformanceTier::from_score(value.final_score),
            final_score: value.final_score,
            comment: value.comment,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    /// Defaults to the completion percentage from the submitted report.
    #[schema(example = 105.0)]
    pub quantity_score: Option<f64>,
    #[schema(example = 9)]
    pub quality_rating: i64,
    pub comment: Option<String>,
}

// =============================================================================
// CYCLE SUMMARY (analytics rollup)
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct KpiSummaryEntry {
    pub assignment_id: Uuid,
    pub employee_id: Uuid,
    #[schema(example = "sales-north")]
    pub work_group: String,
    pub status: AssignmentStatus,
    pub target_value: f64,
    #[schema(example = "orders")]
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<f64>,
    pub progress_status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<PerformanceTier>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct KpiCycleSummary {
    pub cycle_id: Uuid,
    pub entries: Vec<KpiSummaryEntry>,
}
