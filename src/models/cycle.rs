use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::Loggable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Planning,
    Active,
    Closed,
}

impl CycleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleStatus::Planning => "planning",
            CycleStatus::Active => "active",
            CycleStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(CycleStatus::Planning),
            "active" => Some(CycleStatus::Active),
            "closed" => Some(CycleStatus::Closed),
            _ => None,
        }
    }

    /// Cycles move forward only: planning -> active -> closed.
    pub fn can_transition_to(self, next: CycleStatus) -> bool {
        matches!(
            (self, next),
            (CycleStatus::Planning, CycleStatus::Active) | (CycleStatus::Active, CycleStatus::Closed)
        )
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PerformanceCycle {
    pub id: Uuid,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub status: CycleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for PerformanceCycle {
    fn entity_type() -> &'static str {
        "cycle"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPerformanceCycle {
    pub id: String,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPerformanceCycle> for PerformanceCycle {
    type Error = AppError;

    fn try_from(value: DbPerformanceCycle) -> Result<Self, Self::Error> {
        Ok(PerformanceCycle {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal(format!("malformed cycle id '{}'", value.id)))?,
            name: value.name,
            starts_on: value.starts_on,
            ends_on: value.ends_on,
            status: CycleStatus::parse(&value.status)
                .ok_or_else(|| AppError::internal(format!("malformed cycle status '{}'", value.status)))?,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CycleCreateRequest {
    #[schema(example = "Q3 2026")]
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CycleStatusRequest {
    pub status: CycleStatus,
}
