use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for audit entries. Controls retention and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Permission and evaluation changes: long-term retention, never auto-delete.
    Critical,
    /// Everyday record changes (default).
    #[default]
    Important,
    /// High-volume events trimmed aggressively.
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities that can appear in the audit trail.
///
/// The entity type becomes the prefix of event names like
/// `permission_override.granted` or `kpi.evaluated`.
pub trait Loggable: Serialize + Send + Sync {
    fn entity_type() -> &'static str;

    /// Usually the entity's primary key; for KPI artifacts, the assignment id.
    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "revoked" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
