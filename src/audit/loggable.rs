use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// How long an audit entry matters. Stored with each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Access-control changes and deletions
    Critical,
    #[default]
    Important,
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

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "important" => Ok(Severity::Important),
            "noise" => Ok(Severity::Noise),
            other => Err(AppError::internal(format!("unknown audit severity: {other}"))),
        }
    }
}

/// Entities that can be written to the audit log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of the action name, e.g. `task` in `task.create`.
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "delete" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
