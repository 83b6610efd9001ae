//! Monitored subjects, as seen by the alerting core

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monitored individual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// Unique identifier
    pub id: Uuid,

    /// Name shown to viewers
    pub display_name: String,

    /// Off-channel recipient in E.164 form
    pub phone_number: Option<String>,

    /// Assigned observer, if any
    pub observer_id: Option<Uuid>,
}

impl Subject {
    /// Live-channel identity of the subject
    pub fn identity(&self) -> String {
        self.id.to_string()
    }

    /// Live-channel identity of the assigned observer
    pub fn observer_identity(&self) -> Option<String> {
        self.observer_id.map(|id| id.to_string())
    }

    /// Push-payload view
    pub fn summary(&self) -> SubjectSummary {
        SubjectSummary {
            id: self.id,
            display_name: self.display_name.clone(),
        }
    }
}

/// Subject fields included in push messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    /// Subject identifier
    pub id: Uuid,
    /// Name shown to viewers
    pub display_name: String,
}
