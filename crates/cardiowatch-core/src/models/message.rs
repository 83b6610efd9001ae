//! Messages pushed to live viewers

use serde::{Deserialize, Serialize};

use super::{HealthAlert, SubjectSummary};
use crate::error::Result;

/// A message pushed over the live channel.
///
/// Serialized as `{"type": "<kind>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveMessage {
    /// A new alert for a subject the viewer follows
    HealthAlert {
        alert: HealthAlert,
        subject: SubjectSummary,
    },
}

impl LiveMessage {
    /// Kind tag, as written on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HealthAlert { .. } => "health_alert",
        }
    }

    /// Encode as a text frame
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use super::*;
    use crate::models::{AlertType, NewAlert, Severity};

    #[test]
    fn health_alert_frame_layout() {
        let subject_id = Uuid::new_v4();
        let alert = HealthAlert::from_new(
            Uuid::new_v4(),
            NewAlert {
                reading_id: None,
                subject_id,
                alert_type: AlertType::HighHeartRate,
                severity: Severity::Critical,
                message: "HIGH HEART RATE: Heart rate 160 BPM, Rhythm: normal".to_string(),
            },
            Utc::now(),
        );
        let message = LiveMessage::HealthAlert {
            alert,
            subject: SubjectSummary {
                id: subject_id,
                display_name: "Ada L.".to_string(),
            },
        };

        let value: serde_json::Value = serde_json::from_str(&message.to_text().unwrap()).unwrap();
        assert_eq!(value["type"], message.kind());
        assert_eq!(value["data"]["subject"]["displayName"], "Ada L.");
        assert_eq!(value["data"]["subject"]["id"], subject_id.to_string());
        assert_eq!(value["data"]["alert"]["severity"], "critical");
    }
}
