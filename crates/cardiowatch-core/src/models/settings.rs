//! Per-subject alert settings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default high heart-rate threshold (BPM)
pub const DEFAULT_HIGH_THRESHOLD: i32 = 120;

/// Default low heart-rate threshold (BPM)
pub const DEFAULT_LOW_THRESHOLD: i32 = 50;

/// Alert thresholds and notification toggles for one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSettings {
    /// Subject these settings belong to
    pub subject_id: Uuid,

    /// Alert when heart rate exceeds this value
    pub high_heart_rate_threshold: i32,

    /// Alert when heart rate falls below this value
    pub low_heart_rate_threshold: i32,

    /// Rhythm alert toggle
    pub enable_rhythm_alerts: bool,

    /// Send WhatsApp messages for alerts
    #[serde(rename = "enableWhatsAppAlerts")]
    pub enable_whatsapp_alerts: bool,

    /// Send SMS messages for alerts
    pub enable_sms_alerts: bool,

    /// Last write time; `None` for unsaved defaults
    pub updated_at: Option<DateTime<Utc>>,
}

impl AlertSettings {
    /// Defaults for a subject with no stored settings
    pub fn defaults_for(subject_id: Uuid) -> Self {
        Self {
            subject_id,
            high_heart_rate_threshold: DEFAULT_HIGH_THRESHOLD,
            low_heart_rate_threshold: DEFAULT_LOW_THRESHOLD,
            enable_rhythm_alerts: true,
            enable_whatsapp_alerts: true,
            enable_sms_alerts: true,
            updated_at: None,
        }
    }

    /// Build stored settings from validated input
    pub fn from_input(subject_id: Uuid, input: &AlertSettingsInput, at: DateTime<Utc>) -> Self {
        let defaults = Self::defaults_for(subject_id);
        Self {
            subject_id,
            high_heart_rate_threshold: input
                .high_heart_rate_threshold
                .unwrap_or(defaults.high_heart_rate_threshold),
            low_heart_rate_threshold: input
                .low_heart_rate_threshold
                .unwrap_or(defaults.low_heart_rate_threshold),
            enable_rhythm_alerts: input
                .enable_rhythm_alerts
                .unwrap_or(defaults.enable_rhythm_alerts),
            enable_whatsapp_alerts: input
                .enable_whatsapp_alerts
                .unwrap_or(defaults.enable_whatsapp_alerts),
            enable_sms_alerts: input.enable_sms_alerts.unwrap_or(defaults.enable_sms_alerts),
            updated_at: Some(at),
        }
    }

    /// Whether any off-channel notification is enabled
    pub fn any_offchannel_enabled(&self) -> bool {
        self.enable_whatsapp_alerts || self.enable_sms_alerts
    }
}

/// Input for the create-or-replace settings write.
///
/// Omitted fields take their defaults; the write replaces the whole record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSettingsInput {
    /// New high threshold
    pub high_heart_rate_threshold: Option<i32>,
    /// New low threshold
    pub low_heart_rate_threshold: Option<i32>,
    /// Rhythm alert toggle
    pub enable_rhythm_alerts: Option<bool>,
    /// WhatsApp toggle
    #[serde(rename = "enableWhatsAppAlerts")]
    pub enable_whatsapp_alerts: Option<bool>,
    /// SMS toggle
    pub enable_sms_alerts: Option<bool>,
}

impl AlertSettingsInput {
    /// Reject thresholds that cannot classify anything sensibly
    pub fn validate(&self) -> Result<()> {
        let high = self.high_heart_rate_threshold.unwrap_or(DEFAULT_HIGH_THRESHOLD);
        let low = self.low_heart_rate_threshold.unwrap_or(DEFAULT_LOW_THRESHOLD);

        if high <= 0 || low <= 0 {
            return Err(Error::validation("thresholds must be positive"));
        }
        if low >= high {
            return Err(Error::validation(format!(
                "lowHeartRateThreshold ({low}) must be below highHeartRateThreshold ({high})"
            )));
        }
        Ok(())
    }
}
