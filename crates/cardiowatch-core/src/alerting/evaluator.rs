//! Threshold evaluation for heart-rate readings
//!
//! Two checks run in sequence. The fixed band decides whether a reading is
//! normal at all; only abnormal readings are then classified against the
//! subject's personalized thresholds. The two can disagree, e.g. a subject
//! with a high threshold of 150 still gets an abnormal reading at 130 BPM,
//! classified as `abnormal_reading` because no personalized rule fires.

use crate::models::{
    AlertSettings, AlertType, Severity, DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD,
    NORMAL_RHYTHM,
};

/// Lower bound of the fixed normal band (inclusive)
pub const NORMAL_BAND_MIN: i32 = 50;

/// Upper bound of the fixed normal band (inclusive)
pub const NORMAL_BAND_MAX: i32 = 120;

/// High readings above this are critical
pub const CRITICAL_HIGH_BPM: i32 = 140;

/// Low readings below this are critical
pub const CRITICAL_LOW_BPM: i32 = 40;

/// Outcome of evaluating one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No alert
    Normal,
    /// Alert with the given classification
    Alert {
        /// Kind of abnormality
        alert_type: AlertType,
        /// Severity level
        severity: Severity,
    },
}

impl Decision {
    /// Whether the reading was normal
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Alert classification, if any
    pub fn alert(&self) -> Option<(AlertType, Severity)> {
        match *self {
            Self::Normal => None,
            Self::Alert {
                alert_type,
                severity,
            } => Some((alert_type, severity)),
        }
    }
}

/// Fixed-band normalcy check used at submission time
pub fn is_within_normal_band(heart_rate: i32, rhythm: &str) -> bool {
    (NORMAL_BAND_MIN..=NORMAL_BAND_MAX).contains(&heart_rate) && rhythm == NORMAL_RHYTHM
}

/// Classify a reading.
///
/// Out-of-range values are classified, not rejected. Without settings the
/// default thresholds apply.
pub fn evaluate(heart_rate: i32, rhythm: &str, settings: Option<&AlertSettings>) -> Decision {
    if is_within_normal_band(heart_rate, rhythm) {
        return Decision::Normal;
    }

    let (high, low) = settings.map_or((DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD), |s| {
        (s.high_heart_rate_threshold, s.low_heart_rate_threshold)
    });

    let (alert_type, severity) = if heart_rate > high {
        let severity = if heart_rate > CRITICAL_HIGH_BPM {
            Severity::Critical
        } else {
            Severity::High
        };
        (AlertType::HighHeartRate, severity)
    } else if heart_rate < low {
        let severity = if heart_rate < CRITICAL_LOW_BPM {
            Severity::Critical
        } else {
            Severity::High
        };
        (AlertType::LowHeartRate, severity)
    } else if rhythm != NORMAL_RHYTHM {
        (AlertType::IrregularRhythm, Severity::High)
    } else {
        (AlertType::AbnormalReading, Severity::Medium)
    };

    Decision::Alert {
        alert_type,
        severity,
    }
}

/// Human-readable alert message
pub fn alert_message(alert_type: AlertType, heart_rate: i32, rhythm: &str) -> String {
    format!(
        "{}: Heart rate {} BPM, Rhythm: {}",
        alert_type.headline(),
        heart_rate,
        rhythm
    )
}
