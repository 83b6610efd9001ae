//! Alerting for CardioWatch
//!
//! Classifies readings against fixed and per-subject thresholds and fans new
//! alerts out to live viewers and off-channel providers.

mod dispatcher;
mod evaluator;
pub mod gateway;

pub use dispatcher::{DispatchReport, FanOutDispatcher};
pub use evaluator::{
    alert_message, evaluate, is_within_normal_band, Decision, CRITICAL_HIGH_BPM,
    CRITICAL_LOW_BPM, NORMAL_BAND_MAX, NORMAL_BAND_MIN,
};
pub use gateway::{
    gateway_from_config, DisabledGateway, GatewayError, GatewayResult, HttpGateway,
    NotificationGateway, OffChannel, OffChannelNotice,
};
