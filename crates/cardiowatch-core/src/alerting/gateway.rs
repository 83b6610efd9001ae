//! Off-channel (SMS / WhatsApp) notification delivery

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::models::{AlertSettings, HealthAlert, Subject};

/// Off-channel delivery route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffChannel {
    /// WhatsApp message
    WhatsApp,
    /// Plain SMS
    Sms,
}

impl OffChannel {
    /// Label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Sms => "sms",
        }
    }

    /// Channels switched on in `settings`
    pub fn enabled_for(settings: &AlertSettings) -> Vec<Self> {
        let mut channels = Vec::with_capacity(2);
        if settings.enable_whatsapp_alerts {
            channels.push(Self::WhatsApp);
        }
        if settings.enable_sms_alerts {
            channels.push(Self::Sms);
        }
        channels
    }

    fn address(self, number: &str) -> String {
        match self {
            Self::WhatsApp => format!("whatsapp:{number}"),
            Self::Sms => number.to_string(),
        }
    }
}

/// One outbound off-channel message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffChannelNotice {
    /// Alert the message is about
    pub alert_id: Uuid,
    /// Recipient number in E.164 form
    pub to: String,
    /// Message text
    pub body: String,
}

impl OffChannelNotice {
    /// Build the notice for `alert`; `None` when the subject has no number
    pub fn for_alert(alert: &HealthAlert, subject: &Subject) -> Option<Self> {
        let to = subject.phone_number.as_deref()?.trim();
        if to.is_empty() {
            return None;
        }

        Some(Self {
            alert_id: alert.id,
            to: to.to_string(),
            body: format!(
                "CardioWatch {} alert for {}: {}",
                alert.severity.as_str().to_uppercase(),
                subject.display_name,
                alert.message
            ),
        })
    }
}

/// Off-channel delivery errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("no sender number configured for {}", .0.as_str())]
    NoSender(OffChannel),
}

/// Outcome of one off-channel send
pub type GatewayResult = std::result::Result<(), GatewayError>;

/// An external messaging provider.
///
/// Calls are one-way; the dispatcher never waits on them.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Send one message over `channel`
    async fn send(&self, channel: OffChannel, notice: &OffChannelNotice) -> GatewayResult;
}

/// Gateway that posts to a Twilio-compatible messages API
pub struct HttpGateway {
    client: Client,
    messages_url: String,
    account_sid: String,
    auth_token: Option<String>,
    sms_from: Option<String>,
    whatsapp_from: Option<String>,
}

impl HttpGateway {
    /// Create a gateway from configuration
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        let messages_url = format!(
            "{}/Accounts/{}/Messages.json",
            config.base_url.trim_end_matches('/'),
            config.account_sid
        );

        Ok(Self {
            client,
            messages_url,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            sms_from: config.sms_from.clone(),
            whatsapp_from: config.whatsapp_from.clone(),
        })
    }

    fn sender_for(&self, channel: OffChannel) -> Option<&str> {
        match channel {
            OffChannel::WhatsApp => self.whatsapp_from.as_deref(),
            OffChannel::Sms => self.sms_from.as_deref(),
        }
    }
}

#[async_trait]
impl NotificationGateway for HttpGateway {
    async fn send(&self, channel: OffChannel, notice: &OffChannelNotice) -> GatewayResult {
        let from = self
            .sender_for(channel)
            .ok_or(GatewayError::NoSender(channel))?;

        let form = [
            ("From", channel.address(from)),
            ("To", channel.address(&notice.to)),
            ("Body", notice.body.clone()),
        ];

        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, self.auth_token.as_deref())
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http(format!(
                "Provider returned {}: {}",
                status, body
            )));
        }

        info!(
            alert_id = %notice.alert_id,
            channel = channel.as_str(),
            "Off-channel notification sent"
        );
        Ok(())
    }
}

/// Gateway used when no provider is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGateway;

#[async_trait]
impl NotificationGateway for DisabledGateway {
    async fn send(&self, channel: OffChannel, notice: &OffChannelNotice) -> GatewayResult {
        debug!(
            alert_id = %notice.alert_id,
            channel = channel.as_str(),
            "Off-channel gateway disabled, message not sent"
        );
        Ok(())
    }
}

/// Build the gateway selected by configuration
pub fn gateway_from_config(config: &GatewayConfig) -> Result<Arc<dyn NotificationGateway>> {
    if config.enabled {
        Ok(Arc::new(HttpGateway::new(config)?))
    } else {
        Ok(Arc::new(DisabledGateway))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::{AlertType, NewAlert, Severity};

    fn subject(phone: Option<&str>) -> Subject {
        Subject {
            id: Uuid::new_v4(),
            display_name: "Grace H.".to_string(),
            phone_number: phone.map(String::from),
            observer_id: None,
        }
    }

    fn alert(subject_id: Uuid) -> HealthAlert {
        HealthAlert::from_new(
            Uuid::new_v4(),
            NewAlert {
                reading_id: None,
                subject_id,
                alert_type: AlertType::LowHeartRate,
                severity: Severity::Critical,
                message: "LOW HEART RATE: Heart rate 35 BPM, Rhythm: normal".to_string(),
            },
            Utc::now(),
        )
    }

    fn config(base_url: String) -> GatewayConfig {
        GatewayConfig {
            enabled: true,
            base_url,
            account_sid: "AC123".to_string(),
            auth_token: Some("secret".to_string()),
            sms_from: Some("+15550009999".to_string()),
            whatsapp_from: Some("+15550008888".to_string()),
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn notice_requires_phone_number() {
        let without = subject(None);
        assert!(OffChannelNotice::for_alert(&alert(without.id), &without).is_none());

        let with = subject(Some("+15550001111"));
        let notice = OffChannelNotice::for_alert(&alert(with.id), &with).unwrap();
        assert_eq!(notice.to, "+15550001111");
        assert!(notice.body.starts_with("CardioWatch CRITICAL alert for Grace H.:"));
    }

    #[test]
    fn enabled_channels_follow_toggles() {
        let mut settings = AlertSettings::defaults_for(Uuid::nil());
        assert_eq!(
            OffChannel::enabled_for(&settings),
            vec![OffChannel::WhatsApp, OffChannel::Sms]
        );
        settings.enable_whatsapp_alerts = false;
        assert_eq!(OffChannel::enabled_for(&settings), vec![OffChannel::Sms]);
    }

    #[tokio::test]
    async fn whatsapp_message_is_posted_as_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=whatsapp%3A%2B15550001111"))
            .and(body_string_contains("From=whatsapp%3A%2B15550008888"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(&config(server.uri())).unwrap();
        let subject = subject(Some("+15550001111"));
        let notice = OffChannelNotice::for_alert(&alert(subject.id), &subject).unwrap();

        gateway.send(OffChannel::WhatsApp, &notice).await.unwrap();
    }

    #[tokio::test]
    async fn provider_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(&config(server.uri())).unwrap();
        let subject = subject(Some("+15550001111"));
        let notice = OffChannelNotice::for_alert(&alert(subject.id), &subject).unwrap();

        let err = gateway.send(OffChannel::Sms, &notice).await.unwrap_err();
        assert!(matches!(err, GatewayError::Http(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn missing_sender_number_fails_fast() {
        let mut cfg = config("http://127.0.0.1:9".to_string());
        cfg.sms_from = None;
        let gateway = HttpGateway::new(&cfg).unwrap();
        let subject = subject(Some("+15550001111"));
        let notice = OffChannelNotice::for_alert(&alert(subject.id), &subject).unwrap();

        let err = gateway.send(OffChannel::Sms, &notice).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoSender(OffChannel::Sms)));
    }
}
