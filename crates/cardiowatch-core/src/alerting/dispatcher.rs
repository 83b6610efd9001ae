//! Fan-out of new alerts to live viewers and off-channel providers

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::live::ConnectionRegistry;
use crate::models::{AlertSettings, HealthAlert, LiveMessage, Subject};

use super::gateway::{NotificationGateway, OffChannel, OffChannelNotice};

/// What a single dispatch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Pushes queued on a live session
    pub delivered: usize,
    /// Recipients that were connected but could not be written to
    pub dropped: usize,
    /// Off-channel sends handed to background tasks
    pub offchannel: Vec<OffChannel>,
}

/// Delivers each alert to the subject, their observer and enabled
/// off-channel routes. Delivery is best-effort and never fails the caller.
#[derive(Clone)]
pub struct FanOutDispatcher {
    registry: Arc<ConnectionRegistry>,
    gateway: Arc<dyn NotificationGateway>,
}

impl FanOutDispatcher {
    /// Create a dispatcher over a registry and gateway
    pub fn new(registry: Arc<ConnectionRegistry>, gateway: Arc<dyn NotificationGateway>) -> Self {
        Self { registry, gateway }
    }

    /// The registry pushes are resolved against
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Fan out `alert`.
    ///
    /// Live pushes are non-blocking queue writes. Off-channel sends are
    /// spawned and never awaited, so this must run inside a tokio runtime.
    pub fn dispatch(
        &self,
        alert: &HealthAlert,
        subject: &Subject,
        settings: &AlertSettings,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        self.push_live(alert, subject, &mut report);

        if settings.any_offchannel_enabled() {
            self.spawn_offchannel(alert, subject, settings, &mut report);
        }

        debug!(
            alert_id = %alert.id,
            delivered = report.delivered,
            dropped = report.dropped,
            offchannel = report.offchannel.len(),
            "Alert dispatched"
        );
        report
    }

    fn push_live(&self, alert: &HealthAlert, subject: &Subject, report: &mut DispatchReport) {
        let message = LiveMessage::HealthAlert {
            alert: alert.clone(),
            subject: subject.summary(),
        };

        let payload: Arc<str> = match message.to_text() {
            Ok(text) => Arc::from(text),
            Err(e) => {
                error!(alert_id = %alert.id, error = %e, "Failed to encode live message");
                return;
            }
        };

        let mut recipients = vec![subject.identity()];
        if let Some(observer) = subject.observer_identity() {
            if observer != recipients[0] {
                recipients.push(observer);
            }
        }

        for identity in recipients {
            let Some(session) = self.registry.lookup(&identity) else {
                debug!(identity = %identity, alert_id = %alert.id, "Recipient not connected");
                continue;
            };

            match session.push(Arc::clone(&payload)) {
                Ok(()) => {
                    report.delivered += 1;
                    metrics::counter!("cardiowatch_push_delivered_total").increment(1);
                }
                Err(e) => {
                    report.dropped += 1;
                    warn!(
                        identity = %identity,
                        alert_id = %alert.id,
                        error = %e,
                        "Live push dropped"
                    );
                    metrics::counter!("cardiowatch_delivery_failures_total", "channel" => "push")
                        .increment(1);
                }
            }
        }
    }

    fn spawn_offchannel(
        &self,
        alert: &HealthAlert,
        subject: &Subject,
        settings: &AlertSettings,
        report: &mut DispatchReport,
    ) {
        let Some(notice) = OffChannelNotice::for_alert(alert, subject) else {
            debug!(subject_id = %subject.id, "No phone number on file, skipping off-channel");
            return;
        };

        for channel in OffChannel::enabled_for(settings) {
            let gateway = Arc::clone(&self.gateway);
            let notice = notice.clone();

            tokio::spawn(async move {
                if let Err(e) = gateway.send(channel, &notice).await {
                    warn!(
                        alert_id = %notice.alert_id,
                        channel = channel.as_str(),
                        error = %e,
                        "Off-channel notification failed"
                    );
                    metrics::counter!(
                        "cardiowatch_delivery_failures_total",
                        "channel" => channel.as_str()
                    )
                    .increment(1);
                }
            });

            report.offchannel.push(channel);
        }
    }
}
