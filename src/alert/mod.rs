//! Alert delivery to the administrator recipients.
//!
//! One email per failing cycle, sent through whichever provider the
//! configuration selected at startup.

pub mod mailjet;
pub mod ses;

use async_trait::async_trait;
use tracing::info;

use crate::config::{ChannelConfig, Config};
use crate::error::Result;
use crate::monitoring::CycleReport;

pub use mailjet::MailjetMailer;
pub use ses::SesMailer;

/// A single alert email with plain-text and HTML bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl AlertMessage {
    /// Build the alert for a failing cycle from the serialized report.
    pub fn for_report(
        website: &str,
        report: &CycleReport,
        sender: &str,
        recipients: &[String],
    ) -> Self {
        let detail = report.summary();
        Self {
            sender: sender.to_string(),
            recipients: recipients.to_vec(),
            subject: format!("Error on {website}"),
            text_body: format!(
                "An error has occurred for {website} which is returned with: {detail}"
            ),
            html_body: format!(
                "<p>An error has occurred for {website} with the following message:</p>{detail}"
            ),
        }
    }
}

/// Delivery backend for alert email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &AlertMessage) -> Result<()>;
}

/// Owns the selected channel and sends one best-effort alert per failing
/// cycle. Provider errors bubble up to the orchestrator, which logs them
/// and moves on; there is no in-cycle retry.
pub struct AlertDispatcher {
    mailer: Box<dyn Mailer>,
    sender: String,
    recipients: Vec<String>,
}

impl AlertDispatcher {
    /// Build the dispatcher from the validated channel configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mailer: Box<dyn Mailer> = match &config.channel {
            ChannelConfig::Mailjet {
                api_key,
                secret_key,
            } => Box::new(MailjetMailer::new(api_key.clone(), secret_key.clone())?),
            ChannelConfig::Ses {
                access_key,
                secret_key,
                region,
            } => Box::new(SesMailer::new(
                access_key.clone(),
                secret_key.clone(),
                region.clone(),
            )?),
        };

        Ok(Self {
            mailer,
            sender: config.sender.clone(),
            recipients: config.recipients.clone(),
        })
    }

    #[cfg(test)]
    fn with_mailer(mailer: Box<dyn Mailer>, sender: String, recipients: Vec<String>) -> Self {
        Self {
            mailer,
            sender,
            recipients,
        }
    }

    pub async fn dispatch(&self, website: &str, report: &CycleReport) -> Result<()> {
        let message = AlertMessage::for_report(website, report, &self.sender, &self.recipients);
        self.mailer.send(&message).await?;
        info!(website, "alert dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mailer that records every message instead of delivering it.
    struct RecordingMailer {
        sent: Arc<Mutex<Vec<AlertMessage>>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &AlertMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_cycle_dispatches_exactly_one_alert() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = AlertDispatcher::with_mailer(
            Box::new(RecordingMailer { sent: sent.clone() }),
            "webmonitor@example.org".into(),
            vec!["admin@example.org".into()],
        );

        let mut report = CycleReport::new();
        report.note_down_ports(vec![81]);
        dispatcher.dispatch("example.com", &report).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Error on example.com");
        assert_eq!(sent[0].sender, "webmonitor@example.org");
        assert_eq!(sent[0].recipients, vec!["admin@example.org".to_string()]);
        assert!(sent[0].text_body.contains(r#"{"Down Ports":[81]}"#));
    }

    #[tokio::test]
    async fn delivery_errors_surface_to_the_caller() {
        struct FailingMailer;

        #[async_trait]
        impl Mailer for FailingMailer {
            async fn send(&self, _message: &AlertMessage) -> Result<()> {
                Err(crate::error::MonitorError::Delivery("provider rejected".into()))
            }
        }

        let dispatcher = AlertDispatcher::with_mailer(
            Box::new(FailingMailer),
            "webmonitor@example.org".into(),
            vec!["admin@example.org".into()],
        );

        let mut report = CycleReport::new();
        report.note_status(503);
        let err = dispatcher.dispatch("example.com", &report).await.unwrap_err();
        assert!(matches!(err, crate::error::MonitorError::Delivery(_)));
    }

    #[test]
    fn alert_message_carries_the_report_summary() {
        let mut report = CycleReport::new();
        report.note_status(503);

        let message = AlertMessage::for_report(
            "example.com",
            &report,
            "webmonitor@example.org",
            &["admin@example.org".to_string()],
        );

        assert_eq!(message.subject, "Error on example.com");
        assert!(message.text_body.contains(r#"{"Status":503}"#));
        assert!(message.html_body.contains(r#"{"Status":503}"#));
        assert_eq!(message.recipients, vec!["admin@example.org".to_string()]);
    }
}
