use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{AlertMessage, Mailer};
use crate::error::{MonitorError, Result};

const SEND_ENDPOINT: &str = "https://api.mailjet.com/v3.1/send";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Primary provider: the Mailjet v3.1 send API with basic auth.
pub struct MailjetMailer {
    client: reqwest::Client,
    api_key: String,
    secret_key: String,
}

#[derive(Debug, Serialize)]
struct SendRequest {
    #[serde(rename = "Messages")]
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    #[serde(rename = "From")]
    from: Address,
    #[serde(rename = "To")]
    to: Vec<Address>,
    #[serde(rename = "Subject")]
    subject: String,
    #[serde(rename = "TextPart")]
    text_part: String,
    #[serde(rename = "HTMLPart")]
    html_part: String,
}

#[derive(Debug, Serialize)]
struct Address {
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Name")]
    name: String,
}

impl MailjetMailer {
    pub fn new(api_key: String, secret_key: String) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            secret_key,
        })
    }
}

fn build_payload(message: &AlertMessage) -> SendRequest {
    SendRequest {
        messages: vec![Message {
            from: Address {
                email: message.sender.clone(),
                name: "Webmonitor".into(),
            },
            to: message
                .recipients
                .iter()
                .map(|recipient| Address {
                    email: recipient.clone(),
                    name: "Web Admins".into(),
                })
                .collect(),
            subject: message.subject.clone(),
            text_part: message.text_body.clone(),
            html_part: message.html_body.clone(),
        }],
    }
}

#[async_trait]
impl Mailer for MailjetMailer {
    async fn send(&self, message: &AlertMessage) -> Result<()> {
        let response = self
            .client
            .post(SEND_ENDPOINT)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .json(&build_payload(message))
            .send()
            .await
            .map_err(|e| MonitorError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, "mailjet accepted the alert");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MonitorError::Delivery(format!(
                "mailjet returned {status}: {body}"
            )))
        }
    }
}
