use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{AlertMessage, Mailer};
use crate::error::{MonitorError, Result};

const SERVICE: &str = "ses";
const SEND_PATH: &str = "/v2/email/outbound-emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

type HmacSha256 = Hmac<Sha256>;

/// Fallback provider: the SES v2 REST API, signed with AWS Signature V4.
pub struct SesMailer {
    client: reqwest::Client,
    access_key: String,
    secret_key: String,
    region: String,
}

impl SesMailer {
    pub fn new(access_key: String, secret_key: String, region: String) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            access_key,
            secret_key,
            region,
        })
    }

    fn endpoint_host(&self) -> String {
        format!("email.{}.amazonaws.com", self.region)
    }
}

fn build_payload(message: &AlertMessage) -> serde_json::Value {
    json!({
        "FromEmailAddress": format!("Webmonitor <{}>", message.sender),
        "Destination": { "ToAddresses": message.recipients },
        "Content": { "Simple": {
            "Subject": { "Data": message.subject, "Charset": "UTF-8" },
            "Body": {
                "Text": { "Data": message.text_body, "Charset": "UTF-8" },
                "Html": { "Data": message.html_body, "Charset": "UTF-8" },
            },
        }},
    })
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute the Signature V4 `X-Amz-Date` and `Authorization` values for a
/// send request against `host` with the given JSON `body`.
fn sign_request(
    access_key: &str,
    secret_key: &str,
    region: &str,
    host: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> (String, String) {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let canonical_headers =
        format!("content-type:application/json\nhost:{host}\nx-amz-date:{amz_date}\n");
    let signed_headers = "content-type;host;x-amz-date";
    let canonical_request = format!(
        "POST\n{SEND_PATH}\n\n{canonical_headers}\n{signed_headers}\n{}",
        sha256_hex(body)
    );

    let scope = format!("{date}/{region}/{SERVICE}/aws4_request");
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
    let k_signing = hmac_sha256(&k_service, b"aws4_request");
    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={access_key}/{scope}, \
         SignedHeaders={signed_headers}, Signature={signature}"
    );

    (amz_date, authorization)
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, message: &AlertMessage) -> Result<()> {
        let body = serde_json::to_vec(&build_payload(message))
            .map_err(|e| MonitorError::Delivery(e.to_string()))?;

        let host = self.endpoint_host();
        let (amz_date, authorization) = sign_request(
            &self.access_key,
            &self.secret_key,
            &self.region,
            &host,
            &body,
            Utc::now(),
        );

        let response = self
            .client
            .post(format!("https://{host}{SEND_PATH}"))
            .header("Content-Type", "application/json")
            .header("X-Amz-Date", amz_date)
            .header("Authorization", authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| MonitorError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let reply: serde_json::Value = response.json().await.unwrap_or_default();
            debug!(message_id = %reply["MessageId"], "ses accepted the alert");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MonitorError::Delivery(format!(
                "ses returned {status}: {body}"
            )))
        }
    }
}
