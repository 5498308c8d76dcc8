use std::env;

use tracing::warn;
use url::Url;

use crate::error::{MonitorError, Result};

/// Alert delivery channel, selected and validated once at startup.
///
/// The original deployment picked a provider at send time by checking
/// credential string lengths; here the choice is made explicit before the
/// first cycle runs so a misconfigured process fails fast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelConfig {
    Mailjet {
        api_key: String,
        secret_key: String,
    },
    Ses {
        access_key: String,
        secret_key: String,
        region: String,
    },
}

/// Immutable per-process target configuration, read once from the
/// environment at startup and passed by reference into the orchestrator.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hostname of the website being monitored.
    pub website: String,
    /// TCP ports probed every cycle.
    pub ports: Vec<u16>,
    /// Administrator addresses that receive alert mail.
    pub recipients: Vec<String>,
    /// From address, `webmonitor@<SENDER_DOMAIN>`.
    pub sender: String,
    /// The alert channel to deliver through.
    pub channel: ChannelConfig,
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// Recognized keys: `WEBSITE_ADDRESS`, `WEBSITE_PORTS`,
    /// `WEB_ADMIN_EMAILS`, `SENDER_DOMAIN`, `MJ_APIKEY_PUBLIC`,
    /// `MJ_APIKEY_PRIVATE`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// `AWS_REGION`, `ALERT_CHANNEL`.
    pub fn from_env() -> Result<Self> {
        let website = require("WEBSITE_ADDRESS")?;
        Url::parse(&format!("https://{website}"))
            .map_err(|e| MonitorError::Config(format!("invalid WEBSITE_ADDRESS: {e}")))?;

        let ports = parse_ports(&env_opt("WEBSITE_PORTS").unwrap_or_else(|| "443".into()));
        if ports.is_empty() {
            return Err(MonitorError::Config(
                "WEBSITE_PORTS contains no usable port numbers".into(),
            ));
        }

        let recipients = parse_recipients(&require("WEB_ADMIN_EMAILS")?);
        if recipients.is_empty() {
            return Err(MonitorError::Config(
                "WEB_ADMIN_EMAILS contains no addresses".into(),
            ));
        }

        let sender = format!("webmonitor@{}", require("SENDER_DOMAIN")?);

        let mailjet = env_opt("MJ_APIKEY_PUBLIC").zip(env_opt("MJ_APIKEY_PRIVATE"));
        let ses = match (
            env_opt("AWS_ACCESS_KEY_ID"),
            env_opt("AWS_SECRET_ACCESS_KEY"),
            env_opt("AWS_REGION"),
        ) {
            (Some(access_key), Some(secret_key), Some(region)) => {
                Some((access_key, secret_key, region))
            }
            _ => None,
        };
        let channel = select_channel(env_opt("ALERT_CHANNEL").as_deref(), mailjet, ses)?;

        Ok(Self {
            website,
            ports,
            recipients,
            sender,
            channel,
        })
    }
}

/// Pick the alert channel: an explicit `ALERT_CHANNEL` pin wins, otherwise
/// the primary provider (Mailjet) is preferred over the fallback (SES).
pub fn select_channel(
    explicit: Option<&str>,
    mailjet: Option<(String, String)>,
    ses: Option<(String, String, String)>,
) -> Result<ChannelConfig> {
    let mailjet = mailjet.map(|(api_key, secret_key)| ChannelConfig::Mailjet {
        api_key,
        secret_key,
    });
    let ses = ses.map(|(access_key, secret_key, region)| ChannelConfig::Ses {
        access_key,
        secret_key,
        region,
    });

    match explicit {
        Some("mailjet") => mailjet.ok_or_else(|| {
            MonitorError::Config("ALERT_CHANNEL=mailjet but Mailjet credentials are not set".into())
        }),
        Some("ses") => ses.ok_or_else(|| {
            MonitorError::Config("ALERT_CHANNEL=ses but SES credentials are not set".into())
        }),
        Some(other) => Err(MonitorError::Config(format!(
            "unknown ALERT_CHANNEL {other:?}, expected \"mailjet\" or \"ses\""
        ))),
        None => mailjet.or(ses).ok_or(MonitorError::NoChannelConfigured),
    }
}

/// Parse a comma-separated port list, discarding tokens that are not valid
/// port numbers with a logged warning.
pub fn parse_ports(raw: &str) -> Vec<u16> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                warn!(token, "discarding non-numeric port token");
                None
            }
        })
        .collect()
}

/// Parse a comma-separated recipient list, dropping empty entries.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| MonitorError::Config(format!("{key} must be set")))
}
