use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("DNS resolution failed: {0}")]
    Resolution(String),

    #[error("certificate check failed: {0}")]
    Certificate(String),

    #[error("HTTP status check failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no alert channel configured: set Mailjet or SES credentials")]
    NoChannelConfigured,

    #[error("alert delivery failed: {0}")]
    Delivery(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
