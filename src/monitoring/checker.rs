use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use native_tls::TlsConnector;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{MonitorError, Result};

/// Ports that do not respond within this window are considered closed.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const TLS_TIMEOUT: Duration = Duration::from_secs(10);

/// Probes TCP ports one at a time against the resolved address.
pub struct PortProber {
    timeout: Duration,
}

impl Default for PortProber {
    fn default() -> Self {
        Self::new()
    }
}

impl PortProber {
    pub fn new() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Try to connect to each port in order and return the ones that failed.
    ///
    /// The probe connection is dropped as soon as the outcome is known;
    /// refusal and timeout are both treated as a closed port.
    pub async fn probe(&self, addr: IpAddr, ports: &[u16]) -> Vec<u16> {
        let mut failed = Vec::new();

        for &port in ports {
            match timeout(self.timeout, TcpStream::connect((addr, port))).await {
                Ok(Ok(_stream)) => info!(port, "port is open"),
                Ok(Err(e)) => {
                    info!(port, error = %e, "port is not open");
                    failed.push(port);
                }
                Err(_) => {
                    info!(port, "port probe timed out");
                    failed.push(port);
                }
            }
        }

        failed
    }
}

/// Issues the per-cycle HTTP HEAD request.
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// HEAD the target and return the numeric status code.
    pub async fn status(&self, target: &str) -> Result<u16> {
        let url = normalize_url(target);
        let response = self.client.head(&url).send().await?;
        let code = response.status().as_u16();
        debug!(code, %url, "HEAD status returned");
        Ok(code)
    }
}

/// Prepend `https://` when the target lacks an explicit scheme.
pub fn normalize_url(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

/// Fetches the leaf certificate from port 443 and checks its expiry.
pub struct CertChecker {
    timeout: Duration,
}

impl Default for CertChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl CertChecker {
    pub fn new() -> Self {
        Self {
            timeout: TLS_TIMEOUT,
        }
    }

    /// Returns true when the certificate's notAfter is in the past.
    pub async fn is_expired(&self, host: &str) -> Result<bool> {
        let der = self.fetch_leaf_der(host).await?;
        let (_not_before, not_after) = parse_validity(&der)?;
        let expired = not_after < Utc::now();
        debug!(%not_after, expired, "certificate validity");
        Ok(expired)
    }

    async fn fetch_leaf_der(&self, host: &str) -> Result<Vec<u8>> {
        // Invalid certs must still be accepted here so an already-expired
        // leaf can be inspected instead of failing the handshake.
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| MonitorError::Certificate(e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let addr = format!("{host}:443");
        let stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| MonitorError::Certificate(format!("connection to {addr} timed out")))?
            .map_err(|e| MonitorError::Certificate(e.to_string()))?;

        let tls_stream = timeout(self.timeout, connector.connect(host, stream))
            .await
            .map_err(|_| MonitorError::Certificate(format!("TLS handshake with {host} timed out")))?
            .map_err(|e| MonitorError::Certificate(e.to_string()))?;

        let cert = tls_stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| MonitorError::Certificate(e.to_string()))?
            .ok_or_else(|| MonitorError::Certificate("server presented no certificate".into()))?;

        cert.to_der()
            .map_err(|e| MonitorError::Certificate(e.to_string()))
    }
}

/// Extract the validity window from a DER-encoded certificate.
///
/// The TBS validity sequence holds the first two time values in the
/// encoding, as UTCTime (tag 0x17) or GeneralizedTime (tag 0x18); scanning
/// for them avoids a full ASN.1 parse.
fn parse_validity(der: &[u8]) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let mut times: Vec<DateTime<Utc>> = Vec::new();

    let mut i = 0;
    while i + 2 <= der.len() && times.len() < 2 {
        let tag = der[i];
        if tag == 0x17 || tag == 0x18 {
            let len = der[i + 1] as usize;
            if i + 2 + len <= der.len() {
                if let Ok(s) = std::str::from_utf8(&der[i + 2..i + 2 + len]) {
                    let parsed = match tag {
                        0x17 => parse_utc_time(s),
                        _ => parse_generalized_time(s),
                    };
                    if let Some(dt) = parsed {
                        times.push(dt);
                    }
                }
            }
        }
        i += 1;
    }

    match times.as_slice() {
        [not_before, not_after, ..] => Ok((*not_before, *not_after)),
        _ => Err(MonitorError::Certificate(
            "could not locate certificate validity dates".into(),
        )),
    }
}

/// UTCTime, `YYMMDDHHMMSSZ`; two-digit years below 50 are 20xx.
fn parse_utc_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim_end_matches('Z');
    if s.len() < 12 || !s.is_ascii() {
        return None;
    }
    let year: i32 = s[0..2].parse().ok()?;
    let year = if year >= 50 { 1900 + year } else { 2000 + year };
    datetime_from_fields(year, &s[2..12])
}

/// GeneralizedTime, `YYYYMMDDHHMMSSZ`.
fn parse_generalized_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim_end_matches('Z');
    if s.len() < 14 || !s.is_ascii() {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    datetime_from_fields(year, &s[4..14])
}

fn datetime_from_fields(year: i32, rest: &str) -> Option<DateTime<Utc>> {
    let month: u32 = rest[0..2].parse().ok()?;
    let day: u32 = rest[2..4].parse().ok()?;
    let hour: u32 = rest[4..6].parse().ok()?;
    let min: u32 = rest[6..8].parse().ok()?;
    let sec: u32 = rest[8..10].parse().ok()?;
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    #[test]
    fn scheme_is_prepended_when_missing() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn hostname_starting_with_http_still_gets_a_scheme() {
        assert_eq!(normalize_url("httpbin.org"), "https://httpbin.org");
        assert_eq!(normalize_url("https-site.example.com"), "https://https-site.example.com");
    }

    #[tokio::test]
    async fn open_port_is_not_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let failed = PortProber::new()
            .probe(IpAddr::V4(Ipv4Addr::LOCALHOST), &[port])
            .await;
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn closed_port_is_reported_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let failed = PortProber::new()
            .probe(IpAddr::V4(Ipv4Addr::LOCALHOST), &[port])
            .await;
        assert_eq!(failed, vec![port]);
    }

    #[tokio::test]
    async fn mixed_ports_report_only_the_closed_one() {
        let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = open.local_addr().unwrap().port();
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);

        let failed = PortProber::new()
            .probe(IpAddr::V4(Ipv4Addr::LOCALHOST), &[open_port, closed_port])
            .await;
        assert_eq!(failed, vec![closed_port]);
    }

    fn synthetic_der(not_before: &[u8], not_after: &[u8], tag: u8) -> Vec<u8> {
        let mut der = vec![0x30, 0x52, 0x02, 0x01, 0x02];
        for value in [not_before, not_after] {
            der.push(tag);
            der.push(value.len() as u8);
            der.extend_from_slice(value);
        }
        der
    }

    #[test]
    fn utc_time_validity_is_extracted() {
        let der = synthetic_der(b"200101000000Z", b"210101000000Z", 0x17);
        let (not_before, not_after) = parse_validity(&der).unwrap();
        assert_eq!(not_before, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(not_after, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert!(not_after < Utc::now());
    }

    #[test]
    fn generalized_time_validity_is_extracted() {
        let der = synthetic_der(b"20200101000000Z", b"20990101000000Z", 0x18);
        let (_, not_after) = parse_validity(&der).unwrap();
        assert_eq!(not_after, Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap());
        assert!(not_after > Utc::now());
    }

    #[test]
    fn garbage_der_is_an_error() {
        assert!(parse_validity(&[0x30, 0x03, 0x02, 0x01, 0x01]).is_err());
    }

    #[test]
    fn utc_time_century_window() {
        assert_eq!(
            parse_utc_time("491231235959Z").unwrap(),
            Utc.with_ymd_and_hms(2049, 12, 31, 23, 59, 59).unwrap()
        );
        assert_eq!(
            parse_utc_time("500101000000Z").unwrap(),
            Utc.with_ymd_and_hms(1950, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
