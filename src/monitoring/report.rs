use std::collections::BTreeMap;

use serde::Serialize;

pub const DOWN_PORTS: &str = "Down Ports";
pub const STATUS: &str = "Status";
pub const STATUS_CHECK: &str = "Status Check";
pub const CERTIFICATE_STATUS: &str = "Certificate Status";
pub const RESOLUTION: &str = "Resolution";

/// Detail attached to a failed check in the cycle report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FailureDetail {
    Ports(Vec<u16>),
    Code(u16),
    Message(String),
}

/// Per-cycle map of failed-check-name to failure detail.
///
/// Built fresh each cycle and consumed (rendered into the alert body) or
/// discarded at the end of the iteration. An empty report is a healthy cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    #[serde(flatten)]
    entries: BTreeMap<&'static str, FailureDetail>,
}

impl CycleReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, check: &str) -> Option<&FailureDetail> {
        self.entries.get(check)
    }

    /// Record the ports that failed to accept a connection, if any.
    pub fn note_down_ports(&mut self, failed: Vec<u16>) {
        if !failed.is_empty() {
            self.entries.insert(DOWN_PORTS, FailureDetail::Ports(failed));
        }
    }

    /// Record the HTTP status code when it indicates a problem (>= 400).
    pub fn note_status(&mut self, code: u16) {
        if code >= 400 {
            self.entries.insert(STATUS, FailureDetail::Code(code));
        }
    }

    /// Record a transport-level failure of the HTTP status check.
    pub fn note_status_error(&mut self, error: String) {
        self.entries.insert(STATUS_CHECK, FailureDetail::Message(error));
    }

    /// Record the certificate state; only an expired certificate is a failure.
    pub fn note_cert_expired(&mut self, expired: bool) {
        if expired {
            self.entries
                .insert(CERTIFICATE_STATUS, FailureDetail::Message("Expired".into()));
        }
    }

    /// Record a failure to fetch or parse the certificate.
    pub fn note_cert_error(&mut self, error: String) {
        self.entries
            .insert(CERTIFICATE_STATUS, FailureDetail::Message(error));
    }

    /// Record a DNS resolution failure.
    pub fn note_resolution_error(&mut self, error: String) {
        self.entries.insert(RESOLUTION, FailureDetail::Message(error));
    }

    /// Render the report as JSON for the alert body.
    pub fn summary(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_else(|_| format!("{:?}", self.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_report_is_healthy() {
        let report = CycleReport::new();
        assert!(report.is_empty());
        assert_eq!(report.summary(), "{}");
    }

    #[test]
    fn down_ports_render_as_list() {
        let mut report = CycleReport::new();
        report.note_down_ports(vec![81]);
        assert_eq!(report.summary(), r#"{"Down Ports":[81]}"#);
    }

    #[test]
    fn empty_port_failures_add_nothing() {
        let mut report = CycleReport::new();
        report.note_down_ports(Vec::new());
        assert!(report.is_empty());
    }

    #[test]
    fn high_status_is_recorded() {
        let mut report = CycleReport::new();
        report.note_status(503);
        assert_eq!(report.get(STATUS), Some(&FailureDetail::Code(503)));
        assert_eq!(report.summary(), r#"{"Status":503}"#);
    }

    #[test]
    fn healthy_status_is_not_recorded() {
        let mut report = CycleReport::new();
        report.note_status(200);
        report.note_status(399);
        assert!(report.is_empty());
    }

    #[test]
    fn expired_certificate_is_recorded() {
        let mut report = CycleReport::new();
        report.note_cert_expired(true);
        assert_eq!(
            report.get(CERTIFICATE_STATUS),
            Some(&FailureDetail::Message("Expired".into()))
        );
    }

    #[test]
    fn valid_certificate_is_not_recorded() {
        let mut report = CycleReport::new();
        report.note_cert_expired(false);
        assert!(report.is_empty());
    }

    #[test]
    fn combined_failures_serialize_deterministically() {
        let mut report = CycleReport::new();
        report.note_status(503);
        report.note_down_ports(vec![25, 8080]);
        report.note_cert_expired(true);
        assert_eq!(
            report.summary(),
            r#"{"Certificate Status":"Expired","Down Ports":[25,8080],"Status":503}"#
        );
    }
}
