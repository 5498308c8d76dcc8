//! The sequential check-and-alert loop.
//!
//! Each cycle resolves the host, probes the configured ports, checks the
//! HTTP status, inspects the certificate, and dispatches one alert when
//! anything failed. Cycles repeat until the process is stopped.

use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::alert::AlertDispatcher;
use crate::config::Config;
use crate::monitoring::{CertChecker, CycleReport, HostResolver, HttpChecker, PortProber};

/// Delay before the next cycle after at least one failed check.
const FAILURE_DELAY: Duration = Duration::from_secs(30);
/// Delay before the next cycle when everything passed.
const HEALTHY_DELAY: Duration = Duration::from_secs(60);

pub struct Orchestrator {
    config: Config,
    dispatcher: AlertDispatcher,
    resolver: HostResolver,
    prober: PortProber,
    http: HttpChecker,
    cert: CertChecker,
}

impl Orchestrator {
    pub fn new(config: Config, dispatcher: AlertDispatcher) -> Result<Self> {
        Ok(Self {
            resolver: HostResolver::new(),
            prober: PortProber::new(),
            http: HttpChecker::new()?,
            cert: CertChecker::new(),
            config,
            dispatcher,
        })
    }

    /// Run cycles forever; the caller drops this future to shut down.
    pub async fn run(&self) -> Result<()> {
        loop {
            let report = self.run_cycle().await;

            if report.is_empty() {
                info!("all checks passed");
            } else {
                warn!(report = %report.summary(), "cycle found failures");
                if let Err(e) = self.dispatcher.dispatch(&self.config.website, &report).await {
                    warn!(error = %e, "alert delivery failed");
                }
            }

            sleep(cycle_delay(&report)).await;
        }
    }

    /// One pass of resolve, probe ports, check status, check certificate.
    ///
    /// Every stage runs each cycle; the port probe alone is skipped when
    /// resolution fails, since there is no address to probe.
    async fn run_cycle(&self) -> CycleReport {
        let website = &self.config.website;
        let mut report = CycleReport::new();

        match self.resolver.resolve(website).await {
            Ok(addr) => {
                let failed = self.prober.probe(addr, &self.config.ports).await;
                report.note_down_ports(failed);
            }
            Err(e) => {
                error!(%website, error = %e, "host resolution failed");
                report.note_resolution_error(e.to_string());
            }
        }

        match self.http.status(website).await {
            Ok(code) => report.note_status(code),
            Err(e) => {
                warn!(%website, error = %e, "status check failed");
                report.note_status_error(e.to_string());
            }
        }

        match self.cert.is_expired(website).await {
            Ok(expired) => report.note_cert_expired(expired),
            Err(e) => {
                warn!(%website, error = %e, "certificate check failed");
                report.note_cert_error(e.to_string());
            }
        }

        report
    }
}

/// 30 seconds after a failing cycle, 60 after a healthy one.
fn cycle_delay(report: &CycleReport) -> Duration {
    if report.is_empty() {
        HEALTHY_DELAY
    } else {
        FAILURE_DELAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_cycle_waits_sixty_seconds() {
        assert_eq!(cycle_delay(&CycleReport::new()), Duration::from_secs(60));
    }

    #[test]
    fn failing_cycle_waits_thirty_seconds() {
        let mut report = CycleReport::new();
        report.note_down_ports(vec![81]);
        assert_eq!(cycle_delay(&report), Duration::from_secs(30));
    }
}
