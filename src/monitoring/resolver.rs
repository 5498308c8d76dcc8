use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tracing::debug;

use crate::error::{MonitorError, Result};

/// DNS is typically fast; anything slower points at network trouble.
const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves the monitored host's A record.
pub struct HostResolver {
    resolver: TokioAsyncResolver,
}

impl Default for HostResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HostResolver {
    pub fn new() -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = DNS_TIMEOUT;
        opts.attempts = 2;

        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }

    /// Resolve `host` and return the first A record.
    pub async fn resolve(&self, host: &str) -> Result<IpAddr> {
        let lookup = self
            .resolver
            .ipv4_lookup(host)
            .await
            .map_err(|e| MonitorError::Resolution(e.to_string()))?;

        let first = lookup
            .iter()
            .next()
            .ok_or_else(|| MonitorError::Resolution(format!("no A records for {host}")))?;

        debug!(host, ip = %first.0, "resolved A record");
        Ok(IpAddr::V4(first.0))
    }
}
