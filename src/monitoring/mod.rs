//! Health checks for the monitored website.
//!
//! This module is responsible for:
//! - Resolving the target's A record
//! - Probing the configured TCP ports
//! - Checking the HTTP status via a HEAD request
//! - Inspecting the TLS certificate expiry
//! - Aggregating failures into the per-cycle report

pub mod checker;
pub mod report;
pub mod resolver;

pub use checker::{CertChecker, HttpChecker, PortProber};
pub use report::CycleReport;
pub use resolver::HostResolver;
