// src/core/scanner/severity.rs

use crate::core::models::Severity;

/// Remote-administration and database ports.
const HIGH_RISK_PORTS: &[u16] = &[21, 22, 23, 3389, 3306, 1433, 5432];
/// Web ports, exposed on purpose more often than not.
const WEB_PORTS: &[u16] = &[80, 443, 8080, 8443];
/// Protocol versions with known practical attacks.
const VULNERABLE_TLS_VERSIONS: &[&str] = &["TLS 1.0", "SSL 3.0", "SSL 2.0"];

pub fn severity_for_port(port: u16) -> Severity {
    if HIGH_RISK_PORTS.contains(&port) {
        Severity::High
    } else if WEB_PORTS.contains(&port) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Maps an HTTP status code to a severity. A missing or zero code is `Info`.
pub fn severity_for_status_code(status_code: Option<u16>) -> Severity {
    match status_code {
        Some(code) if code >= 500 => Severity::High,
        Some(code) if code >= 400 => Severity::Medium,
        Some(code) if code >= 300 => Severity::Low,
        _ => Severity::Info,
    }
}

pub fn is_vulnerable_tls_version(version: &str) -> bool {
    VULNERABLE_TLS_VERSIONS.contains(&version)
}
