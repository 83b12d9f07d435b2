// src/core/scanner/mod.rs

// The scan pipeline: format arguments, run the tool remotely, parse its output.
pub mod arguments;
pub mod output_parser;
pub mod remote;
pub mod severity;

use crate::config::{FormatterDefaults, Settings};
use crate::core::models::{
    resolve_tool, ScanMetadata, ScanOptions, ScanResult, ScanSummary, Vulnerability,
};
use crate::core::report::generate_html_report;
use crate::core::validation::{custom_headers, Target};
use crate::error::ScanError;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use self::arguments::format_arguments;
use self::output_parser::{extract_scan_duration, parse_scan_output, NOT_AVAILABLE};
use self::remote::RemoteClient;

/// Runs single-tool scans. Holds no per-scan state, so one instance serves
/// any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct Scanner {
    remote: RemoteClient,
    defaults: FormatterDefaults,
}

impl Scanner {
    pub fn new(settings: &Settings) -> Result<Self, ScanError> {
        Ok(Self {
            remote: RemoteClient::new(settings)?,
            defaults: settings.formatter.clone(),
        })
    }

    /// Executes one scan end to end.
    ///
    /// Only the remote call can fail; everything after it is infallible.
    ///
    /// # Arguments
    /// * `target` - An already validated scan target.
    /// * `scan_type` - The widget's scan type; unknown values run subfinder.
    /// * `auth_token` - Opaque bearer token forwarded to the execution service.
    /// * `options` - Tuning parameters from the request's `advanced` block.
    pub async fn run_scan(
        &self,
        target: &Target,
        scan_type: &str,
        auth_token: Option<&str>,
        options: &ScanOptions,
    ) -> Result<ScanResult, ScanError> {
        let headers = custom_headers(options.headers.as_ref())?;

        let tool = resolve_tool(scan_type);
        info!(%target, scan_type, %tool, "Starting scan.");

        let invocation = format_arguments(
            tool,
            target.as_str(),
            options,
            headers.as_ref(),
            &self.defaults,
        );
        let output = self.remote.run(invocation, auth_token).await?;

        let findings = parse_scan_output(&output.stdout, tool, target.as_str());
        let vulnerabilities: Vec<Vulnerability> = findings
            .into_iter()
            .enumerate()
            .map(|(index, finding)| Vulnerability::from_finding(index, finding))
            .collect();
        let summary = ScanSummary::from_vulnerabilities(&vulnerabilities);
        debug!(?summary, "Findings summarised.");

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let html_report =
            generate_html_report(&vulnerabilities, &summary, target.as_str(), scan_type);

        info!(%target, %tool, findings = %summary.total, "Scan finished.");
        Ok(ScanResult {
            target: target.to_string(),
            scan_type: scan_type.to_string(),
            timestamp: timestamp.clone(),
            vulnerabilities,
            summary,
            metadata: ScanMetadata {
                tool,
                scan_duration: extract_scan_duration(&output.stdout)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                timestamp,
            },
            raw_output: output.stdout,
            html_report,
        })
    }
}
