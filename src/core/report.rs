// src/core/report.rs

use crate::core::models::{ScanSummary, Vulnerability};
use chrono::Local;
use std::fmt::Write;

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Renders the downloadable "Security Audit Report" fragment.
pub fn generate_html_report(
    vulnerabilities: &[Vulnerability],
    summary: &ScanSummary,
    target: &str,
    scan_type: &str,
) -> String {
    let mut findings_html = String::new();
    for v in vulnerabilities {
        // Writing to a String cannot fail.
        let _ = write!(
            findings_html,
            r#"
          <div class="finding {severity}">
            <h3>{name} <span class="severity">({severity})</span></h3>
            <p><strong>Location:</strong> {location}</p>
            <p><strong>Description:</strong> {description}</p>
            <p><strong>Remediation:</strong> {remediation}</p>
          </div>"#,
            severity = v.severity,
            name = escape(&v.name),
            location = escape(&v.location),
            description = escape(&v.description),
            remediation = escape(&v.remediation),
        );
    }

    format!(
        r#"
    <div class="security-report">
      <h1>Security Audit Report</h1>
      <div class="report-metadata">
        <p><strong>Target:</strong> {target}</p>
        <p><strong>Scan Type:</strong> {scan_type}</p>
        <p><strong>Date:</strong> {date}</p>
      </div>

      <div class="summary-section">
        <h2>Summary</h2>
        <ul>
          <li>Total Findings: {total}</li>
          <li>Critical: {critical}</li>
          <li>High: {high}</li>
          <li>Medium: {medium}</li>
          <li>Low: {low}</li>
        </ul>
      </div>

      <div class="findings-section">
        <h2>Detailed Findings</h2>{findings_html}
      </div>
    </div>
"#,
        target = escape(target),
        scan_type = escape(scan_type),
        date = Local::now().format("%Y-%m-%d %H:%M:%S"),
        total = summary.total,
        critical = summary.critical,
        high = summary.high,
        medium = summary.medium,
        low = summary.low,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Severity;

    #[test]
    fn report_lists_summary_and_escapes_tool_text() {
        let vulns = vec![Vulnerability {
            id: "vuln-1".into(),
            name: "HTTP Service: 200".into(),
            severity: Severity::Info,
            description: "Title: <script>alert(1)</script>".into(),
            location: "https://example.com/?a=1&b=2".into(),
            remediation: "Review".into(),
        }];
        let summary = ScanSummary::from_vulnerabilities(&vulns);
        let html = generate_html_report(&vulns, &summary, "example.com", "http");

        assert!(html.contains("<h1>Security Audit Report</h1>"));
        assert!(html.contains("<li>Total Findings: 1</li>"));
        assert!(html.contains("<div class=\"finding info\">"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("?a=1&amp;b=2"));
        assert!(!html.contains("<script>"));
    }
}
