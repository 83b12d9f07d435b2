// src/core/scanner/output_parser.rs

use crate::core::knowledge_base::{service_name, FindingCode};
use crate::core::models::{Finding, Severity, Tool};
use crate::core::scanner::severity::{
    is_vulnerable_tls_version, severity_for_port, severity_for_status_code,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Marker recorded when no scan duration could be extracted.
pub const NOT_AVAILABLE: &str = "N/A";

static RE_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:https?://)?(?:[a-zA-Z0-9](?:[-a-zA-Z0-9]*[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}\b")
        .unwrap()
});
static RE_PORT_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:host|ip|target)[:\s]+([^:\s]+)[:\s]+port[:\s]+(\d+)").unwrap()
});
static RE_HOST_PORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*([A-Za-z0-9][A-Za-z0-9.-]*):(\d{1,5})\s*$").unwrap());
static RE_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)completed in (\d+[.\d]*\s*[a-z]+)").unwrap());

/// Why a decoded record, or the whole output, could not be turned into findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record on line {}: {}", self.line, self.reason)
    }
}

/// A decoded JSON object together with its 1-based line number.
struct Record {
    line: usize,
    fields: Map<String, Value>,
}

impl Record {
    fn diagnostic(&self, reason: impl Into<String>) -> ParseDiagnostic {
        ParseDiagnostic {
            line: self.line,
            reason: reason.into(),
        }
    }

    /// First present, non-null value among `keys`, which must be a string.
    fn text(&self, keys: &[&str]) -> Result<Option<&str>, ParseDiagnostic> {
        for key in keys {
            match self.fields.get(*key) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) if s.is_empty() => continue,
                Some(Value::String(s)) => return Ok(Some(s.as_str())),
                Some(other) => {
                    return Err(self.diagnostic(format!("`{key}` should be a string, got {other}")));
                }
            }
        }
        Ok(None)
    }

    /// A numeric field given as a JSON number or numeric string. Zero counts as absent.
    fn number(&self, keys: &[&str], max: u64) -> Result<Option<u64>, ParseDiagnostic> {
        for key in keys {
            let parsed = match self.fields.get(*key) {
                None | Some(Value::Null) => continue,
                Some(Value::Number(n)) => n.as_u64(),
                Some(Value::String(s)) if s.trim().is_empty() => continue,
                Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
                Some(_) => None,
            };
            return match parsed {
                Some(0) => Ok(None),
                Some(n) if n <= max => Ok(Some(n)),
                _ => Err(self.diagnostic(format!("`{key}` is not a valid number"))),
            };
        }
        Ok(None)
    }
}

/// Decodes every line that holds a JSON object. Anything else is skipped.
fn json_records(output: &str) -> Vec<Record> {
    output
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str::<Value>(line.trim()) {
            Ok(Value::Object(fields)) => Some(Record {
                line: index + 1,
                fields,
            }),
            _ => None,
        })
        .collect()
}

/// Applies `per_record` to each record. A record that fails is logged and
/// skipped so it cannot take the valid ones down with it; the parse only
/// fails when every record was rejected.
fn collect_records<F>(
    tool: Tool,
    records: &[Record],
    mut per_record: F,
) -> Result<Vec<Finding>, ParseDiagnostic>
where
    F: FnMut(&Record) -> Result<Vec<Finding>, ParseDiagnostic>,
{
    let mut findings = Vec::new();
    let mut accepted = 0usize;
    let mut first_rejected = None;
    for record in records {
        match per_record(record) {
            Ok(found) => {
                accepted += 1;
                findings.extend(found);
            }
            Err(diagnostic) => {
                warn!(%tool, %diagnostic, "Skipping malformed record.");
                first_rejected.get_or_insert(diagnostic);
            }
        }
    }
    match first_rejected {
        Some(diagnostic) if accepted == 0 => Err(diagnostic),
        _ => Ok(findings),
    }
}

fn finding(
    code: FindingCode,
    title: String,
    severity: Severity,
    description: String,
    location: String,
) -> Finding {
    Finding {
        title,
        severity,
        description,
        location,
        remediation: code.detail().remediation.to_string(),
    }
}

/// Converts raw tool output into findings.
///
/// Never fails and never returns an empty list: a parse that produces nothing
/// yields a single "No Issues Found" finding, and output whose decoded records
/// are all malformed yields a single "Scan Result" finding.
pub fn parse_scan_output(output: &str, tool: Tool, target: &str) -> Vec<Finding> {
    match parse_findings(output, tool, target) {
        Ok(findings) if findings.is_empty() => {
            debug!(%tool, "Parser produced no findings.");
            vec![no_issues(tool, target)]
        }
        Ok(findings) => {
            info!(%tool, findings = %findings.len(), "Parsed tool output.");
            findings
        }
        Err(diagnostic) => {
            warn!(%tool, %diagnostic, "Unable to parse tool output.");
            vec![unparseable(target)]
        }
    }
}

/// Tool-specific parsing. An empty `Ok` means the output held nothing of interest.
pub fn parse_findings(
    output: &str,
    tool: Tool,
    target: &str,
) -> Result<Vec<Finding>, ParseDiagnostic> {
    match tool {
        Tool::Subfinder => parse_subfinder(output),
        Tool::Naabu => parse_naabu(output, target),
        Tool::Httpx => parse_httpx(output, target),
        Tool::Tlsx => parse_tlsx(output, target),
        Tool::Cdncheck | Tool::Ffuf | Tool::Gobuster | Tool::Dnsx | Tool::Nuclei => {
            if has_text(output) {
                Ok(vec![tool_completed(tool.as_ref(), target)])
            } else {
                Ok(Vec::new())
            }
        }
    }
}

fn has_text(output: &str) -> bool {
    !output.trim().is_empty()
}

fn subdomain_finding(subdomain: &str) -> Finding {
    let code = FindingCode::SubdomainDiscovered;
    finding(
        code,
        code.detail().title.to_string(),
        Severity::Info,
        format!("Found subdomain: {subdomain}"),
        subdomain.to_string(),
    )
}

fn parse_subfinder(output: &str) -> Result<Vec<Finding>, ParseDiagnostic> {
    let records = json_records(output);
    if !records.is_empty() {
        return collect_records(Tool::Subfinder, &records, |record| {
            Ok(record
                .text(&["host", "subdomain"])?
                .map(subdomain_finding)
                .into_iter()
                .collect())
        });
    }

    debug!("No JSON in subfinder output, falling back to hostname extraction.");
    let mut seen = HashSet::new();
    Ok(RE_SUBDOMAIN
        .find_iter(output)
        .map(|m| m.as_str())
        .filter(|subdomain| seen.insert(*subdomain))
        .map(subdomain_finding)
        .collect())
}

fn open_port_finding(host: &str, port: u16) -> Finding {
    let code = FindingCode::OpenPort;
    finding(
        code,
        format!("{} {port} ({})", code.detail().title, service_name(port)),
        severity_for_port(port),
        format!("Port {port} is open on {host}"),
        format!("{host}:{port}"),
    )
}

fn parse_naabu(output: &str, target: &str) -> Result<Vec<Finding>, ParseDiagnostic> {
    let records = json_records(output);
    if !records.is_empty() {
        return collect_records(Tool::Naabu, &records, |record| {
            let Some(port) = record.number(&["port"], u64::from(u16::MAX))? else {
                return Ok(Vec::new());
            };
            let host = record.text(&["host", "ip"])?.unwrap_or(target);
            // `number` caps the value at u16::MAX.
            Ok(vec![open_port_finding(host, port as u16)])
        });
    }

    debug!("No JSON in naabu output, falling back to host/port patterns.");
    let phrased = RE_PORT_PHRASE.captures_iter(output);
    let bare = RE_HOST_PORT_LINE.captures_iter(output);
    Ok(phrased
        .chain(bare)
        .filter_map(|caps| {
            let host = caps.get(1)?.as_str();
            let port = caps.get(2)?.as_str().parse::<u16>().ok()?;
            (port != 0).then(|| open_port_finding(host, port))
        })
        .collect())
}

fn unrecognised_format(code: FindingCode, what: &str, target: &str) -> Finding {
    finding(
        code,
        code.detail().title.to_string(),
        Severity::Info,
        format!("{what} analysis results (raw format not recognized)"),
        target.to_string(),
    )
}

fn technologies(record: &Record) -> String {
    let value = record
        .fields
        .get("technologies")
        .or_else(|| record.fields.get("tech"));
    let joined = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    if joined.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        joined
    }
}

fn parse_httpx(output: &str, target: &str) -> Result<Vec<Finding>, ParseDiagnostic> {
    let records = json_records(output);
    if records.is_empty() {
        return Ok(if has_text(output) {
            debug!("httpx output is not JSON.");
            vec![unrecognised_format(FindingCode::HttpUnrecognised, "HTTP service", target)]
        } else {
            Vec::new()
        });
    }

    let code = FindingCode::HttpService;
    collect_records(Tool::Httpx, &records, |record| {
        let Some(url) = record.text(&["url"])? else {
            return Ok(Vec::new());
        };
        let status = record
            .number(&["status_code", "status-code"], 999)?
            .map(|n| n as u16);
        let title = record.text(&["title"])?.unwrap_or(NOT_AVAILABLE);
        let server = record.text(&["server", "webserver"])?.unwrap_or(NOT_AVAILABLE);

        Ok(vec![finding(
            code,
            format!(
                "{}: {}",
                code.detail().title,
                status.map_or_else(|| "Unknown".to_string(), |s| s.to_string())
            ),
            severity_for_status_code(status),
            format!(
                "Found HTTP service at {url}\nTitle: {title}\nTechnologies: {}\nServer: {server}",
                technologies(record)
            ),
            url.to_string(),
        )])
    })
}

fn parse_tlsx(output: &str, target: &str) -> Result<Vec<Finding>, ParseDiagnostic> {
    let records = json_records(output);
    if records.is_empty() {
        return Ok(if has_text(output) {
            debug!("tlsx output is not JSON.");
            vec![unrecognised_format(FindingCode::TlsUnrecognised, "SSL/TLS", target)]
        } else {
            Vec::new()
        });
    }

    collect_records(Tool::Tlsx, &records, |record| {
        let Some(host) = record.text(&["host"])? else {
            return Ok(Vec::new());
        };
        let version = record.text(&["tls_version"])?;
        let cipher = record.text(&["cipher"])?.unwrap_or("Unknown");

        let code = FindingCode::TlsConfiguration;
        let mut findings = vec![finding(
            code,
            code.detail().title.to_string(),
            Severity::Medium,
            format!(
                "SSL/TLS details for {host}\nVersion: {}\nCipher: {cipher}",
                version.unwrap_or("Unknown")
            ),
            host.to_string(),
        )];

        if let Some(version) = version.filter(|v| is_vulnerable_tls_version(v)) {
            debug!(host, version, "Outdated protocol version detected.");
            let code = FindingCode::TlsVulnerableVersion;
            findings.push(finding(
                code,
                code.detail().title.to_string(),
                Severity::Critical,
                format!("Outdated TLS version detected: {version}"),
                host.to_string(),
            ));
        }
        Ok(findings)
    })
}

/// `"some_tool"` -> `"Some tool"`.
fn humanize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('_', " "),
        None => String::new(),
    }
}

fn tool_completed(tool_name: &str, target: &str) -> Finding {
    let code = FindingCode::ToolCompleted;
    finding(
        code,
        format!("{} {}", humanize(tool_name), code.detail().title),
        Severity::Info,
        format!("Scan completed for {target}"),
        target.to_string(),
    )
}

fn no_issues(tool: Tool, target: &str) -> Finding {
    let code = FindingCode::NoIssues;
    finding(
        code,
        code.detail().title.to_string(),
        Severity::Info,
        format!("No issues were found in the {tool} scan"),
        target.to_string(),
    )
}

fn unparseable(target: &str) -> Finding {
    let code = FindingCode::Unparseable;
    finding(
        code,
        code.detail().title.to_string(),
        Severity::Info,
        "Unable to parse scan results automatically".to_string(),
        target.to_string(),
    )
}

/// Best-effort "completed in <n><unit>" extraction from raw output.
pub fn extract_scan_duration(output: &str) -> Option<String> {
    RE_DURATION
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
