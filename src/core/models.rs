// src/core/models.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

// --- Core Data Models ---

/// Ordinal severity scale shared by findings and summary counts.
///
/// Variants are declared from least to most severe so the derived `Ord`
/// follows `info < low < medium < high < critical`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// The external command-line tools the remote execution service knows how to run.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
    EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tool {
    Subfinder,
    Naabu,
    Httpx,
    Cdncheck,
    Tlsx,
    Ffuf,
    Gobuster,
    Dnsx,
    Nuclei,
}

/// Logical scan categories offered to the widget, each backed by exactly one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ScanType {
    Subdomain,
    Ports,
    Http,
    Cdn,
    Ssl,
    Fuzz,
    Dir,
    Dns,
}

impl ScanType {
    pub fn tool(self) -> Tool {
        match self {
            ScanType::Subdomain => Tool::Subfinder,
            ScanType::Ports => Tool::Naabu,
            ScanType::Http => Tool::Httpx,
            ScanType::Cdn => Tool::Cdncheck,
            ScanType::Ssl => Tool::Tlsx,
            ScanType::Fuzz => Tool::Ffuf,
            ScanType::Dir => Tool::Gobuster,
            ScanType::Dns => Tool::Dnsx,
        }
    }
}

/// Resolves a raw scan type string to a tool; anything unrecognised runs subfinder.
pub fn resolve_tool(scan_type: &str) -> Tool {
    scan_type
        .parse::<ScanType>()
        .map(ScanType::tool)
        .unwrap_or(Tool::Subfinder)
}

// --- Inbound Request ---

/// Tuning parameters sent by the widget under `advanced`.
///
/// Scalar values may arrive as JSON numbers or strings. Falsy values
/// (`null`, `false`, `0`, `""`) are treated as if the key were absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanOptions {
    #[serde(rename = "userAgent", deserialize_with = "loose_scalar")]
    pub user_agent: Option<String>,
    #[serde(deserialize_with = "loose_scalar")]
    pub timeout: Option<String>,
    #[serde(deserialize_with = "loose_scalar")]
    pub threads: Option<String>,
    #[serde(deserialize_with = "loose_scalar")]
    pub ports: Option<String>,
    #[serde(deserialize_with = "loose_scalar")]
    pub port: Option<String>,
    #[serde(deserialize_with = "loose_scalar")]
    pub resolver: Option<String>,
    #[serde(deserialize_with = "loose_scalar")]
    pub wordlist: Option<String>,
    /// Either a JSON object or a string holding one; checked by `validation::parse_headers`.
    pub headers: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn loose_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| scalar_to_string(&v)))
}

/// Stringifies a scalar JSON value, returning `None` for falsy or non-scalar values.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// The JSON body posted by the widget.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub target: String,
    #[serde(rename = "scanType", default)]
    pub scan_type: String,
    #[serde(default)]
    pub advanced: Option<ScanOptions>,
}

// --- Remote Execution ---

/// A formatted command line for one tool. Built once, consumed by one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub args: String,
}

/// What the remote execution service reported for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub return_code: Option<i64>,
}

// --- Findings and Results ---

/// One normalized security observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub title: String,
    pub severity: Severity,
    pub description: String,
    pub location: String,
    pub remediation: String,
}

/// A finding as exposed to the widget, numbered in parse order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vulnerability {
    pub id: String,
    pub name: String,
    pub severity: Severity,
    pub description: String,
    pub location: String,
    pub remediation: String,
}

impl Vulnerability {
    pub fn from_finding(index: usize, finding: Finding) -> Self {
        Self {
            id: format!("vuln-{}", index + 1),
            name: finding.title,
            severity: finding.severity,
            description: finding.description,
            location: finding.location,
            remediation: finding.remediation,
        }
    }
}

/// Per-severity counts. Info findings only show up in `total`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ScanSummary {
    pub fn from_vulnerabilities(vulnerabilities: &[Vulnerability]) -> Self {
        let count = |severity: Severity| {
            vulnerabilities
                .iter()
                .filter(|v| v.severity == severity)
                .count()
        };
        Self {
            total: vulnerabilities.len(),
            critical: count(Severity::Critical),
            high: count(Severity::High),
            medium: count(Severity::Medium),
            low: count(Severity::Low),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    pub tool: Tool,
    pub scan_duration: String,
    pub timestamp: String,
}

/// The complete, immutable outcome of one scan request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub target: String,
    pub scan_type: String,
    pub timestamp: String,
    pub vulnerabilities: Vec<Vulnerability>,
    pub summary: ScanSummary,
    pub metadata: ScanMetadata,
    pub raw_output: String,
    pub html_report: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Custom request headers forwarded to the tool, after validation.
pub type CustomHeaders = Map<String, Value>;
