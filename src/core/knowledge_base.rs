//! Static, read-only catalogue of every kind of finding the output parser can
//! emit, with the human-readable title and remediation advice shown in the
//! widget and the HTML report. Keeping the text here lets the parser stay a
//! pure mapping from tool records to finding codes.

/// Identifies one entry of the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingCode {
    SubdomainDiscovered,
    OpenPort,
    HttpService,
    HttpUnrecognised,
    TlsConfiguration,
    TlsVulnerableVersion,
    TlsUnrecognised,
    ToolCompleted,
    NoIssues,
    Unparseable,
}

/// The fixed text attached to a finding code.
pub struct FindingDetail {
    /// Base title; some parsers decorate it with the port or status code.
    pub title: &'static str,
    /// Clear, actionable steps the user can take.
    pub remediation: &'static str,
}

static SUBDOMAIN_DISCOVERED: FindingDetail = FindingDetail {
    title: "Subdomain Discovery",
    remediation: "Ensure all subdomains have proper security controls",
};

static OPEN_PORT: FindingDetail = FindingDetail {
    title: "Open Port",
    remediation: "Close unnecessary ports or apply proper firewall rules",
};

static HTTP_SERVICE: FindingDetail = FindingDetail {
    title: "HTTP Service",
    remediation: "Secure HTTP services with proper headers and encryption",
};

static HTTP_UNRECOGNISED: FindingDetail = FindingDetail {
    title: "HTTP Service Analysis",
    remediation: "Review raw output for details",
};

static TLS_CONFIGURATION: FindingDetail = FindingDetail {
    title: "SSL/TLS Configuration",
    remediation: "Ensure strong TLS versions (TLS 1.2+) and secure cipher suites",
};

static TLS_VULNERABLE_VERSION: FindingDetail = FindingDetail {
    title: "Vulnerable TLS Version",
    remediation: "Disable outdated TLS versions (TLS 1.0, SSL 3.0, SSL 2.0) and use TLS 1.2+ only",
};

static TLS_UNRECOGNISED: FindingDetail = FindingDetail {
    title: "SSL/TLS Analysis",
    remediation: "Review raw output for details",
};

static TOOL_COMPLETED: FindingDetail = FindingDetail {
    title: "Results",
    remediation: "Review raw output for details",
};

static NO_ISSUES: FindingDetail = FindingDetail {
    title: "No Issues Found",
    remediation: "No action needed",
};

static UNPARSEABLE: FindingDetail = FindingDetail {
    title: "Scan Result",
    remediation: "Review raw output for details",
};

impl FindingCode {
    pub fn detail(self) -> &'static FindingDetail {
        match self {
            FindingCode::SubdomainDiscovered => &SUBDOMAIN_DISCOVERED,
            FindingCode::OpenPort => &OPEN_PORT,
            FindingCode::HttpService => &HTTP_SERVICE,
            FindingCode::HttpUnrecognised => &HTTP_UNRECOGNISED,
            FindingCode::TlsConfiguration => &TLS_CONFIGURATION,
            FindingCode::TlsVulnerableVersion => &TLS_VULNERABLE_VERSION,
            FindingCode::TlsUnrecognised => &TLS_UNRECOGNISED,
            FindingCode::ToolCompleted => &TOOL_COMPLETED,
            FindingCode::NoIssues => &NO_ISSUES,
            FindingCode::Unparseable => &UNPARSEABLE,
        }
    }
}

/// Well-known services by port number.
static PORT_SERVICES: &[(u16, &str)] = &[
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (139, "NetBIOS"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (1433, "MSSQL"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (8080, "HTTP-Proxy"),
    (8443, "HTTPS-Alt"),
];

/// Returns the conventional service name for a port, or `"Unknown"`.
pub fn service_name(port: u16) -> &'static str {
    PORT_SERVICES
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}
