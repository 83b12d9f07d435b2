// src/core/scanner/arguments.rs

//! Turns a tool and the widget's options bag into the argument string the
//! remote execution service passes to that tool.
//!
//! Values are concatenated as-is. Nothing here quotes or escapes them: the
//! remote executor is the trust boundary and must not hand the string to a shell.

use crate::config::FormatterDefaults;
use crate::core::models::{CustomHeaders, ScanOptions, Tool, ToolInvocation};
use serde_json::Value;
use tracing::debug;

/// Options a tool may map onto one of its own flags.
#[derive(Debug, Clone, Copy)]
enum OptionKey {
    Threads,
    Timeout,
    Ports,
    Port,
    Resolver,
}

impl OptionKey {
    fn value(self, options: &ScanOptions) -> Option<&str> {
        match self {
            OptionKey::Threads => options.threads.as_deref(),
            OptionKey::Timeout => options.timeout.as_deref(),
            OptionKey::Ports => options.ports.as_deref(),
            OptionKey::Port => options.port.as_deref(),
            OptionKey::Resolver => options.resolver.as_deref(),
        }
    }
}

/// How one tool expects to be invoked.
struct ToolRule {
    /// Leading tokens; `{target}` is replaced by the literal target.
    target: &'static str,
    options: &'static [(OptionKey, &'static str)],
    /// Whether the tool needs `-w <wordlist>`, falling back to the configured default.
    wordlist: bool,
    always: &'static [&'static str],
}

static SUBFINDER: ToolRule = ToolRule {
    target: "-d {target}",
    options: &[(OptionKey::Threads, "-t"), (OptionKey::Timeout, "-timeout")],
    wordlist: false,
    always: &["-silent"],
};

static NAABU: ToolRule = ToolRule {
    target: "-host {target}",
    options: &[(OptionKey::Ports, "-p"), (OptionKey::Threads, "-c")],
    wordlist: false,
    always: &["-silent"],
};

static HTTPX: ToolRule = ToolRule {
    target: "-u {target}",
    options: &[(OptionKey::Threads, "-threads")],
    wordlist: false,
    always: &["-silent", "-json"],
};

static CDNCHECK: ToolRule = ToolRule {
    target: "-domain {target}",
    options: &[(OptionKey::Resolver, "-resolver")],
    wordlist: false,
    always: &[],
};

static TLSX: ToolRule = ToolRule {
    target: "-u {target}",
    options: &[
        (OptionKey::Port, "-p"),
        (OptionKey::Threads, "-c"),
        (OptionKey::Resolver, "-resolver"),
    ],
    wordlist: false,
    always: &["-silent", "-json"],
};

static FFUF: ToolRule = ToolRule {
    target: "-u {target}/FUZZ",
    options: &[(OptionKey::Threads, "-t")],
    wordlist: true,
    always: &["-s"],
};

static GOBUSTER: ToolRule = ToolRule {
    target: "dir -u {target}",
    options: &[(OptionKey::Threads, "-t")],
    wordlist: true,
    always: &["-q"],
};

static DNSX: ToolRule = ToolRule {
    target: "-d {target}",
    options: &[(OptionKey::Threads, "-t"), (OptionKey::Resolver, "-r")],
    wordlist: false,
    always: &["-silent", "-json"],
};

static NUCLEI: ToolRule = ToolRule {
    target: "-u {target}",
    options: &[(OptionKey::Threads, "-c")],
    wordlist: false,
    always: &["-silent", "-json"],
};

fn rule_for(tool: Tool) -> &'static ToolRule {
    match tool {
        Tool::Subfinder => &SUBFINDER,
        Tool::Naabu => &NAABU,
        Tool::Httpx => &HTTPX,
        Tool::Cdncheck => &CDNCHECK,
        Tool::Tlsx => &TLSX,
        Tool::Ffuf => &FFUF,
        Tool::Gobuster => &GOBUSTER,
        Tool::Dnsx => &DNSX,
        Tool::Nuclei => &NUCLEI,
    }
}

/// Builds the invocation for `tool` against `target`.
///
/// Tool-specific flags come first, then the cross-cutting `--headers`,
/// `--userAgent` and `--timeout` flags when the corresponding option is set.
/// `headers` must already be validated; the raw `options.headers` value is
/// never read here.
pub fn format_arguments(
    tool: Tool,
    target: &str,
    options: &ScanOptions,
    headers: Option<&CustomHeaders>,
    defaults: &FormatterDefaults,
) -> ToolInvocation {
    let rule = rule_for(tool);
    let mut tokens: Vec<String> = vec![rule.target.replace("{target}", target)];

    for (key, flag) in rule.options {
        if let Some(value) = key.value(options) {
            tokens.push(format!("{flag} {value}"));
        }
    }

    if rule.wordlist {
        let wordlist = options.wordlist.as_deref().unwrap_or(&defaults.wordlist);
        tokens.push(format!("-w {wordlist}"));
    }

    tokens.extend(rule.always.iter().map(|flag| flag.to_string()));

    if let Some(headers) = headers {
        tokens.push(format!("--headers {}", Value::Object(headers.clone())));
    }
    if let Some(user_agent) = options.user_agent.as_deref() {
        tokens.push(format!("--userAgent \"{user_agent}\""));
    }
    if let Some(timeout) = options.timeout.as_deref() {
        tokens.push(format!("--timeout {timeout}"));
    }

    if !options.extra.is_empty() {
        let unused: Vec<&str> = options.extra.keys().map(String::as_str).collect();
        debug!(%tool, ?unused, "Options not mapped to any flag.");
    }

    let args = tokens.join(" ").trim().to_string();
    debug!(%tool, %args, "Formatted tool arguments.");
    ToolInvocation { tool, args }
}
