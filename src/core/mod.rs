// src/core/mod.rs

/// Data structures shared across the pipeline: requests, findings, results.
pub mod models;

/// Argument formatting, remote execution, output parsing and severity rules.
pub mod scanner;

/// Titles and remediation advice for every finding the parser can emit,
/// plus the port-to-service lookup.
pub mod knowledge_base;

/// Target and custom-header checks performed before any remote call.
pub mod validation;

/// HTML rendering of a finished scan.
pub mod report;
