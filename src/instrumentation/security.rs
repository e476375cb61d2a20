//! Signature-based detection of hostile request content.

use regex::Regex;
use serde_json::json;

use crate::events::EventEmitter;
use crate::instrumentation::chain::RequestObserver;
use crate::instrumentation::context::RequestContext;
use crate::instrumentation::ObserverError;
use crate::observability::metrics;

/// Signatures in evaluation order.
const SIGNATURES: [(&str, &str); 5] = [
    (r"\.\./", "path_traversal"),
    (r"(?i)<script>", "script_injection"),
    (r"(?i)union\s+select", "sql_injection"),
    (r"(?i)alert\(", "script_alert"),
    (r"(?i)document\.cookie", "cookie_theft"),
];

#[derive(Debug, Clone)]
pub struct SecurityPattern {
    regex: Regex,
    pub category: &'static str,
}

impl SecurityPattern {
    pub fn source(&self) -> &str {
        self.regex.as_str()
    }
}

/// Part of the request a signature matched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Url,
    Body,
    Query,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Url => "url",
            Surface::Body => "body",
            Surface::Query => "query",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThreatMatch<'a> {
    pub pattern: &'a SecurityPattern,
    pub surface: Surface,
}

/// Tests url, serialized body and serialized query against each signature
/// in order and reports the first hit only.
pub struct SecurityScanner {
    patterns: Vec<SecurityPattern>,
}

impl SecurityScanner {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = SIGNATURES
            .iter()
            .map(|&(source, category)| {
                Ok(SecurityPattern {
                    regex: Regex::new(source)?,
                    category,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[SecurityPattern] {
        &self.patterns
    }

    pub fn scan(&self, url: &str, body: &str, query: &str) -> Option<ThreatMatch<'_>> {
        self.patterns.iter().find_map(|pattern| {
            let surface = if pattern.regex.is_match(url) {
                Surface::Url
            } else if pattern.regex.is_match(body) {
                Surface::Body
            } else if pattern.regex.is_match(query) {
                Surface::Query
            } else {
                return None;
            };
            Some(ThreatMatch { pattern, surface })
        })
    }
}

impl RequestObserver for SecurityScanner {
    fn name(&self) -> &'static str {
        "security_scanner"
    }

    fn observe(&self, ctx: &RequestContext, emitter: &EventEmitter) -> Result<(), ObserverError> {
        let body = ctx.body_text();
        let query = ctx.query_text();

        if let Some(threat) = self.scan(&ctx.url, &body, &query) {
            emitter.error(
                "Security Threat Detected",
                json!({
                    "type": "suspicious_pattern",
                    "category": threat.pattern.category,
                    "surface": threat.surface.as_str(),
                    "ip": ctx.ip,
                    "method": ctx.method,
                    "url": ctx.url,
                    "body": ctx.body,
                    "query": ctx.query,
                    "userAgent": ctx.user_agent(),
                    "pattern": threat.pattern.source(),
                    "security": "threat_detected",
                }),
            );
            metrics::record_security_threat(threat.pattern.category);
        }
        Ok(())
    }
}
