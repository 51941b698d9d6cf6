//! Tenant references extracted from bank statement descriptions.
//!
//! Rules are tried in order and the first match wins. A description no rule
//! recognises yields `None`; the caller routes such rows to manual review.

use crate::errors::{Error, Result};
use regex::Regex;

/// What a rule extracted from a description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReference {
    /// Tenant code, upper-cased
    TenantCode(String),
    /// Free-text payer name
    TenantName(String),
}

impl ParsedReference {
    /// Text stored on the bank transaction for audit.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TenantCode(code) | Self::TenantName(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Extract {
    Code,
    Name,
}

#[derive(Debug)]
struct Rule {
    name: &'static str,
    pattern: Regex,
    extract: Extract,
}

const CODE: &str = r"[A-Za-z]{1,4}-?\d{2,}";

/// Ordered pattern rules.
#[derive(Debug)]
pub struct ReferenceParser {
    rules: Vec<Rule>,
}

impl ReferenceParser {
    /// Compiles the built-in rules.
    pub fn new() -> Result<Self> {
        let definitions: [(&'static str, String, Extract); 5] = [
            ("tenant-code", format!(r"(?i)\btenant[\s:#-]*({CODE})\b"), Extract::Code),
            ("ref-code", format!(r"(?i)\bref(?:erence)?[\s:#.-]*({CODE})\b"), Extract::Code),
            ("code-rent", format!(r"(?i)\b({CODE})[\s-]*rent\b"), Extract::Code),
            ("rent-from", r"(?i)\brent\s+from\s+([A-Za-z][A-Za-z .'-]*[A-Za-z])".to_string(), Extract::Name),
            ("payment-from", r"(?i)\bpayment\s+from\s+([A-Za-z][A-Za-z .'-]*[A-Za-z])".to_string(), Extract::Name),
        ];

        let rules = definitions
            .into_iter()
            .map(|(name, pattern, extract)| {
                Regex::new(&pattern)
                    .map(|pattern| Rule { name, pattern, extract })
                    .map_err(|e| Error::Config {
                        message: format!("Reference rule '{name}' does not compile: {e}"),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// First reference any rule finds in `description`.
    #[must_use]
    pub fn parse(&self, description: &str) -> Option<ParsedReference> {
        self.rules.iter().find_map(|rule| {
            let captured = rule.pattern.captures(description)?.get(1)?.as_str().trim();
            if captured.is_empty() {
                return None;
            }
            tracing::trace!("Rule {} matched '{}'", rule.name, captured);
            Some(match rule.extract {
                Extract::Code => ParsedReference::TenantCode(normalize_code(captured)),
                Extract::Name => ParsedReference::TenantName(captured.to_string()),
            })
        })
    }
}

/// Codes are compared upper-cased (`t1001` -> `T1001`).
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
