//! Translator output → structured diagnostics.
//!
//! The translator prints one block per finding, starting with a line such as
//! `Syntax error in 'm.stan', line 3, column 4 to column 5, parsing error:` or
//! `Warning in 'm.stan', line 7, column 2: ...`. Everything up to the next
//! block start belongs to the same finding.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match (self.line, self.column) {
            (Some(l), Some(c)) => write!(f, "{kind} at {l}:{c}: {}", self.message),
            (Some(l), None) => write!(f, "{kind} at line {l}: {}", self.message),
            _ => write!(f, "{kind}: {}", self.message),
        }
    }
}

pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let mut current: Option<(Severity, Vec<&str>)> = None;

    for line in output.lines() {
        if let Some(severity) = block_start(line) {
            if let Some((sev, lines)) = current.take() {
                out.push(finish(sev, &lines));
            }
            current = Some((severity, vec![line]));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some((sev, lines)) = current {
        out.push(finish(sev, &lines));
    }
    out
}

fn block_start(line: &str) -> Option<Severity> {
    let t = line.trim_start();
    if t.starts_with("Syntax error")
        || t.starts_with("Semantic error")
        || t.starts_with("Error")
        || t.starts_with("error")
    {
        Some(Severity::Error)
    } else if t.starts_with("Warning") || t.starts_with("Info") {
        Some(Severity::Warning)
    } else {
        None
    }
}

fn finish(severity: Severity, lines: &[&str]) -> Diagnostic {
    let head = lines.first().copied().unwrap_or_default();
    Diagnostic {
        severity,
        message: lines.join("\n").trim().to_string(),
        line: number_after(head, "line "),
        column: number_after(head, "column "),
    }
}

fn number_after(text: &str, key: &str) -> Option<u32> {
    let start = text.find(key)? + key.len();
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
