//! Comment-line metadata: the configuration block the engine echoes before the
//! header, and the adaptation/timing notes it writes after it.

use drawbridge_core::draws::ChainMetadata;
use drawbridge_core::id::ChainId;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Pending {
    #[default]
    None,
    InvMetric,
}

#[derive(Debug, Default)]
pub(crate) struct MetadataBuilder {
    meta: ChainMetadata,
    section: Option<String>,
    pending: Pending,
}

impl MetadataBuilder {
    /// A `# key = value` line (or a bare section heading) before the header.
    pub(crate) fn preamble(&mut self, line: &str) {
        let body = strip_comment(line);
        if body.is_empty() {
            return;
        }
        let Some((key, value)) = body.split_once('=') else {
            // e.g. "  adapt" or "output": headings for the keys that follow
            self.section = Some(body.to_string());
            return;
        };
        let key = key.trim().to_string();
        let value = clean_value(value);
        if key.is_empty() {
            return;
        }
        if let Some(section) = &self.section {
            self.meta
                .config
                .insert(format!("{section}.{key}"), value.clone());
        }
        if key == "id" && self.meta.chain_id.is_none() {
            self.meta.chain_id = value.parse::<u64>().ok().map(ChainId::new);
        }
        self.meta.config.entry(key).or_insert(value);
    }

    /// A comment line after the header: adaptation results and timing.
    pub(crate) fn trailing(&mut self, line: &str) {
        let body = strip_comment(line);
        if self.pending == Pending::InvMetric {
            let values: Option<Vec<f64>> = body
                .split(',')
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(|t| t.parse::<f64>().ok())
                .collect();
            match values {
                Some(v) if !v.is_empty() => {
                    self.meta.inv_metric.extend(v);
                    return;
                }
                _ => self.pending = Pending::None,
            }
        }

        let lower = body.to_ascii_lowercase();
        if let Some((_, value)) = body.split_once('=').filter(|_| lower.starts_with("step size")) {
            self.meta.step_size = value.trim().parse().ok();
        } else if lower.contains("inverse mass matrix") || lower.contains("inverse metric") {
            self.pending = Pending::InvMetric;
        } else if lower.contains("seconds (warm-up)") {
            self.meta.warmup_seconds = seconds(body);
        } else if lower.contains("seconds (sampling)") {
            self.meta.sampling_seconds = seconds(body);
        }
    }

    pub(crate) fn finish(self) -> ChainMetadata {
        self.meta
    }
}

fn strip_comment(line: &str) -> &str {
    line.trim_start().trim_start_matches('#').trim()
}

/// Drop the trailing ` (Default)` marker the engine appends to unset options.
fn clean_value(value: &str) -> String {
    let v = value.trim();
    v.strip_suffix("(Default)").unwrap_or(v).trim().to_string()
}

/// The number immediately before the word "seconds".
fn seconds(body: &str) -> Option<f64> {
    let before = &body[..body.to_ascii_lowercase().find("seconds")?];
    before.split_whitespace().last()?.parse().ok()
}
