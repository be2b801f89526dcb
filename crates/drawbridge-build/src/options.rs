//! Compile options. Maps are ordered so the serialized form, and therefore
//! the signature, does not depend on insertion order.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Build with threading support (`STAN_THREADS=true`).
    pub threads: bool,
    /// Run the translator's pedantic checks; findings are warnings only.
    pub pedantic: bool,
    pub include_paths: Vec<PathBuf>,
    /// Extra translator flags, `--key=value` (or `--key` for an empty value).
    pub translator_flags: BTreeMap<String, String>,
    /// Extra `make` variables, `KEY=value`.
    pub build_flags: BTreeMap<String, String>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, on: bool) -> Self {
        self.threads = on;
        self
    }

    pub fn with_pedantic(mut self, on: bool) -> Self {
        self.pedantic = on;
        self
    }

    pub fn with_include_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_paths.push(dir.into());
        self
    }

    pub fn with_translator_flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.translator_flags.insert(key.into(), value.into());
        self
    }

    pub fn with_build_flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_flags.insert(key.into(), value.into());
        self
    }

    /// Translator arguments for these options (source path not included).
    pub fn translator_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.pedantic {
            args.push("--warn-pedantic".to_string());
        }
        if !self.include_paths.is_empty() {
            let joined: Vec<String> = self
                .include_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            args.push(format!("--include-paths={}", joined.join(",")));
        }
        for (k, v) in &self.translator_flags {
            let k = k.trim_start_matches('-');
            if v.is_empty() {
                args.push(format!("--{k}"));
            } else {
                args.push(format!("--{k}={v}"));
            }
        }
        args
    }

    /// `make` variable assignments for these options.
    pub fn make_vars(&self) -> Vec<String> {
        let mut vars = Vec::new();
        if self.threads {
            vars.push("STAN_THREADS=true".to_string());
        }
        for (k, v) in &self.build_flags {
            vars.push(format!("{k}={v}"));
        }
        vars
    }
}
