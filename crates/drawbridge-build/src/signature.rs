//! Staleness signature and its sidecar record.
//!
//! The record lives next to the executable as `<exe>.signature.json`. It is
//! removed before a rebuilt executable is moved into place and written after,
//! so an interrupted rebuild leaves an executable with no record, which reads
//! as stale.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use drawbridge_core::hash::{hash_serde, Hash256, PartsHasher};

use crate::error::{BuildError, Result};
use crate::options::CompileOptions;

pub fn compute_signature(
    expanded_source: &str,
    options: &CompileOptions,
    tool_version: &str,
) -> Result<Hash256> {
    let opts = hash_serde(options)?;
    Ok(PartsHasher::new()
        .part(expanded_source.as_bytes())
        .part(&opts.0)
        .part(tool_version.trim().as_bytes())
        .finish())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub signature: String,
    pub tool_version: String,
    pub options: CompileOptions,
    pub source: PathBuf,
    pub built_at_ms: u64,
    /// drawbridge release that wrote the record.
    #[serde(default)]
    pub drawbridge_version: String,
}

impl ArtifactRecord {
    pub fn new(
        signature: Hash256,
        tool_version: &str,
        options: &CompileOptions,
        source: &Path,
    ) -> Self {
        let built_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            signature: signature.to_hex(),
            tool_version: tool_version.trim().to_string(),
            options: options.clone(),
            source: source.to_path_buf(),
            built_at_ms,
            drawbridge_version: drawbridge_core::VERSION.to_string(),
        }
    }

    pub fn matches(&self, signature: &Hash256) -> bool {
        Hash256::from_hex(&self.signature).as_ref() == Some(signature)
    }
}

pub fn sidecar_path(executable: &Path) -> PathBuf {
    let mut name = executable
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".signature.json");
    executable.with_file_name(name)
}

/// The recorded signature, or `None` if there is no usable record.
pub fn read_record(executable: &Path) -> Option<ArtifactRecord> {
    let path = sidecar_path(executable);
    let text = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&text) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable signature record");
            None
        }
    }
}

/// Write via a temp file in the same directory, then rename over the target.
pub fn write_record(executable: &Path, record: &ArtifactRecord) -> Result<()> {
    let path = sidecar_path(executable);
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    let json = serde_json::to_vec_pretty(record)?;
    {
        let mut f = fs::File::create(&tmp).map_err(|e| BuildError::io(&tmp, e))?;
        f.write_all(&json).map_err(|e| BuildError::io(&tmp, e))?;
        f.sync_all().map_err(|e| BuildError::io(&tmp, e))?;
    }
    fs::rename(&tmp, &path).map_err(|e| BuildError::io(&path, e))
}

pub fn remove_record(executable: &Path) -> Result<()> {
    let path = sidecar_path(executable);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(&path, e)),
    }
}
