//! Compilation cache: rebuild only when the signature changes.
//!
//! Builds are staged in a `<exe>.partial/` directory next to the target. The
//! previous executable is replaced only after the collaborator succeeds, so a
//! failed build never disturbs a working artifact.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use drawbridge_core::hash::Hash256;

use crate::diagnostics::Diagnostic;
use crate::error::{BuildError, Result};
use crate::options::CompileOptions;
use crate::signature::{self, compute_signature, ArtifactRecord};
use crate::source::expand_source;
use crate::tool::{BuildRequest, BuildTool};

#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    pub executable: PathBuf,
    pub signature: Hash256,
    /// False when an existing artifact was reused.
    pub rebuilt: bool,
    /// Pedantic and other non-fatal findings from this build.
    pub warnings: Vec<Diagnostic>,
}

pub struct CompilationCache {
    tool: Arc<dyn BuildTool>,
    // serializes check-then-build so two callers never build the same target at once
    build_lock: Mutex<()>,
}

impl CompilationCache {
    pub fn new(tool: Arc<dyn BuildTool>) -> Self {
        Self {
            tool,
            build_lock: Mutex::new(()),
        }
    }

    pub fn tool(&self) -> &Arc<dyn BuildTool> {
        &self.tool
    }

    /// `model.stan` → `model` (plus the platform executable suffix).
    pub fn default_executable_path(source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        source.with_file_name(format!("{stem}{}", std::env::consts::EXE_SUFFIX))
    }

    pub fn signature_for(&self, source: &Path, options: &CompileOptions) -> Result<Hash256> {
        let expanded = expand_source(source, &options.include_paths)?;
        let version = self.tool.version()?;
        compute_signature(&expanded, options, &version)
    }

    /// Whether `executable` exists with a record matching the current inputs.
    pub fn is_current(
        &self,
        source: &Path,
        executable: &Path,
        options: &CompileOptions,
    ) -> Result<bool> {
        let sig = self.signature_for(source, options)?;
        Ok(is_recorded(executable, &sig))
    }

    pub fn ensure_compiled(
        &self,
        source: &Path,
        options: &CompileOptions,
        force: bool,
    ) -> Result<CompiledArtifact> {
        let target = Self::default_executable_path(source);
        self.ensure_compiled_at(source, &target, options, force)
    }

    pub fn ensure_compiled_at(
        &self,
        source: &Path,
        target: &Path,
        options: &CompileOptions,
        force: bool,
    ) -> Result<CompiledArtifact> {
        let _guard = self.build_lock.lock().map_err(|_| BuildError::Poisoned)?;

        let expanded = expand_source(source, &options.include_paths)?;
        let version = self.tool.version()?;
        let sig = compute_signature(&expanded, options, &version)?;

        if !force && is_recorded(target, &sig) {
            tracing::debug!(path = %target.display(), signature = %sig, "compiled artifact is current");
            return Ok(CompiledArtifact {
                executable: target.to_path_buf(),
                signature: sig,
                rebuilt: false,
                warnings: Vec::new(),
            });
        }

        tracing::info!(
            source = %source.display(),
            path = %target.display(),
            signature = %sig,
            force,
            "building executable"
        );
        let warnings = self.build_into(source, target, options)?;
        let record = ArtifactRecord::new(sig, &version, options, source);
        signature::write_record(target, &record)?;

        Ok(CompiledArtifact {
            executable: target.to_path_buf(),
            signature: sig,
            rebuilt: true,
            warnings,
        })
    }

    fn build_into(
        &self,
        source: &Path,
        target: &Path,
        options: &CompileOptions,
    ) -> Result<Vec<Diagnostic>> {
        let name = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| BuildError::Tool(format!("bad target path {}", target.display())))?;
        let staging = staging_dir(target);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| BuildError::io(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| BuildError::io(&staging, e))?;

        let request = BuildRequest {
            source,
            staging_dir: &staging,
            executable_name: &name,
            options,
        };
        let result = self.tool.build(&request).and_then(|out| {
            // record first: an executable without a record reads as stale
            signature::remove_record(target)?;
            fs::rename(&out.executable, target).map_err(|e| BuildError::io(target, e))?;
            Ok(out.warnings)
        });
        if let Err(e) = fs::remove_dir_all(&staging) {
            tracing::warn!(path = %staging.display(), error = %e, "could not remove staging directory");
        }
        if let Err(e) = &result {
            tracing::warn!(source = %source.display(), error = %e, "build failed; previous artifact kept");
        }
        result
    }

    /// Translate `source` without touching any executable. Errors fail;
    /// pedantic findings come back as warnings.
    pub fn check_syntax(&self, source: &Path, pedantic: bool) -> Result<Vec<Diagnostic>> {
        self.check_syntax_with(source, &CompileOptions::new().with_pedantic(pedantic))
    }

    pub fn check_syntax_with(
        &self,
        source: &Path,
        options: &CompileOptions,
    ) -> Result<Vec<Diagnostic>> {
        if !source.is_file() {
            return Err(BuildError::MissingSource(source.to_path_buf()));
        }
        let diagnostics = self.tool.check_syntax(source, options)?;
        if diagnostics.iter().any(Diagnostic::is_error) {
            let text = diagnostics
                .iter()
                .map(|d| d.message.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(BuildError::Compile { diagnostics, text });
        }
        Ok(diagnostics)
    }
}

fn staging_dir(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

fn is_recorded(executable: &Path, sig: &Hash256) -> bool {
    executable.is_file() && signature::read_record(executable).is_some_and(|r| r.matches(sig))
}
