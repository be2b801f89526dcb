use std::path::{Path, PathBuf};

use drawbridge_build::{CompilationCache, CompileOptions, CompiledArtifact, Diagnostic};
use drawbridge_core::config::SessionConfig;
use drawbridge_core::id::RunId;
use drawbridge_exec::{Orchestrator, SamplerArgs};
use drawbridge_io::{serialize, DataFormat, DataInput};

use crate::error::{Error, Result};
use crate::fit::Fit;

/// A runnable sampler executable.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    source: Option<PathBuf>,
    executable: PathBuf,
    artifact: Option<CompiledArtifact>,
}

impl Model {
    /// Compile `source` (or reuse a current build) through `cache`.
    pub fn compile(
        cache: &CompilationCache,
        source: &Path,
        options: &CompileOptions,
        force: bool,
    ) -> Result<Self> {
        let artifact = cache.ensure_compiled(source, options, force)?;
        Ok(Self {
            name: model_name(source),
            source: Some(source.to_path_buf()),
            executable: artifact.executable.clone(),
            artifact: Some(artifact),
        })
    }

    /// Wrap an executable built elsewhere.
    pub fn from_executable(path: impl Into<PathBuf>) -> Result<Self> {
        let executable = path.into();
        if !executable.is_file() {
            return Err(Error::MissingExecutable(executable));
        }
        Ok(Self {
            name: model_name(&executable),
            source: None,
            executable,
            artifact: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn artifact(&self) -> Option<&CompiledArtifact> {
        self.artifact.as_ref()
    }

    /// Non-fatal findings from the build that produced this model.
    pub fn warnings(&self) -> &[Diagnostic] {
        self.artifact
            .as_ref()
            .map(|a| a.warnings.as_slice())
            .unwrap_or_default()
    }

    /// Serialize `data`, run `num_chains` chains and return the fit. Output
    /// is not parsed until it is asked for.
    pub fn sample(
        &self,
        data: Option<&DataInput>,
        args: &SamplerArgs,
        num_chains: usize,
        cfg: &SessionConfig,
    ) -> Result<Fit> {
        let orchestrator = Orchestrator::new(cfg);
        self.sample_with(&orchestrator, data, args, num_chains, cfg)
    }

    /// As `sample`, on a caller-owned orchestrator (for cancellation or a
    /// custom console).
    pub fn sample_with(
        &self,
        orchestrator: &Orchestrator,
        data: Option<&DataInput>,
        args: &SamplerArgs,
        num_chains: usize,
        cfg: &SessionConfig,
    ) -> Result<Fit> {
        cfg.validate()?;
        let run_id = RunId::new();
        let data_file = data
            .map(|d| serialize(d, &cfg.output_dir, DataFormat::Json))
            .transpose()?;
        let invocations = args.invocations(
            &self.executable,
            &self.name,
            data_file.as_deref(),
            num_chains,
            &cfg.output_dir,
            run_id,
        )?;
        tracing::info!(
            model = %self.name,
            run = %run_id,
            chains = num_chains,
            "sampling"
        );
        let results = orchestrator.run(invocations)?;
        Ok(Fit::from_results(
            run_id,
            self.name.clone(),
            data_file,
            args.clone(),
            results,
        ))
    }
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}
