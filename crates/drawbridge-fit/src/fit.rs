use std::path::PathBuf;

use drawbridge_core::draws::{ChainMetadata, DiagnosticTable, DrawsArray, DrawsSchema, VariableDraws};
use drawbridge_core::id::RunId;
use drawbridge_exec::{ChainResult, SamplerArgs};
use drawbridge_io::readers::csv::OutputFile;
use drawbridge_io::{parse_latent_dynamics, LatentDynamics};

use crate::error::{Error, Result};
use crate::lazy::LazyDraws;

/// Outcome of a successful sampling run.
#[derive(Debug)]
pub struct Fit {
    run_id: RunId,
    model_name: String,
    data_file: Option<PathBuf>,
    args: Option<SamplerArgs>,
    chain_results: Vec<ChainResult>,
    output_files: Vec<PathBuf>,
    latent_files: Vec<PathBuf>,
    draws: LazyDraws,
}

impl Fit {
    pub fn from_results(
        run_id: RunId,
        model_name: String,
        data_file: Option<PathBuf>,
        args: SamplerArgs,
        chain_results: Vec<ChainResult>,
    ) -> Self {
        let output_files: Vec<PathBuf> =
            chain_results.iter().map(|r| r.output_file.clone()).collect();
        let latent_files = chain_results
            .iter()
            .filter_map(|r| r.latent_file.clone())
            .collect();
        let draws = LazyDraws::new(output_files.clone(), Some(args.expected_draws()));
        Self {
            run_id,
            model_name,
            data_file,
            args: Some(args),
            chain_results,
            output_files,
            latent_files,
            draws,
        }
    }

    /// A fit over output files written by an earlier run.
    pub fn from_output_files(output_files: Vec<PathBuf>) -> Self {
        let model_name = output_files
            .first()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            run_id: RunId::new(),
            model_name,
            data_file: None,
            args: None,
            chain_results: Vec::new(),
            draws: LazyDraws::new(output_files.clone(), None),
            output_files,
            latent_files: Vec::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn num_chains(&self) -> usize {
        self.output_files.len()
    }

    pub fn data_file(&self) -> Option<&PathBuf> {
        self.data_file.as_ref()
    }

    pub fn sampler_args(&self) -> Option<&SamplerArgs> {
        self.args.as_ref()
    }

    pub fn chain_results(&self) -> &[ChainResult] {
        &self.chain_results
    }

    pub fn output_files(&self) -> &[PathBuf] {
        &self.output_files
    }

    /// Per-chain metadata. Reads comment lines only; rows stay unparsed.
    pub fn metadata(&self) -> Result<Vec<ChainMetadata>> {
        self.output_files
            .iter()
            .map(|p| -> Result<ChainMetadata> { Ok(OutputFile::open(p)?.metadata) })
            .collect()
    }

    pub fn schema(&self) -> Result<DrawsSchema> {
        self.draws.schema()
    }

    pub fn draws<S: AsRef<str>>(&self, names: &[S]) -> Result<DrawsArray> {
        self.draws.get(names)
    }

    pub fn draws_all(&self) -> Result<DrawsArray> {
        self.draws.get_all()
    }

    pub fn variable(&self, name: &str) -> Result<VariableDraws> {
        self.draws.variable(name)
    }

    pub fn diagnostics(&self) -> Result<DiagnosticTable> {
        self.draws.diagnostics()
    }

    pub fn lazy(&self) -> &LazyDraws {
        &self.draws
    }

    /// Latent dynamics for every chain; requires `save_latent_dynamics`.
    pub fn latent_dynamics(&self) -> Result<Vec<LatentDynamics>> {
        if self.latent_files.is_empty() {
            return Err(Error::Io(drawbridge_io::Error::NoOutputFiles));
        }
        Ok(parse_latent_dynamics(&self.latent_files)?)
    }

    /// Forget cached draws; the next access re-reads the files.
    pub fn reload(&self) -> Result<()> {
        self.draws.reload()
    }

    pub fn parse_count(&self) -> usize {
        self.draws.parse_count()
    }
}
