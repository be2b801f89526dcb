//! Per-chain launch requests and the sampler argument list that produces them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use drawbridge_core::id::{ChainId, RunId};

use crate::runtime::ExecError;

/// One subprocess launch. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInvocation {
    pub chain_id: ChainId,
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Where the chain writes its draws; unique per chain.
    pub output_file: PathBuf,
    pub latent_file: Option<PathBuf>,
    pub seed: u32,
}

impl ChainInvocation {
    /// A launch with a hand-built argument list.
    pub fn new(
        chain_id: ChainId,
        executable: impl Into<PathBuf>,
        args: Vec<String>,
        output_file: impl Into<PathBuf>,
        seed: u32,
    ) -> Self {
        Self {
            chain_id,
            executable: executable.into(),
            args,
            working_dir: None,
            output_file: output_file.into(),
            latent_file: None,
            seed,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Sampler settings shared by every chain of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerArgs {
    pub num_samples: usize,
    pub num_warmup: usize,
    pub thin: usize,
    pub save_warmup: bool,
    /// Base seed; chain `i` (0-based) gets `seed + i`. Drawn at random when unset.
    pub seed: Option<u32>,
    pub adapt_delta: Option<f64>,
    pub max_depth: Option<u32>,
    /// Initial values: a radius (`"0"`, `"2"`) or a file path.
    pub init: Option<String>,
    pub refresh: Option<u32>,
    pub threads_per_chain: Option<u32>,
    pub save_latent_dynamics: bool,
}

impl Default for SamplerArgs {
    fn default() -> Self {
        Self {
            num_samples: 1000,
            num_warmup: 1000,
            thin: 1,
            save_warmup: false,
            seed: None,
            adapt_delta: None,
            max_depth: None,
            init: None,
            refresh: None,
            threads_per_chain: None,
            save_latent_dynamics: false,
        }
    }
}

impl SamplerArgs {
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.thin == 0 {
            return Err(ExecError::Invalid("thin must be at least 1".into()));
        }
        if let Some(delta) = self.adapt_delta {
            if !(delta > 0.0 && delta < 1.0) {
                return Err(ExecError::Invalid(format!(
                    "adapt_delta must be in (0, 1), got {delta}"
                )));
            }
        }
        if self.max_depth == Some(0) {
            return Err(ExecError::Invalid("max_depth must be at least 1".into()));
        }
        if self.threads_per_chain == Some(0) {
            return Err(ExecError::Invalid("threads_per_chain must be at least 1".into()));
        }
        Ok(())
    }

    /// Rows each chain should write: thinned draws, plus thinned warmup when saved.
    pub fn expected_draws(&self) -> usize {
        let thin = self.thin.max(1);
        let kept = |n: usize| n.div_ceil(thin);
        kept(self.num_samples) + if self.save_warmup { kept(self.num_warmup) } else { 0 }
    }

    /// Argument list for one chain.
    pub fn chain_args(
        &self,
        chain_id: ChainId,
        seed: u32,
        data_file: Option<&Path>,
        output_file: &Path,
        latent_file: Option<&Path>,
    ) -> Vec<String> {
        let mut args = vec![
            format!("id={chain_id}"),
            "random".to_string(),
            format!("seed={seed}"),
        ];
        if let Some(data) = data_file {
            args.push("data".into());
            args.push(format!("file={}", data.display()));
        }
        if let Some(init) = &self.init {
            args.push(format!("init={init}"));
        }
        args.push("output".into());
        args.push(format!("file={}", output_file.display()));
        if let Some(latent) = latent_file {
            args.push(format!("diagnostic_file={}", latent.display()));
        }
        if let Some(refresh) = self.refresh {
            args.push(format!("refresh={refresh}"));
        }
        if let Some(threads) = self.threads_per_chain {
            args.push(format!("num_threads={threads}"));
        }

        args.push("method=sample".into());
        args.push(format!("num_samples={}", self.num_samples));
        args.push(format!("num_warmup={}", self.num_warmup));
        if self.save_warmup {
            args.push("save_warmup=1".into());
        }
        args.push(format!("thin={}", self.thin));
        args.push("algorithm=hmc".into());
        args.push("engine=nuts".into());
        if let Some(depth) = self.max_depth {
            args.push(format!("max_depth={depth}"));
        }
        if let Some(delta) = self.adapt_delta {
            args.push("adapt".into());
            args.push(format!("delta={delta}"));
        }
        args
    }

    /// One invocation per chain, ids `1..=num_chains`, each with its own seed
    /// and output file under `output_dir`.
    pub fn invocations(
        &self,
        executable: &Path,
        model_name: &str,
        data_file: Option<&Path>,
        num_chains: usize,
        output_dir: &Path,
        run_id: RunId,
    ) -> Result<Vec<ChainInvocation>, ExecError> {
        self.validate()?;
        if num_chains == 0 {
            return Err(ExecError::Invalid("at least one chain is required".into()));
        }
        let base_seed = self.seed.unwrap_or_else(rand::random::<u32>);
        let tag = run_id.short();

        Ok((0..num_chains)
            .map(|i| {
                let chain_id = ChainId::new(i as u64 + 1);
                let seed = base_seed.wrapping_add(i as u32);
                let output_file = output_dir.join(format!("{model_name}-{tag}-{chain_id}.csv"));
                let latent_file = self
                    .save_latent_dynamics
                    .then(|| output_dir.join(format!("{model_name}-{tag}-diagnostic-{chain_id}.csv")));
                let args = self.chain_args(
                    chain_id,
                    seed,
                    data_file,
                    &output_file,
                    latent_file.as_deref(),
                );
                ChainInvocation {
                    chain_id,
                    executable: executable.to_path_buf(),
                    args,
                    working_dir: None,
                    output_file,
                    latent_file,
                    seed,
                }
            })
            .collect())
    }
}
