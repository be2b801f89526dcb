//! Build → serialize → run → parse, with a build tool that emits a shell
//! script sampler.

#![cfg(unix)]

mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{sampler_body, write_script};
use drawbridge::build::{BuildOutput, BuildRequest, BuildTool};
use drawbridge::exec::ExecError;
use drawbridge::fit::Error as FitError;
use drawbridge::{
    CompilationCache, CompileOptions, DataMap, Diagnostic, Model, SamplerArgs, SessionConfig,
};

/// Writes `script` as the "compiled" executable.
struct ScriptTool {
    script: String,
    builds: AtomicUsize,
}

impl BuildTool for ScriptTool {
    fn version(&self) -> drawbridge::build::Result<String> {
        Ok("script-tool 0.1".into())
    }

    fn build(&self, request: &BuildRequest<'_>) -> drawbridge::build::Result<BuildOutput> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let executable = request.staging_dir.join(request.executable_name);
        fs::write(&executable, format!("#!/bin/sh\n{}", self.script)).unwrap();
        fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();
        Ok(BuildOutput {
            executable,
            warnings: Vec::new(),
            log: String::new(),
        })
    }

    fn check_syntax(
        &self,
        _source: &Path,
        _options: &CompileOptions,
    ) -> drawbridge::build::Result<Vec<Diagnostic>> {
        Ok(Vec::new())
    }
}

/// Fails unless the data file carries `N`, then writes 50 draws.
fn checked_sampler() -> String {
    let before = r#"[ -f "$data" ] || { echo "missing data file" >&2; exit 5; }
grep -q '"N": 10' "$data" || { echo "N not found" >&2; exit 6; }"#;
    sampler_body("lp__,mu,sigma", 50, "-$i.5,0.$i,1.$id", before)
}

fn data() -> DataMap {
    DataMap::new()
        .with("N", 10i64)
        .with("y", vec![0i64, 1, 0, 0, 1, 1, 0, 1, 0, 0])
}

fn args() -> SamplerArgs {
    SamplerArgs {
        num_samples: 50,
        num_warmup: 50,
        seed: Some(1234),
        ..SamplerArgs::default()
    }
}

fn config(dir: &Path) -> SessionConfig {
    SessionConfig {
        output_dir: dir.join("runs"),
        max_parallel_chains: 2,
        ..SessionConfig::default()
    }
}

fn compile(dir: &Path, script: String) -> (Arc<ScriptTool>, CompilationCache, PathBuf) {
    let tool = Arc::new(ScriptTool {
        script,
        builds: AtomicUsize::new(0),
    });
    let cache = CompilationCache::new(tool.clone());
    let source = dir.join("bernoulli.stan");
    fs::write(&source, "data { int N; array[N] int y; }\n").unwrap();
    (tool, cache, source)
}

#[test]
fn test_single_chain_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let (tool, cache, source) = compile(dir.path(), checked_sampler());
    let model = Model::compile(&cache, &source, &CompileOptions::default(), false).unwrap();
    assert_eq!(model.name(), "bernoulli");

    let fit = model
        .sample(Some(&data().into()), &args(), 1, &config(dir.path()))
        .unwrap();
    assert_eq!(fit.num_chains(), 1);
    assert_eq!(fit.parse_count(), 0);

    let draws = fit.draws_all().unwrap();
    assert_eq!(draws.shape(), (50, 1, 2));
    assert_eq!(draws.num_variables(), 2);
    assert_eq!(draws.diagnostics().len(), 1);
    assert_eq!(draws.draw("mu", 0, 0), Some(&[0.1][..]));
    assert_eq!(draws.diagnostics().value("lp__", 49, 0), Some(-50.5));

    // the serialized data file sits in the output directory
    let data_file = fit.data_file().unwrap();
    assert!(data_file.starts_with(dir.path().join("runs")));
    let back = drawbridge::io::data::read_data_json(data_file).unwrap();
    assert_eq!(back.get("N"), Some(&drawbridge::DataValue::Int(10)));

    // recompiling the same source reuses the artifact
    Model::compile(&cache, &source, &CompileOptions::default(), false).unwrap();
    assert_eq!(tool.builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_four_chains_with_distinct_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let (_tool, cache, source) = compile(dir.path(), checked_sampler());
    let model = Model::compile(&cache, &source, &CompileOptions::default(), false).unwrap();

    let fit = model
        .sample(Some(&data().into()), &args(), 4, &config(dir.path()))
        .unwrap();
    assert_eq!(fit.chain_results().len(), 4);
    let outputs: std::collections::HashSet<_> = fit.output_files().iter().collect();
    assert_eq!(outputs.len(), 4);

    let sigma = fit.draws(&["sigma"]).unwrap();
    assert_eq!(sigma.shape(), (50, 4, 1));
    // sigma encodes the chain id
    for chain in 0..4 {
        let expected: f64 = format!("1.{}", chain + 1).parse().unwrap();
        assert_eq!(sigma.draw("sigma", 3, chain), Some(&[expected][..]));
    }
    let meta = fit.metadata().unwrap();
    let ids: Vec<u64> = meta.iter().filter_map(|m| m.chain_id).map(|c| c.get()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[test]
fn test_bad_data_never_launches() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("launched");
    let script = format!("touch \"{}\"\n{}", marker.display(), checked_sampler());
    let (_tool, cache, source) = compile(dir.path(), script);
    let model = Model::compile(&cache, &source, &CompileOptions::default(), false).unwrap();

    let bad = DataMap::new().with("N", 2i64).with("y", vec![vec![1i64], vec![1, 2]]);
    let err = model
        .sample(Some(&bad.into()), &args(), 2, &config(dir.path()))
        .unwrap_err();
    assert!(matches!(err, FitError::Io(drawbridge::io::Error::MalformedData { .. })), "{err}");
    assert!(!marker.exists());
}

#[test]
fn test_chain_failure_surfaces_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let (_tool, cache, source) = compile(dir.path(), checked_sampler());
    let model = Model::compile(&cache, &source, &CompileOptions::default(), false).unwrap();

    // N is missing, so every chain exits 6
    let data = DataMap::new().with("M", 1i64);
    let err = model
        .sample(Some(&data.into()), &args(), 2, &config(dir.path()))
        .unwrap_err();
    let FitError::Exec(ExecError::ChainFailure(report)) = err else {
        panic!("expected chain failure, got {err}");
    };
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().all(|r| r.stderr.contains("N not found")));
}

#[test]
fn test_prebuilt_executable() {
    let dir = tempfile::tempdir().unwrap();
    let exe = write_script(dir.path(), "prebuilt", &checked_sampler());
    let model = Model::from_executable(&exe).unwrap();
    assert!(model.source().is_none());

    let fit = model
        .sample(Some(&data().into()), &args(), 1, &config(dir.path()))
        .unwrap();
    assert_eq!(fit.variable("mu").unwrap().values.len(), 50);

    let missing = Model::from_executable(dir.path().join("absent")).unwrap_err();
    assert!(matches!(missing, FitError::MissingExecutable(_)));
}
