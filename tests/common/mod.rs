//! Shared fixtures: chain output files, mock sampler scripts, and a counting
//! build tool.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use drawbridge::build::{BuildError, BuildOutput, BuildRequest, BuildTool, CompileOptions, Diagnostic, Severity};

/// Write a comma-delimited chain output file with a short metadata block.
/// `value(row, col)` fills the body; rows are 0-based.
pub fn write_chain_csv(
    path: &Path,
    chain_id: u64,
    header: &[&str],
    rows: usize,
    value: impl Fn(usize, usize) -> f64,
) -> PathBuf {
    let mut f = fs::File::create(path).expect("create chain file");
    writeln!(f, "# stan_version_major = 2").unwrap();
    writeln!(f, "# model = mock_model").unwrap();
    writeln!(f, "# method = sample (Default)").unwrap();
    writeln!(f, "# id = {chain_id}").unwrap();
    writeln!(f, "{}", header.join(",")).unwrap();
    writeln!(f, "# Step size = 0.85").unwrap();
    for r in 0..rows {
        let line: Vec<String> = (0..header.len())
            .map(|c| value(r, c).to_string())
            .collect();
        writeln!(f, "{}", line.join(",")).unwrap();
    }
    writeln!(f, "#  Elapsed Time: 0.01 seconds (Warm-up)").unwrap();
    path.to_path_buf()
}

/// Write an executable `/bin/sh` script standing in for a compiled sampler.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    {
        let mut f = fs::File::create(&path).expect("create script");
        writeln!(f, "#!/bin/sh").unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f.sync_all().unwrap();
    }
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Shell prologue that pulls `id`, `output file=` and `data file=` out of the
/// sampler argument list into `$id`, `$out` and `$data`.
pub const PARSE_ARGS: &str = r#"
out=""
data=""
id=""
prev=""
for arg in "$@"; do
  case "$arg" in
    id=*) id="${arg#id=}" ;;
    file=*)
      if [ "$prev" = "output" ]; then out="${arg#file=}"; fi
      if [ "$prev" = "data" ]; then data="${arg#file=}"; fi
      ;;
  esac
  prev="$arg"
done
"#;

/// A mock sampler that writes `rows` rows under `header`. `row` is a shell
/// expression template evaluated per row, with `$i` (1-based row) and `$id`
/// (chain id) in scope.
pub fn sampler_body(header: &str, rows: usize, row: &str, before: &str) -> String {
    format!(
        r##"{PARSE_ARGS}
{before}
echo "chain $id starting"
{{
  echo "# model = mock_model"
  echo "# id = $id"
  echo "{header}"
  i=1
  while [ $i -le {rows} ]; do
    echo "{row}"
    i=$((i+1))
  done
}} > "$out"
echo "chain $id done"
"##
    )
}

/// A `Write` that tests can read back after handing it to the orchestrator.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Build tool double: counts builds and writes a placeholder executable.
/// Sources containing `syntax_error` fail; `pedantic_issue` yields a warning
/// when pedantic checks are on.
#[derive(Default)]
pub struct CountingTool {
    pub builds: AtomicUsize,
    pub syntax_checks: AtomicUsize,
    pub fail_builds: AtomicBool,
    pub version: Mutex<String>,
}

impl CountingTool {
    pub fn new() -> Arc<Self> {
        let tool = Self::default();
        *tool.version.lock().unwrap() = "mockc 1.0".into();
        Arc::new(tool)
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn set_version(&self, v: &str) {
        *self.version.lock().unwrap() = v.into();
    }

    fn diagnostics(source: &Path, options: &CompileOptions) -> Vec<Diagnostic> {
        let text = fs::read_to_string(source).unwrap_or_default();
        let mut out = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.contains("syntax_error") {
                out.push(Diagnostic {
                    severity: Severity::Error,
                    message: format!("Syntax error in line {}", i + 1),
                    line: Some(i as u32 + 1),
                    column: Some(1),
                });
            }
            if options.pedantic && line.contains("pedantic_issue") {
                out.push(Diagnostic {
                    severity: Severity::Warning,
                    message: "Warning: parameter has no prior".into(),
                    line: Some(i as u32 + 1),
                    column: None,
                });
            }
        }
        out
    }
}

impl BuildTool for CountingTool {
    fn version(&self) -> drawbridge::build::Result<String> {
        Ok(self.version.lock().unwrap().clone())
    }

    fn build(&self, request: &BuildRequest<'_>) -> drawbridge::build::Result<BuildOutput> {
        let n = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        let diagnostics = Self::diagnostics(request.source, request.options);
        if self.fail_builds.load(Ordering::SeqCst) || diagnostics.iter().any(Diagnostic::is_error) {
            return Err(BuildError::Compile {
                text: "mockc: translation failed\nSyntax error in line 1".into(),
                diagnostics,
            });
        }
        let executable = request.staging_dir.join(request.executable_name);
        fs::write(&executable, format!("build {n}\n")).expect("write executable");
        Ok(BuildOutput {
            executable,
            warnings: diagnostics,
            log: "mockc: ok".into(),
        })
    }

    fn check_syntax(
        &self,
        source: &Path,
        options: &CompileOptions,
    ) -> drawbridge::build::Result<Vec<Diagnostic>> {
        self.syntax_checks.fetch_add(1, Ordering::SeqCst);
        Ok(Self::diagnostics(source, options))
    }
}
