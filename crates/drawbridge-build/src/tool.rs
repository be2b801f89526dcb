//! The external translator/build collaborator.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use uuid::Uuid;

use crate::diagnostics::{parse_diagnostics, Diagnostic, Severity};
use crate::error::{BuildError, Result};
use crate::options::CompileOptions;

/// One build: translate and link `source` into an executable inside
/// `staging_dir`. The cache moves the result into place.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub source: &'a Path,
    pub staging_dir: &'a Path,
    /// File name the executable should have (no directory).
    pub executable_name: &'a str,
    pub options: &'a CompileOptions,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub executable: PathBuf,
    pub warnings: Vec<Diagnostic>,
    pub log: String,
}

pub trait BuildTool: Send + Sync {
    /// Version string of the translator; part of every signature.
    fn version(&self) -> Result<String>;

    /// Build synchronously. Failures are `BuildError::Compile` carrying the
    /// collaborator's output verbatim.
    fn build(&self, request: &BuildRequest<'_>) -> Result<BuildOutput>;

    /// Translate without producing an executable; returns every diagnostic,
    /// errors included.
    fn check_syntax(&self, source: &Path, options: &CompileOptions) -> Result<Vec<Diagnostic>>;
}

/// Drives a CmdStan installation: `bin/stanc` for translation and syntax
/// checks, `make` for the build.
#[derive(Debug, Clone)]
pub struct CmdStanTool {
    home: PathBuf,
    make: String,
}

impl CmdStanTool {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            make: if cfg!(windows) { "mingw32-make" } else { "make" }.to_string(),
        }
    }

    /// Installation from `CMDSTAN`.
    pub fn from_env() -> Result<Self> {
        std::env::var_os("CMDSTAN")
            .map(|home| Self::new(PathBuf::from(home)))
            .ok_or_else(|| BuildError::Tool("CMDSTAN is not set".into()))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn stanc(&self) -> PathBuf {
        self.home
            .join("bin")
            .join(format!("stanc{}", std::env::consts::EXE_SUFFIX))
    }

    fn run(&self, cmd: &mut Command) -> Result<Output> {
        tracing::debug!(command = ?cmd, "running build tool");
        cmd.output()
            .map_err(|e| BuildError::Tool(format!("failed to run {:?}: {e}", cmd.get_program())))
    }
}

impl BuildTool for CmdStanTool {
    fn version(&self) -> Result<String> {
        let out = self.run(Command::new(self.stanc()).arg("--version"))?;
        if !out.status.success() {
            return Err(BuildError::Tool(format!(
                "stanc --version exited with {}",
                out.status
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn build(&self, request: &BuildRequest<'_>) -> Result<BuildOutput> {
        let staged_source = request
            .staging_dir
            .join(format!("{}.stan", request.executable_name));
        std::fs::copy(request.source, &staged_source)
            .map_err(|e| BuildError::io(&staged_source, e))?;

        // the staged copy loses its directory; keep relative includes working
        let mut options = request.options.clone();
        if let Some(dir) = request.source.parent().filter(|d| !d.as_os_str().is_empty()) {
            options.include_paths.insert(0, dir.to_path_buf());
        }
        let target = request.staging_dir.join(request.executable_name);

        let mut cmd = Command::new(&self.make);
        cmd.arg("-C").arg(&self.home);
        for var in options.make_vars() {
            cmd.arg(var);
        }
        let stanc_flags = options.translator_args().join(" ");
        if !stanc_flags.is_empty() {
            cmd.arg(format!("STANCFLAGS={stanc_flags}"));
        }
        cmd.arg(&target);
        let out = self.run(&mut cmd)?;
        let log = combined(&out);

        if !out.status.success() {
            let mut diagnostics = parse_diagnostics(&log);
            if !diagnostics.iter().any(Diagnostic::is_error) {
                diagnostics.push(Diagnostic::error(format!("build exited with {}", out.status)));
            }
            return Err(BuildError::Compile {
                diagnostics,
                text: log,
            });
        }

        let executable = target.with_file_name(format!(
            "{}{}",
            request.executable_name,
            std::env::consts::EXE_SUFFIX
        ));
        let warnings = parse_diagnostics(&log)
            .into_iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect();
        Ok(BuildOutput {
            executable,
            warnings,
            log,
        })
    }

    fn check_syntax(&self, source: &Path, options: &CompileOptions) -> Result<Vec<Diagnostic>> {
        let scratch = std::env::temp_dir().join(format!("drawbridge-check-{}.hpp", Uuid::new_v4().simple()));
        let mut cmd = Command::new(self.stanc());
        cmd.args(options.translator_args())
            .arg(format!("--o={}", scratch.display()))
            .arg(source);
        let out = self.run(&mut cmd);
        let _ = std::fs::remove_file(&scratch);
        let out = out?;

        let text = combined(&out);
        let mut diagnostics = parse_diagnostics(&text);
        if !out.status.success() && !diagnostics.iter().any(Diagnostic::is_error) {
            diagnostics.push(Diagnostic::error(text.trim().to_string()));
        }
        Ok(diagnostics)
    }
}

fn combined(out: &Output) -> String {
    let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&out.stderr));
    text
}
