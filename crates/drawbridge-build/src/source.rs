//! `#include` expansion. The signature covers the fully expanded text so an
//! edit to an included file invalidates the artifact.

use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// Read `path` and recursively splice in every `#include`. Includes resolve
/// against the including file's directory first, then `include_paths`.
pub fn expand_source(path: &Path, include_paths: &[PathBuf]) -> Result<String> {
    if !path.is_file() {
        return Err(BuildError::MissingSource(path.to_path_buf()));
    }
    let mut stack = Vec::new();
    let mut out = String::new();
    expand_into(path, include_paths, &mut stack, &mut out)?;
    Ok(out)
}

fn expand_into(
    path: &Path,
    include_paths: &[PathBuf],
    stack: &mut Vec<PathBuf>,
    out: &mut String,
) -> Result<()> {
    let canonical = path.canonicalize().map_err(|e| BuildError::io(path, e))?;
    if stack.contains(&canonical) {
        return Err(BuildError::Include {
            path: path.to_path_buf(),
            reason: "include cycle".into(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    stack.push(canonical);

    for line in text.lines() {
        match include_target(line) {
            Some(target) => {
                let resolved = resolve(target, path.parent(), include_paths).ok_or_else(|| {
                    BuildError::Include {
                        path: path.to_path_buf(),
                        reason: format!("cannot find included file '{target}'"),
                    }
                })?;
                expand_into(&resolved, include_paths, stack, out)?;
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    stack.pop();
    Ok(())
}

fn include_target(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("#include")?;
    let rest = rest.trim();
    let target = rest
        .strip_prefix('<')
        .and_then(|r| r.strip_suffix('>'))
        .or_else(|| rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
        .unwrap_or(rest)
        .trim();
    (!target.is_empty()).then_some(target)
}

fn resolve(target: &str, dir: Option<&Path>, include_paths: &[PathBuf]) -> Option<PathBuf> {
    dir.into_iter()
        .chain(include_paths.iter().map(PathBuf::as_path))
        .map(|d| d.join(target))
        .find(|candidate| candidate.is_file())
}
