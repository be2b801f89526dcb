//! Memoizing accessor over a set of chain output files.
//!
//! The first request for a group parses exactly the groups not yet cached and
//! merges them into the backing `DrawsArray`. A request for cached groups
//! never touches the files. All of this happens under one mutex, so two
//! callers asking for the same group parse it once.
//!
//! A failed parse leaves the cache as it was; the next request retries.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use drawbridge_core::draws::{DiagnosticTable, DrawsArray, DrawsSchema, VariableDraws};
use drawbridge_core::error::Error as CoreError;
use drawbridge_io::{parse_draws, read_schema, Selection};

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct CacheState {
    draws: Option<DrawsArray>,
    loaded: BTreeSet<String>,
    schema: Option<DrawsSchema>,
    parse_count: usize,
}

#[derive(Debug)]
pub struct LazyDraws {
    paths: Vec<PathBuf>,
    expected_draws: Option<usize>,
    state: Mutex<CacheState>,
}

impl LazyDraws {
    /// `expected_draws`, when known, is checked against every chain's row count.
    pub fn new(paths: Vec<PathBuf>, expected_draws: Option<usize>) -> Self {
        Self {
            paths,
            expected_draws,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state.lock().map_err(|_| Error::Poisoned)
    }

    /// Logical layout of the output files (header only; not counted as a parse).
    pub fn schema(&self) -> Result<DrawsSchema> {
        let mut state = self.lock()?;
        Ok(self.schema_in(&mut state)?.clone())
    }

    fn schema_in<'a>(&self, state: &'a mut CacheState) -> Result<&'a DrawsSchema> {
        if state.schema.is_none() {
            let first = self
                .paths
                .first()
                .ok_or(Error::Io(drawbridge_io::Error::NoOutputFiles))?;
            state.schema = Some(read_schema(first)?);
        }
        state
            .schema
            .as_ref()
            .ok_or_else(|| Error::Core(CoreError::Invariant("schema missing after load".into())))
    }

    /// Values for `names` (model variables or diagnostic columns), parsing
    /// only the ones not cached yet.
    pub fn get<S: AsRef<str>>(&self, names: &[S]) -> Result<DrawsArray> {
        let mut state = self.lock()?;
        let schema = self.schema_in(&mut state)?;
        if let Some(unknown) = names.iter().map(|n| n.as_ref()).find(|n| !schema.contains(n)) {
            return Err(CoreError::UnknownVariable(unknown.to_string()).into());
        }
        if names.is_empty() {
            // nothing to materialize; the row count is only known once parsed
            let empty = DrawsArray::new(
                self.expected_draws.unwrap_or(0),
                self.paths.len(),
                schema.clone(),
                Vec::new(),
            );
            return Ok(match state.draws.as_ref() {
                Some(draws) => draws.select(names)?,
                None => empty,
            });
        }

        let missing: BTreeSet<String> = names
            .iter()
            .map(|n| n.as_ref().to_string())
            .filter(|n| !state.loaded.contains(n))
            .collect();

        if !missing.is_empty() || state.draws.is_none() {
            tracing::debug!(groups = ?missing, "draws cache miss; parsing");
            let parsed = parse_draws(
                &self.paths,
                &Selection::Only(missing.clone()),
                self.expected_draws,
            )?;
            match state.draws.as_mut() {
                Some(existing) => existing.merge(parsed)?,
                None => state.draws = Some(parsed),
            }
            state.loaded.extend(missing);
            state.parse_count += 1;
        } else {
            tracing::trace!(groups = names.len(), "draws cache hit");
        }

        let draws = state
            .draws
            .as_ref()
            .ok_or_else(|| Error::Core(CoreError::Invariant("draws missing after parse".into())))?;
        Ok(draws.select(names)?)
    }

    /// Every model variable and diagnostic column.
    pub fn get_all(&self) -> Result<DrawsArray> {
        let names = self.schema()?.all_names();
        self.get(&names)
    }

    pub fn variable(&self, name: &str) -> Result<VariableDraws> {
        let draws = self.get(&[name])?;
        draws
            .variable(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownVariable(name.to_string()).into())
    }

    /// The full diagnostic-column table.
    pub fn diagnostics(&self) -> Result<DiagnosticTable> {
        let names: Vec<String> = self
            .schema()?
            .diagnostic_names()
            .map(str::to_string)
            .collect();
        Ok(self.get(&names)?.diagnostics().clone())
    }

    /// Names currently materialized.
    pub fn cached(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.loaded.iter().cloned().collect())
    }

    /// Number of times the output files have been parsed for draws.
    pub fn parse_count(&self) -> usize {
        self.lock().map(|s| s.parse_count).unwrap_or(0)
    }

    /// Drop everything cached, including the schema. The parse counter keeps
    /// counting across reloads.
    pub fn reload(&self) -> Result<()> {
        let mut state = self.lock()?;
        let count = state.parse_count;
        *state = CacheState {
            parse_count: count,
            ..CacheState::default()
        };
        tracing::debug!(files = self.paths.len(), "draws cache cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_file(dir: &std::path::Path, name: &str, rows: &[(f64, f64)]) -> PathBuf {
        let mut text = String::from("# model = m\nlp__,mu\n");
        for (lp, mu) in rows {
            text.push_str(&format!("{lp},{mu}\n"));
        }
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn reload_forgets_cached_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = chain_file(dir.path(), "c1.csv", &[(-1.0, 0.5), (-2.0, 0.25)]);
        let lazy = LazyDraws::new(vec![path.clone()], Some(2));

        assert_eq!(lazy.variable("mu").unwrap().values, vec![0.5, 0.25]);
        assert_eq!(lazy.parse_count(), 1);
        assert_eq!(lazy.cached().unwrap(), vec!["mu".to_string()]);

        chain_file(dir.path(), "c1.csv", &[(-1.0, 9.0), (-2.0, 8.0)]);
        // still served from the cache
        assert_eq!(lazy.variable("mu").unwrap().values, vec![0.5, 0.25]);
        assert_eq!(lazy.parse_count(), 1);

        lazy.reload().unwrap();
        assert!(lazy.cached().unwrap().is_empty());
        assert_eq!(lazy.variable("mu").unwrap().values, vec![9.0, 8.0]);
        assert_eq!(lazy.parse_count(), 2);
    }

    #[test]
    fn wrong_row_count_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = chain_file(dir.path(), "c1.csv", &[(-1.0, 0.5)]);
        let lazy = LazyDraws::new(vec![path], Some(2));

        assert!(lazy.get(&["mu"]).is_err());
        assert!(lazy.cached().unwrap().is_empty());
        assert_eq!(lazy.parse_count(), 0);
    }

    #[test]
    fn failed_parse_keeps_cached_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c1.csv");
        std::fs::write(&path, "# model = m\nlp__,mu,sigma\n-1,0.5,1\n-2,0.25,abc\n").unwrap();
        let lazy = LazyDraws::new(vec![path], Some(2));

        assert_eq!(lazy.variable("mu").unwrap().values, vec![0.5, 0.25]);
        assert_eq!(lazy.parse_count(), 1);

        let err = lazy.get(&["sigma"]).unwrap_err();
        assert!(
            matches!(err, Error::Io(drawbridge_io::Error::CsvParse { line: 4, ref token, .. }) if token == "abc"),
            "{err}"
        );
        assert_eq!(lazy.cached().unwrap(), vec!["mu".to_string()]);
        assert_eq!(lazy.parse_count(), 1);

        // mu still comes from the cache, and mixing in sigma fails the same way
        assert_eq!(lazy.variable("mu").unwrap().values, vec![0.5, 0.25]);
        assert!(lazy.get(&["mu", "sigma"]).is_err());
        assert_eq!(lazy.cached().unwrap(), vec!["mu".to_string()]);
        assert_eq!(lazy.parse_count(), 1);
    }

    #[test]
    fn empty_request_reads_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = chain_file(dir.path(), "c1.csv", &[(-1.0, 0.5), (-2.0, 0.25)]);
        let lazy = LazyDraws::new(vec![path], Some(2));

        let none: [&str; 0] = [];
        let empty = lazy.get(&none).unwrap();
        lazy.get(&none).unwrap();
        assert_eq!(empty.shape(), (2, 1, 0));
        assert_eq!(empty.num_variables(), 0);
        assert_eq!(lazy.parse_count(), 0);
        assert!(lazy.cached().unwrap().is_empty());

        lazy.get(&["mu"]).unwrap();
        assert_eq!(lazy.get(&none).unwrap().shape(), (2, 1, 0));
        assert_eq!(lazy.parse_count(), 1);
    }
}
