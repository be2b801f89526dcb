//! Output parser: per-chain sampler output files → one `DrawsArray`.
//!
//! Every file's header must match the first one. Only the requested groups
//! are converted from text; the rest of each row is skipped.

pub mod csv;
pub mod header;
pub mod latent;
mod metadata;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use drawbridge_core::draws::{DrawsArray, DrawsSchema, VariableDraws};

use crate::error::{Error, Result};
use self::csv::OutputFile;

pub use header::{build_schema, split_column_name};
pub use latent::{parse_latent_dynamics, LatentDynamics, LatentTriple};

/// Which logical groups (model variables or diagnostic columns) to materialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(names.into_iter().map(Into::into).collect())
    }

    fn includes(&self, name: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.contains(name),
        }
    }
}

/// Read just the header of `path` and fold it into a schema.
pub fn read_schema(path: &Path) -> Result<DrawsSchema> {
    let file = OutputFile::open(path)?;
    schema_for(&file)
}

fn schema_for(file: &OutputFile) -> Result<DrawsSchema> {
    build_schema(&file.header).map_err(|reason| Error::CsvFormat {
        path: file.path.clone(),
        line: 0,
        reason,
    })
}

/// Parse the selected groups from every chain's output file.
///
/// `expected_draws`, when given, is the number of rows each chain must hold.
pub fn parse_draws(
    paths: &[PathBuf],
    selection: &Selection,
    expected_draws: Option<usize>,
) -> Result<DrawsArray> {
    let Some(first_path) = paths.first() else {
        return Err(Error::NoOutputFiles);
    };

    let files = paths
        .iter()
        .map(|p| OutputFile::open(p))
        .collect::<Result<Vec<_>>>()?;
    let first = &files[0];
    for (chain, file) in files.iter().enumerate().skip(1) {
        if file.header != first.header {
            return Err(Error::InconsistentOutput(format!(
                "chain {} ({}) header differs from {}: {}",
                chain + 1,
                file.path.display(),
                first_path.display(),
                describe_header_diff(&first.header, &file.header)
            )));
        }
    }

    let schema = schema_for(first)?;
    if let Selection::Only(names) = selection {
        if let Some(unknown) = names.iter().find(|n| !schema.contains(n)) {
            return Err(Error::UnknownVariable(unknown.clone()));
        }
    }

    // header column → group it belongs to
    let variables: Vec<_> = schema
        .variables
        .iter()
        .filter(|v| selection.includes(&v.name))
        .collect();
    let diagnostics: Vec<_> = schema
        .diagnostics
        .iter()
        .filter(|d| selection.includes(&d.name))
        .collect();
    let wanted: Vec<usize> = variables
        .iter()
        .flat_map(|v| v.columns.iter().copied())
        .chain(diagnostics.iter().map(|d| d.column))
        .collect();

    let mut per_chain = Vec::with_capacity(files.len());
    for file in &files {
        let data = file.read_columns(&wanted)?;
        tracing::debug!(
            path = %file.path.display(),
            rows = data.num_rows,
            columns = wanted.len(),
            "parsed output file"
        );
        per_chain.push(data);
    }

    let num_iterations = per_chain[0].num_rows;
    for (chain, data) in per_chain.iter().enumerate() {
        if data.num_rows != num_iterations {
            return Err(Error::InconsistentOutput(format!(
                "chain {} has {} draws but chain 1 has {}",
                chain + 1,
                data.num_rows,
                num_iterations
            )));
        }
    }
    if let Some(expected) = expected_draws {
        if num_iterations != expected {
            return Err(Error::InconsistentOutput(format!(
                "expected {expected} draws per chain, found {num_iterations}"
            )));
        }
    }

    let num_chains = files.len();
    let metadata = files.iter().map(|f| f.metadata.clone()).collect();
    let mut draws = DrawsArray::new(num_iterations, num_chains, schema.clone(), metadata);

    // `wanted` is laid out variable by variable, then diagnostics
    let mut offset = 0;
    for meta in variables {
        let width = meta.columns.len();
        let mut values = Vec::with_capacity(num_iterations * num_chains * width);
        for it in 0..num_iterations {
            for data in &per_chain {
                for k in offset..offset + width {
                    values.push(data.values[k][it]);
                }
            }
        }
        draws.insert_variable(VariableDraws {
            meta: meta.clone(),
            values,
        })?;
        offset += width;
    }
    for diag in diagnostics {
        let mut values = Vec::with_capacity(num_iterations * num_chains);
        for it in 0..num_iterations {
            for data in &per_chain {
                values.push(data.values[offset][it]);
            }
        }
        draws.insert_diagnostic(diag.name.clone(), values)?;
        offset += 1;
    }
    Ok(draws)
}

fn describe_header_diff(a: &[String], b: &[String]) -> String {
    if a.len() != b.len() {
        return format!("{} columns vs {}", a.len(), b.len());
    }
    match a.iter().zip(b).position(|(x, y)| x != y) {
        Some(i) => format!("column {} is '{}' vs '{}'", i + 1, a[i], b[i]),
        None => "headers differ".into(),
    }
}
