//! Latent-dynamics files: per-iteration unconstrained values with their
//! auxiliary momentum (`p_X`) and gradient (`g_X`) columns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use drawbridge_core::draws::{is_diagnostic_column, ChainMetadata};

use super::csv::OutputFile;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct LatentTriple {
    pub name: String,
    pub value: Vec<f64>,
    pub momentum: Vec<f64>,
    pub gradient: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LatentDynamics {
    pub path: PathBuf,
    pub metadata: ChainMetadata,
    pub diagnostics: BTreeMap<String, Vec<f64>>,
    pub parameters: Vec<LatentTriple>,
    pub num_rows: usize,
}

impl LatentDynamics {
    pub fn parameter(&self, name: &str) -> Option<&LatentTriple> {
        self.parameters.iter().find(|t| t.name == name)
    }
}

pub fn parse_latent_dynamics(paths: &[PathBuf]) -> Result<Vec<LatentDynamics>> {
    if paths.is_empty() {
        return Err(Error::NoOutputFiles);
    }
    paths.iter().map(|p| parse_one(p)).collect()
}

fn parse_one(path: &Path) -> Result<LatentDynamics> {
    let file = OutputFile::open(path)?;
    let position = |name: &str| file.header.iter().position(|c| c == name);

    let mut diag_cols = Vec::new();
    let mut triples = Vec::new();
    for (col, name) in file.header.iter().enumerate() {
        if is_diagnostic_column(name) {
            diag_cols.push((name.clone(), col));
            continue;
        }
        if let (Some(p), Some(g)) = (position(&format!("p_{name}")), position(&format!("g_{name}"))) {
            triples.push((name.clone(), [col, p, g]));
        }
    }
    if triples.is_empty() && file.header.len() > diag_cols.len() {
        return Err(Error::CsvFormat {
            path: path.to_path_buf(),
            line: 0,
            reason: "no value/momentum/gradient column triples in header".into(),
        });
    }

    let wanted: Vec<usize> = diag_cols
        .iter()
        .map(|(_, c)| *c)
        .chain(triples.iter().flat_map(|(_, cols)| cols.iter().copied()))
        .collect();
    let data = file.read_columns(&wanted)?;
    let num_rows = data.num_rows;
    let mut columns = data.values.into_iter();

    let diagnostics = diag_cols
        .into_iter()
        .map(|(name, _)| (name, columns.next().unwrap_or_default()))
        .collect();
    let parameters = triples
        .into_iter()
        .map(|(name, _)| LatentTriple {
            name,
            value: columns.next().unwrap_or_default(),
            momentum: columns.next().unwrap_or_default(),
            gradient: columns.next().unwrap_or_default(),
        })
        .collect();

    Ok(LatentDynamics {
        path: path.to_path_buf(),
        metadata: file.metadata.clone(),
        diagnostics,
        parameters,
        num_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn groups_value_momentum_gradient() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            "lp__,accept_stat__,theta,p_theta,g_theta\n-7,0.9,0.1,1.5,-0.2\n-6.5,0.8,0.2,1.1,-0.3\n"
        )
        .unwrap();
        let out = parse_latent_dynamics(&[f.path().to_path_buf()]).unwrap();
        let chain = &out[0];
        assert_eq!(chain.num_rows, 2);
        assert_eq!(chain.diagnostics["lp__"], vec![-7.0, -6.5]);
        let theta = chain.parameter("theta").unwrap();
        assert_eq!(theta.value, vec![0.1, 0.2]);
        assert_eq!(theta.momentum, vec![1.5, 1.1]);
        assert_eq!(theta.gradient, vec![-0.2, -0.3]);
        assert!(chain.parameter("p_theta").is_none());
    }
}
