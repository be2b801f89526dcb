//! Unified cross-chain draws: iteration × chain × variable.
//!
//! A `DrawsArray` may be partial: the schema always describes every logical
//! variable in the output files, while only the variables that have been
//! parsed are materialized. `merge` folds another partial array for the same
//! output set into this one.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::ChainId;

/// Algorithm-reserved output columns, segregated from model variables.
pub const DIAGNOSTIC_COLUMNS: &[&str] = &[
    "lp__",
    "accept_stat__",
    "stepsize__",
    "treedepth__",
    "n_leapfrog__",
    "divergent__",
    "energy__",
    "log_p__",
    "log_g__",
];

pub fn is_diagnostic_column(name: &str) -> bool {
    DIAGNOSTIC_COLUMNS.contains(&name)
}

/// One logical model variable as laid out in the output header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMeta {
    pub name: String,
    /// Dimension sizes; empty for scalars.
    pub dims: Vec<usize>,
    /// Header column indexes holding this variable's elements, in file order.
    pub columns: Vec<usize>,
}

impl VariableMeta {
    pub fn scalar(name: impl Into<String>, column: usize) -> Self {
        Self {
            name: name.into(),
            dims: Vec::new(),
            columns: vec![column],
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn num_elements(&self) -> usize {
        self.columns.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticColumn {
    pub name: String,
    pub column: usize,
}

/// Logical view of an output header shared by every chain of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawsSchema {
    /// Raw header columns, in file order.
    pub columns: Vec<String>,
    pub variables: Vec<VariableMeta>,
    pub diagnostics: Vec<DiagnosticColumn>,
}

impl DrawsSchema {
    pub fn variable(&self, name: &str) -> Option<&VariableMeta> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn diagnostic(&self, name: &str) -> Option<&DiagnosticColumn> {
        self.diagnostics.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variable(name).is_some() || self.diagnostic(name).is_some()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn diagnostic_names(&self) -> impl Iterator<Item = &str> {
        self.diagnostics.iter().map(|d| d.name.as_str())
    }

    /// Every logical name, model variables first.
    pub fn all_names(&self) -> Vec<String> {
        self.variable_names()
            .chain(self.diagnostic_names())
            .map(str::to_string)
            .collect()
    }
}

/// Values of one logical variable across all iterations and chains.
///
/// Layout is `[iteration][chain][element]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDraws {
    pub meta: VariableMeta,
    pub values: Vec<f64>,
}

impl VariableDraws {
    fn offset(&self, iteration: usize, chain: usize, num_chains: usize) -> usize {
        (iteration * num_chains + chain) * self.meta.num_elements()
    }
}

/// Diagnostic columns, each laid out `[iteration][chain]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticTable {
    pub num_iterations: usize,
    pub num_chains: usize,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl DiagnosticTable {
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn value(&self, name: &str, iteration: usize, chain: usize) -> Option<f64> {
        if iteration >= self.num_iterations || chain >= self.num_chains {
            return None;
        }
        self.get(name)
            .map(|col| col[iteration * self.num_chains + chain])
    }

    /// Row count per chain.
    pub fn num_rows(&self) -> usize {
        self.num_iterations
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Per-chain metadata echoed by the engine, plus adaptation and timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub chain_id: Option<ChainId>,
    pub path: PathBuf,
    /// `key = value` pairs from the leading comment block. Unknown keys are kept.
    pub config: BTreeMap<String, String>,
    pub step_size: Option<f64>,
    pub inv_metric: Vec<f64>,
    pub warmup_seconds: Option<f64>,
    pub sampling_seconds: Option<f64>,
}

impl ChainMetadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// `major.minor.patch` from the version keys, when present.
    pub fn engine_version(&self) -> Option<String> {
        let major = self.get("stan_version_major")?;
        let minor = self.get("stan_version_minor")?;
        let patch = self.get("stan_version_patch").unwrap_or("0");
        Some(format!("{major}.{minor}.{patch}"))
    }

    pub fn method(&self) -> Option<&str> {
        self.get("method")
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.get("algorithm")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawsArray {
    num_iterations: usize,
    num_chains: usize,
    schema: DrawsSchema,
    variables: BTreeMap<String, VariableDraws>,
    diagnostics: DiagnosticTable,
    metadata: Vec<ChainMetadata>,
}

impl DrawsArray {
    pub fn new(
        num_iterations: usize,
        num_chains: usize,
        schema: DrawsSchema,
        metadata: Vec<ChainMetadata>,
    ) -> Self {
        Self {
            num_iterations,
            num_chains,
            schema,
            variables: BTreeMap::new(),
            diagnostics: DiagnosticTable {
                num_iterations,
                num_chains,
                columns: BTreeMap::new(),
            },
            metadata,
        }
    }

    pub fn insert_variable(&mut self, draws: VariableDraws) -> Result<()> {
        let expected = self.num_iterations * self.num_chains * draws.meta.num_elements();
        if draws.values.len() != expected {
            return Err(Error::Shape(format!(
                "variable '{}' has {} values, expected {}",
                draws.meta.name,
                draws.values.len(),
                expected
            )));
        }
        self.variables.insert(draws.meta.name.clone(), draws);
        Ok(())
    }

    pub fn insert_diagnostic(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        let expected = self.num_iterations * self.num_chains;
        if values.len() != expected {
            return Err(Error::Shape(format!(
                "diagnostic '{}' has {} values, expected {}",
                name,
                values.len(),
                expected
            )));
        }
        self.diagnostics.columns.insert(name, values);
        Ok(())
    }

    /// Fold `other` into `self`. Both must describe the same output set.
    /// Groups already materialized in `self` are kept as they are.
    pub fn merge(&mut self, other: DrawsArray) -> Result<()> {
        if other.num_iterations != self.num_iterations || other.num_chains != self.num_chains {
            return Err(Error::Shape(format!(
                "cannot merge {}x{} draws into {}x{}",
                other.num_iterations, other.num_chains, self.num_iterations, self.num_chains
            )));
        }
        if other.schema != self.schema {
            return Err(Error::Shape(
                "cannot merge draws parsed from a different header".into(),
            ));
        }
        for (name, draws) in other.variables {
            self.variables.entry(name).or_insert(draws);
        }
        for (name, values) in other.diagnostics.columns {
            self.diagnostics.columns.entry(name).or_insert(values);
        }
        Ok(())
    }

    /// Copy out the named groups. Every name must be known to the schema and
    /// already materialized.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<DrawsArray> {
        let mut out = DrawsArray::new(
            self.num_iterations,
            self.num_chains,
            self.schema.clone(),
            self.metadata.clone(),
        );
        for name in names {
            let name = name.as_ref();
            if let Some(v) = self.variables.get(name) {
                out.variables.insert(name.to_string(), v.clone());
            } else if let Some(d) = self.diagnostics.columns.get(name) {
                out.diagnostics.columns.insert(name.to_string(), d.clone());
            } else if self.schema.contains(name) {
                return Err(Error::Invariant(format!(
                    "variable '{name}' is known but not materialized"
                )));
            } else {
                return Err(Error::UnknownVariable(name.to_string()));
            }
        }
        Ok(out)
    }

    pub fn is_materialized(&self, name: &str) -> bool {
        self.variables.contains_key(name) || self.diagnostics.columns.contains_key(name)
    }

    /// `(iterations, chains, model-variable columns)` over materialized variables.
    pub fn shape(&self) -> (usize, usize, usize) {
        let width = self
            .variables
            .values()
            .map(|v| v.meta.num_elements())
            .sum();
        (self.num_iterations, self.num_chains, width)
    }

    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }

    pub fn num_chains(&self) -> usize {
        self.num_chains
    }

    /// Number of materialized logical model variables.
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Materialized model variable names, in header order.
    pub fn variable_names(&self) -> Vec<&str> {
        self.schema
            .variable_names()
            .filter(|n| self.variables.contains_key(*n))
            .collect()
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDraws> {
        self.variables.get(name)
    }

    /// All elements of `name` at one iteration of one chain.
    pub fn draw(&self, name: &str, iteration: usize, chain: usize) -> Option<&[f64]> {
        if iteration >= self.num_iterations || chain >= self.num_chains {
            return None;
        }
        let v = self.variables.get(name)?;
        let start = v.offset(iteration, chain, self.num_chains);
        Some(&v.values[start..start + v.meta.num_elements()])
    }

    /// Sequence of one element of `name` across iterations of one chain.
    pub fn chain_draws(&self, name: &str, chain: usize, element: usize) -> Option<Vec<f64>> {
        let v = self.variables.get(name)?;
        if chain >= self.num_chains || element >= v.meta.num_elements() {
            return None;
        }
        Some(
            (0..self.num_iterations)
                .map(|it| v.values[v.offset(it, chain, self.num_chains) + element])
                .collect(),
        )
    }

    /// Mean of one element across all iterations and chains.
    pub fn mean(&self, name: &str, element: usize) -> Option<f64> {
        let v = self.variables.get(name)?;
        let n = self.num_iterations * self.num_chains;
        if n == 0 || element >= v.meta.num_elements() {
            return None;
        }
        let stride = v.meta.num_elements();
        let sum: f64 = v.values.iter().skip(element).step_by(stride).sum();
        Some(sum / n as f64)
    }

    pub fn diagnostics(&self) -> &DiagnosticTable {
        &self.diagnostics
    }

    pub fn metadata(&self) -> &[ChainMetadata] {
        &self.metadata
    }

    pub fn schema(&self) -> &DrawsSchema {
        &self.schema
    }
}
