//! Convenient re-exports for downstream crates.

pub use crate::config::SessionConfig;
pub use crate::data::{DataMap, DataValue};
pub use crate::draws::{
    is_diagnostic_column, ChainMetadata, DiagnosticTable, DrawsArray, DrawsSchema, VariableDraws,
    VariableMeta, DIAGNOSTIC_COLUMNS,
};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::id::{ChainId, RunId};
