//! Data serializer: `DataMap` → engine input file.
//!
//! In-memory data is validated (names, duplicates, rectangularity) before a
//! single byte is written, so a malformed mapping never produces a file and
//! never reaches process launch. An existing file path is passed through
//! unchanged after an existence check.

pub mod json;
pub mod rdump;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use drawbridge_core::data::DataMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub use json::{from_json_value, read_data_json, to_json_value};

/// What the caller hands to `serialize`.
#[derive(Debug, Clone)]
pub enum DataInput {
    Map(DataMap),
    /// A pre-existing JSON or R dump file; never rewritten.
    File(PathBuf),
}

impl From<DataMap> for DataInput {
    fn from(m: DataMap) -> Self {
        DataInput::Map(m)
    }
}

impl From<PathBuf> for DataInput {
    fn from(p: PathBuf) -> Self {
        DataInput::File(p)
    }
}

impl From<&Path> for DataInput {
    fn from(p: &Path) -> Self {
        DataInput::File(p.to_path_buf())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Json,
    /// Legacy flat `name <- value` dump.
    RDump,
}

impl DataFormat {
    fn extension(self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::RDump => "R",
        }
    }
}

/// Write `input` into `dir` (when it is in-memory data) and return the path
/// the engine should read.
pub fn serialize(input: &DataInput, dir: &Path, format: DataFormat) -> Result<PathBuf> {
    match input {
        DataInput::File(path) => {
            if !path.is_file() {
                return Err(Error::MissingDataFile(path.clone()));
            }
            Ok(path.clone())
        }
        DataInput::Map(map) => {
            validate(map)?;
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
            let path = dir.join(format!(
                "data-{}.{}",
                Uuid::new_v4().simple(),
                format.extension()
            ));
            let f = File::create(&path).map_err(|e| Error::io(&path, e))?;
            let mut writer = BufWriter::new(f);
            match format {
                DataFormat::Json => json::write_json(map, &mut writer),
                DataFormat::RDump => rdump::write_rdump(map, &mut writer),
            }
            .map_err(|e| Error::io(&path, e))?;
            writer.flush().map_err(|e| Error::io(&path, e))?;
            tracing::debug!(path = %path.display(), entries = map.len(), "wrote data file");
            Ok(path)
        }
    }
}

/// Check names, uniqueness, and rectangularity of every entry.
pub fn validate(map: &DataMap) -> Result<()> {
    let mut seen = HashSet::new();
    for (name, value) in map.iter() {
        validate_name(name)?;
        if !seen.insert(name) {
            return Err(Error::malformed(name, "duplicate name"));
        }
        value.shape().map_err(|reason| Error::malformed(name, reason))?;
    }
    Ok(())
}

/// Engine identifiers: a letter, then letters, digits or underscores, and no
/// trailing double underscore (reserved for engine columns).
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let starts_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !starts_ok || !rest_ok {
        return Err(Error::malformed(name, "not a valid identifier"));
    }
    if name.ends_with("__") {
        return Err(Error::malformed(name, "names ending in '__' are reserved"));
    }
    Ok(())
}
