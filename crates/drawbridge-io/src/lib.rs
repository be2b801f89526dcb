#![forbid(unsafe_code)]
//! drawbridge-io: input data serialization and sampler output parsing.
//!
//! - `data`: validates and encodes a `DataMap` into the engine's JSON input
//!   format (or the legacy R dump format), and reads JSON input back.
//! - `readers`: parses per-chain output files (metadata comments, header,
//!   numeric rows) into a unified `DrawsArray`, materializing only the
//!   requested variables.

pub mod data;
pub mod error;
pub mod readers;

pub use data::{serialize, DataFormat, DataInput};
pub use error::{Error, Result};
pub use readers::{parse_draws, parse_latent_dynamics, read_schema, LatentDynamics, Selection};
