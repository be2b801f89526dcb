#![forbid(unsafe_code)]
//! drawbridge-core: shared data model for the build/run/assemble engine.
//!
//! Everything here is pure data: input values handed to the serializer, the
//! session configuration threaded through every call, and the `DrawsArray`
//! that parsed sampler output is assembled into. No process or file IO lives
//! in this crate.

pub mod config;
pub mod data;
pub mod draws;
pub mod error;
pub mod hash;
pub mod id;
pub mod prelude;

/// Crate version, recorded in artifact records for provenance.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
