#![forbid(unsafe_code)]
//! drawbridge-fit: the end-to-end surface.
//!
//! `Model` pairs a compiled executable with the compilation cache that made
//! it; `Model::sample` serializes data, runs the chains and hands back a
//! `Fit`. A `Fit` never parses output eagerly: `LazyDraws` materializes
//! variable groups on first request and keeps them.

pub mod error;
pub mod fit;
pub mod lazy;
pub mod model;

pub use error::{Error, Result};
pub use fit::Fit;
pub use lazy::LazyDraws;
pub use model::Model;
