//! Background worker for the PDF ingestion pipeline.
//!
//! Drives jobs through the stage machine (`job_validated` -> `parsed` ->
//! `parse_validated` -> `chunked` -> `embedded`) by leasing work from a
//! [`vellum_data::Repository`] and dispatching each lease to the matching
//! handler in [`stages`]. Has no HTTP dependency, so it can run embedded in
//! the API process or as its own binary.

pub mod context;
pub mod error;
pub mod stages;
pub mod worker;

pub use context::WorkerContext;
pub use error::{WorkerError, WorkerResult};
pub use worker::{Worker, WorkerComponentHealth, WorkerConfig, WorkerHealth};
