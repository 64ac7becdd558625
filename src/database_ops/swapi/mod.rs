//! People catalog ingest: chunked fetches from the SWAPI people resource,
//! reference resolution, and detached batch persistence.
pub mod client;
pub mod ingest;
pub mod models;
pub mod resolve;

#[cfg(test)]
mod fixtures;

pub use client::{CatalogFetch, SwapiClient};
pub use ingest::{run, IngestConfig, RunSummary};
