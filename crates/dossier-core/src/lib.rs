//! Core domain + application logic for the deal dossier generator.
//!
//! This crate is intentionally transport-agnostic. The Bitrix24 REST client and the
//! filesystem live behind ports (traits); the binary wires concrete adapters in.

pub mod aggregator;
pub mod config;
pub mod domain;
pub mod dossier;
pub mod errors;
pub mod logging;
pub mod output;
pub mod paginator;
pub mod params;
pub mod ports;
pub mod report;
pub mod timeline;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
