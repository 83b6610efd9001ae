//! Ingestion module
//!
//! Readings enter through [`IngestPipeline`], are classified, persisted
//! together with any alert, and the alert is then fanned out to live viewers
//! and off-channel providers.

mod pipeline;

pub use pipeline::{Ingested, IngestPipeline};
