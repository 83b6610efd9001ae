//! # CardioWatch
//!
//! Alerting core for remote heart monitoring.
//!
//! Readings are classified against a fixed normal band and per-subject
//! thresholds. Abnormal readings produce a persisted alert that is pushed to
//! the subject and their observer over a live channel, with optional SMS and
//! WhatsApp notices.
//!
//! ## Architecture
//!
//! - **Ingest**: validation, classification and atomic persistence
//! - **Alerting**: decision table and best-effort fan-out
//! - **Live**: registry of open connections, one per identity
//! - **Storage**: PostgreSQL, or an in-memory store for development
//! - **API**: REST endpoints plus the WebSocket live channel
//!
//! ## Quick Start
//!
//! ```bash
//! # Run against PostgreSQL
//! cardiowatch serve
//!
//! # Try the decision table
//! cardiowatch evaluate --heart-rate 160
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod live;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{evaluate, Decision, FanOutDispatcher, NotificationGateway};
    pub use crate::config::Config;
    pub use crate::db::{AlertStore, MemoryStore, PgAlertStore, SubjectDirectory};
    pub use crate::error::{Error, Result};
    pub use crate::ingest::IngestPipeline;
    pub use crate::live::ConnectionRegistry;
    pub use crate::models::*;
}
