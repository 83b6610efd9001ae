//! Live push channel state
//!
//! Tracks which viewer identities currently hold an open connection and
//! provides non-blocking writes into those connections.

mod registry;
mod session;

pub use registry::ConnectionRegistry;
pub use session::{DeliveryError, LiveSession, PushFrame, SessionOutbox};
