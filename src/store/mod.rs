//! In-memory state shared by the ingest path and subscriber connections.
//!
//! Provides the latest-reading store, the subscriber registry and the
//! broadcaster that keeps the two in step. Nothing here is persisted.

pub mod broadcaster;
pub mod reading_store;
pub mod registry;
pub mod types;

pub use broadcaster::*;
pub use reading_store::*;
pub use registry::*;
pub use types::*;
