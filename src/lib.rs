//! greenhouse-hub - real-time relay for greenhouse sensor readings.
//!
//! A single producer pushes readings over HTTP; every connected dashboard
//! receives them over WebSocket, and the latest one is always available
//! for synchronous queries.

pub mod config;
pub mod server;
pub mod store;
