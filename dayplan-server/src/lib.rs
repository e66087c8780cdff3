//! Dayplan server library.
//!
//! Exposes the gateway for use in tests and embedding. The gateway is
//! a thin axum layer over `dayplan-core`: HTTP routes map onto the
//! task store, the WebSocket endpoint onto the update broadcaster,
//! and a background poller records ambient weather.

pub mod config;
pub mod server;
pub mod weather;
