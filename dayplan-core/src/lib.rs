//! Dayplan core library.
//!
//! The pieces of the planner with real invariants: the line-oriented
//! task record codec, the keyed file-backed task store, and the
//! live-update broadcaster. The HTTP/WebSocket gateway lives in
//! `dayplan-server` and only ever talks to these three.

pub mod broadcast;
pub mod codec;
pub mod store;
pub mod task;
