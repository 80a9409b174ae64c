//! Pong Match Server - authoritative two-player Pong over WebSocket
//!
//! Modules:
//! - `game`: court physics, match registry and per-match tick loops
//! - `session`: connection lifecycle and the coordinator driving matches
//! - `ws` / `http`: transport (WebSocket protocol, liveness routes)
//! - `settlement`: hook that receives finished match results

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod session;
pub mod settlement;
pub mod util;
pub mod ws;
