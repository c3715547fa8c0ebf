//! HTTP boundary for the wdpl credential and session core.
//!
//! The binary in `main.rs` wires [`config::ServerConfig`], [`logging`],
//! [`metrics`] and the Postgres stores into [`api::create_router`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
