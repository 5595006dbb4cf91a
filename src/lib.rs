//! flowrelay - conversation flow engine and real-time relay
//!
//! - `flow`: configuration model, catalog and the pure flow engine
//! - `sessions`: server-held flow sessions
//! - `relay`: room-scoped fan-out of chat and typing events
//! - `api`: HTTP routes and the WebSocket transport
//! - `client`: reconnection policy for relay clients
//! - `settings`: environment configuration

pub mod api;
pub mod client;
pub mod flow;
pub mod relay;
pub mod sessions;
pub mod settings;
