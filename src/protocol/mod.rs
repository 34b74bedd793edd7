//! Wire types for the Realtime control channel.

pub mod client_events;
pub mod models;
pub mod server_events;
