//! Signaling over HTTP and the peer-connection collaborators.

pub mod peer;
pub mod rest;
