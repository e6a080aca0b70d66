//! Simulated screening and propagation service speaking the dashboard's HTTP API.

pub mod routes;
pub mod server;
pub mod state;
