//! HTTP API for the dashboard.

pub mod cache;
pub mod costs;
pub mod cron;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod status;

pub use routes::*;
