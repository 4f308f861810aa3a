pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod logging;
pub mod openclaw;
pub mod state;
pub mod utils;
pub mod web;
