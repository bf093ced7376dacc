pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod handlers;
pub mod models;
pub mod preview;
pub mod state;
