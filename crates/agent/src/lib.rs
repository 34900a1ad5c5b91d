//! Analytics agent: HTTP surface over the service health analytics engine

pub mod api;
pub mod config;
pub mod retention;
