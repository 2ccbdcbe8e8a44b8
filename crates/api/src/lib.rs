//! HTTP API: server wiring, routing, and request/response mapping.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;

pub use app::build_app;
pub use app::services::{AppServices, build_services, build_services_with_credentials};
pub use config::{AdminSeed, ApiConfig, ApiConfigError};
