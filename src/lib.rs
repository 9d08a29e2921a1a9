//! Access control and vote integrity for a polling service.

pub mod audit;
pub mod authz;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod service;
pub mod store;
pub mod votes;

pub use config::AppConfig;
pub use error::{CoreError, CoreResult};
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
pub use service::PollService;
