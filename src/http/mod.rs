//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → security::rate_limit (client key, 429)
//!     → security::origin (403 on foreign origin)
//!     → request.rs (Caller extraction: credentials → principal)
//!     → handlers.rs (call PollService)
//!     → response.rs ({ data, error } + status)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{ClientKey, X_REQUEST_ID};
pub use response::ApiResponse;
pub use server::{AppState, HttpServer};
