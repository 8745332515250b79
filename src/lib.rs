//! Runner Gateway - an authenticating reverse proxy for runner backends
//!
//! Every inbound request must carry a valid PASETO bearer token. Authorized
//! requests are routed by path prefix to a configured runner, forwarded with
//! the prefix removed, and the runner's response is relayed verbatim.

pub mod application;
pub mod auth;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod proxy;
pub mod routes;

pub use application::Application;
pub use error::{Error, Result};
