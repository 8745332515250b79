//! Proxy module for forwarding authorized requests to runners
//!
//! - `forwarder`: rewrites and relays one request to one runner
//! - `headers`: header names and prefixes the gateway inspects
//! - `types`: runner identifiers, limits and error responses

pub mod forwarder;
pub mod headers;
pub mod types;

pub use forwarder::{fault_boundary, Forward, ForwardLimits, GatewayService, ProxyRequest};
pub use types::{ProxyError, ProxyResult, RunnerName, RunnerPath, TargetHost, TargetScheme};
