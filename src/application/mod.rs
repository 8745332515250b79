//! Application assembly and serving
//!
//! Wires the token provider, authorization middleware, forwarder and route
//! table together and runs the HTTP(S) listener.

pub mod app;

pub use app::Application;
