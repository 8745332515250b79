//! Infrastructure layer for the runner gateway
//!
//! Process-wide concerns that sit outside request handling: tracing setup,
//! shutdown signals and shared log messages.

pub mod log_messages;
pub mod logging;
pub mod shutdown;

pub use logging::init_tracing;
pub use shutdown::shutdown_signal;
