//! Log message constants for infrastructure components
//!
//! Lifecycle messages are shared between the server binary, the application
//! and the key-management tool so operators see the same wording everywhere.

/// Application startup and lifecycle messages
pub mod application {
    pub const STARTING: &str = "Starting runner gateway";
    pub const ROUTES_REGISTERED: &str = "Registered runner routes";
    pub const LISTENING: &str = "Runner gateway listening";
    pub const LISTENING_TLS: &str = "Runner gateway listening with TLS";
    pub const STOPPED: &str = "Runner gateway stopped";
}

/// Shutdown messages
pub mod shutdown {
    pub const SIGNAL_RECEIVED: &str = "Shutdown signal received, draining in-flight requests";
    pub const CTRL_C_FAILED: &str = "Failed to listen for Ctrl+C";
    pub const SIGTERM_FAILED: &str = "Failed to install SIGTERM handler";
}

/// Key management messages
pub mod keys {
    pub const KEY_PAIR_WRITTEN: &str = "Wrote asymmetric key pair";
    pub const KEY_FILE_EXISTS: &str = "Refusing to overwrite existing key file";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_not_empty() {
        for message in [
            application::STARTING,
            application::ROUTES_REGISTERED,
            application::LISTENING,
            application::LISTENING_TLS,
            application::STOPPED,
            shutdown::SIGNAL_RECEIVED,
            shutdown::CTRL_C_FAILED,
            shutdown::SIGTERM_FAILED,
            keys::KEY_PAIR_WRITTEN,
            keys::KEY_FILE_EXISTS,
        ] {
            assert!(!message.is_empty());
        }
    }
}
