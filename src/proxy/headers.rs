//! HTTP header constants for the gateway

/// Authorization header prefix for bearer tokens
pub const BEARER_PREFIX: &str = "Bearer ";

/// Standard header re-exports for convenience
pub use ::http::header::{AUTHORIZATION, HOST};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_constants() {
        assert!(BEARER_PREFIX.ends_with(' '));
        assert_eq!(AUTHORIZATION.as_str(), "authorization");
        assert_eq!(HOST.as_str(), "host");
    }
}
