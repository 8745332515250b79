//! Bearer token authorization middleware and administrative operations

use crate::auth::{GeneratedKeyPair, TokenClaims, TokenError, TokenProvider, TokenVersion};
use crate::proxy::headers::BEARER_PREFIX;
use crate::routes::RequestHandler;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Body returned when the `Authorization` header is absent
pub const MISSING_AUTHORIZATION_BODY: &str = "Missing authorization header";

/// Wraps a request handler with an authorization check
pub trait Authorize {
    fn authorize_request(&self, next: RequestHandler) -> RequestHandler;
}

/// Authorization service built on a single token provider
#[derive(Clone)]
pub struct AuthorizationService {
    provider: Arc<dyn TokenProvider>,
    expiration: Duration,
}

impl AuthorizationService {
    pub fn new(provider: Arc<dyn TokenProvider>, expiration: Duration) -> Self {
        Self {
            provider,
            expiration,
        }
    }

    pub fn version(&self) -> TokenVersion {
        self.provider.version()
    }

    fn new_claims(&self) -> TokenClaims {
        TokenClaims::issued_now(self.expiration)
    }

    /// Sign a new public token
    pub fn generate_public_paseto(&self) -> Result<String, TokenError> {
        trace!("Generating public PASETO token");
        self.provider.sign_token(&self.new_claims())
    }

    /// Encrypt a new local token
    pub fn generate_private_paseto(&self) -> Result<String, TokenError> {
        trace!("Generating private PASETO token");
        self.provider.encrypt_token(&self.new_claims())
    }

    pub fn generate_symmetric_key(&self) -> Result<String, TokenError> {
        self.provider.generate_symmetric_key()
    }

    pub fn generate_asymmetric_key_pair(&self) -> Result<GeneratedKeyPair, TokenError> {
        self.provider.generate_asymmetric_key_pair()
    }

    pub fn validate_token(&self, token: &str) -> Result<(), TokenError> {
        self.provider.validate_token(token)
    }
}

impl Authorize for AuthorizationService {
    fn authorize_request(&self, next: RequestHandler) -> RequestHandler {
        next.layer(from_fn_with_state(self.clone(), authorization_middleware))
    }
}

/// Reject requests without a valid bearer token, pass the rest through untouched
pub async fn authorization_middleware(
    State(auth): State<AuthorizationService>,
    request: Request,
    next: Next,
) -> Response {
    trace!(uri = %request.uri(), "Authorizing request");

    let Some(header_value) = request.headers().get(header::AUTHORIZATION) else {
        warn!(path = %request.uri().path(), "Missing authorization header");
        return (StatusCode::UNAUTHORIZED, MISSING_AUTHORIZATION_BODY).into_response();
    };

    let token = match header_value.to_str() {
        Ok(value) => value.strip_prefix(BEARER_PREFIX).unwrap_or(value),
        Err(_) => {
            warn!(path = %request.uri().path(), "Authorization header is not valid text");
            return (
                StatusCode::UNAUTHORIZED,
                TokenError::UnsupportedTokenFormat.to_string(),
            )
                .into_response();
        }
    };

    if let Err(error) = auth.validate_token(token) {
        warn!(path = %request.uri().path(), error = %error, "Rejected request");
        return (StatusCode::UNAUTHORIZED, error.to_string()).into_response();
    }

    debug!(path = %request.uri().path(), "Request authorized");
    next.run(request).await
}
