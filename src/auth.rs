use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::AppState;
use crate::error::{ApiError, ChatError};

/// Resolves a bearer token to a user id. The real identity provider lives
/// outside this service; in production the verifier is a static token table
/// from config, and tests install their own implementations.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<String>;
}

/// Token table verifier backed by `AUTH_TOKENS` config pairs.
pub struct StaticTokenVerifier {
    tokens: Vec<(String, String)>,
}

impl StaticTokenVerifier {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { tokens: pairs }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<String> {
        self.tokens
            .iter()
            .find(|(_, t)| t == token)
            .map(|(user, _)| user.clone())
    }
}

/// The verified caller: extracted from the `Authorization: Bearer` header,
/// rejecting with 401 before the handler body runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    /// The raw bearer token, forwarded upstream by the relay.
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ChatError::Unauthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ChatError::Unauthorized)?;

        let user_id = state
            .verifier
            .verify(token)
            .ok_or(ChatError::Unauthorized)?;

        Ok(AuthUser {
            user_id,
            token: token.to_string(),
        })
    }
}
